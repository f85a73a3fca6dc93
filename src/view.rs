//! A single affine view over a flat backing buffer.

use smallvec::SmallVec;

use crate::index_expr::IndexExpr;

/// Inline capacity for shape/stride vectors before falling back to the heap.
///
/// Most tensors in practice have at most a handful of axes; `SmallVec`
/// avoids an allocation for the common case while still supporting
/// arbitrary rank.
const INLINE_AXES: usize = 4;

pub(crate) type AxisVec<T> = SmallVec<[T; INLINE_AXES]>;

/// A single affine descriptor `(shape, stride, offset)` mapping axis
/// coordinates `(i_0, .., i_{n-1})` to a flat backing index via
/// `offset + sum_k i_k * stride_k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    shape: AxisVec<usize>,
    stride: AxisVec<i64>,
    offset: i64,
}

impl View {
    /// Builds a view from explicit shape, stride, and offset.
    pub(crate) fn new(shape: AxisVec<usize>, stride: AxisVec<i64>, offset: i64) -> Self {
        debug_assert_eq!(shape.len(), stride.len());
        Self {
            shape,
            stride,
            offset,
        }
    }

    /// The canonical row-major view over a freshly allocated buffer of the
    /// given shape: `stride_k = prod(shape[k+1..])`, `offset = 0`.
    pub fn contiguous(shape: &[usize]) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
            stride: row_major_strides(shape),
            offset: 0,
        }
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// The per-axis lengths.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The per-axis strides.
    pub fn stride(&self) -> &[i64] {
        &self.stride
    }

    /// The scalar offset added to every address this view produces.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Builds the symbolic backing-index expression for this view, given one
    /// [`IndexExpr`] per axis to substitute for `i_k`.
    ///
    /// Axes with `stride_k == 0` (broadcast) or `shape_k == 1` (no
    /// information regardless of stride) are omitted from the sum.
    pub fn index_expr(&self, vars: &[IndexExpr]) -> IndexExpr {
        debug_assert_eq!(vars.len(), self.ndim());
        let mut e = IndexExpr::constant(self.offset);
        for k in 0..self.ndim() {
            if self.stride[k] == 0 || self.shape[k] == 1 {
                continue;
            }
            e = e.add(vars[k].clone().scale(self.stride[k]));
        }
        e
    }

    /// Whether this view is exactly the canonical row-major layout for its
    /// own shape (zero offset, no broadcast, no permutation or slicing).
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.stride == row_major_strides(&self.shape)
    }
}

/// Row-major strides for `shape`: `stride[k] = prod(shape[k+1..])`.
pub(crate) fn row_major_strides(shape: &[usize]) -> AxisVec<i64> {
    let n = shape.len();
    let mut strides: AxisVec<i64> = smallvec::smallvec![0; n];
    let mut acc: i64 = 1;
    for k in (0..n).rev() {
        strides[k] = acc;
        acc *= shape[k] as i64;
    }
    strides
}
