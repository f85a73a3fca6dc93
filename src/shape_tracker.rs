//! The view stack and the transforms that push onto or collapse it.

use alloc::vec;
use alloc::vec::Vec;
use smallvec::SmallVec;

use crate::error::{ShapeTrackerError, ShapeTrackerResult};
use crate::index_expr::IndexExpr;
use crate::view::{row_major_strides, AxisVec, View};

/// A non-empty stack of [`View`]s describing how an N-dimensional logical
/// tensor maps onto a flat contiguous backing buffer.
///
/// Every transform either rewrites the top view in place (when the result
/// is still expressible as a single affine view) or pushes a new view on
/// top of it (when it is not). [`ShapeTracker::expr`] synthesizes a single
/// [`IndexExpr`] over the whole stack by unraveling through the
/// intermediate views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeTracker {
    views: Vec<View>,
}

impl ShapeTracker {
    /// A fresh tracker over a contiguously allocated buffer of the given
    /// shape.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            views: vec![View::contiguous(shape)],
        }
    }

    fn top(&self) -> &View {
        self.views.last().expect("view stack is never empty")
    }

    fn set_top(&mut self, view: View) {
        *self.views.last_mut().expect("view stack is never empty") = view;
    }

    /// The logical shape: the shape of the top-of-stack view.
    pub fn shape(&self) -> &[usize] {
        self.top().shape()
    }

    /// Number of axes in the current logical shape.
    pub fn ndim(&self) -> usize {
        self.top().ndim()
    }

    /// Number of views currently on the stack (1 means no view has needed
    /// to fall back to the general path yet).
    pub fn depth(&self) -> usize {
        self.views.len()
    }

    /// Whether the top view alone is contiguous row-major over its shape.
    pub fn is_contiguous(&self) -> bool {
        self.top().is_contiguous()
    }

    /// Reinterprets the logical shape, keeping element order fixed.
    ///
    /// Collapses onto the top view when every new axis can be expressed as
    /// a split or merge of contiguous runs of the old axes; otherwise
    /// pushes a fresh contiguous view recording the reinterpretation.
    pub fn reshape(&mut self, new_shape: &[usize]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let old_shape: Vec<usize> = top.shape().to_vec();
        let old_len: usize = old_shape.iter().product();
        let new_len: usize = new_shape.iter().product();
        if old_len != new_len {
            return Err(ShapeTrackerError::ShapeMismatch {
                from: old_shape,
                from_len: old_len,
                to: new_shape.to_vec(),
                to_len: new_len,
            });
        }

        if old_len == 0 {
            // No element ever gets addressed through a zero-sized axis;
            // any layout for the new shape is observationally equivalent.
            self.views.push(View::contiguous(new_shape));
            return Ok(self);
        }

        match merge_reshape_strides(top.shape(), top.stride(), new_shape) {
            Some(new_stride) => {
                let view = View::new(
                    new_shape.iter().copied().collect(),
                    new_stride,
                    top.offset(),
                );
                self.set_top(view);
            }
            None => self.views.push(View::contiguous(new_shape)),
        }
        Ok(self)
    }

    /// Reorders axes: `axes[k]` names which old axis becomes new axis `k`.
    pub fn permute(&mut self, axes: &[usize]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let n = top.ndim();
        if !is_permutation(axes, n) {
            return Err(ShapeTrackerError::BadAxes {
                axes: axes.to_vec(),
                ndim: n,
            });
        }
        let shape: AxisVec<usize> = axes.iter().map(|&a| top.shape()[a]).collect();
        let stride: AxisVec<i64> = axes.iter().map(|&a| top.stride()[a]).collect();
        self.set_top(View::new(shape, stride, top.offset()));
        Ok(self)
    }

    /// Broadcasts axes whose current length is 1 up to `new_shape[k]`,
    /// giving them stride 0. Axes already matching `new_shape[k]` are left
    /// untouched.
    pub fn expand(&mut self, new_shape: &[usize]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let n = top.ndim();
        if new_shape.len() != n {
            return Err(ShapeTrackerError::BadExpand {
                axis: n,
                from: n,
                to: new_shape.len(),
            });
        }
        let mut stride: AxisVec<i64> = top.stride().iter().copied().collect();
        for k in 0..n {
            if new_shape[k] == top.shape()[k] {
                continue;
            }
            if top.shape()[k] != 1 {
                return Err(ShapeTrackerError::BadExpand {
                    axis: k,
                    from: top.shape()[k],
                    to: new_shape[k],
                });
            }
            stride[k] = 0;
        }
        self.set_top(View::new(
            new_shape.iter().copied().collect(),
            stride,
            top.offset(),
        ));
        Ok(self)
    }

    /// Reverses the given axes: logical index `i_k` now addresses what used
    /// to be `shape_k - 1 - i_k`.
    pub fn flip(&mut self, axes: &[usize]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let n = top.ndim();
        for &k in axes {
            if k >= n {
                return Err(ShapeTrackerError::BadAxes {
                    axes: axes.to_vec(),
                    ndim: n,
                });
            }
        }
        let mut stride: AxisVec<i64> = top.stride().iter().copied().collect();
        let mut offset = top.offset();
        for &k in axes {
            let s = top.shape()[k];
            if s != 0 {
                offset += (s as i64 - 1) * stride[k];
            }
            stride[k] = -stride[k];
        }
        self.set_top(View::new(top.shape().iter().copied().collect(), stride, offset));
        Ok(self)
    }

    /// Restricts each axis `k` to the half-open range `[ranges[k].0,
    /// ranges[k].1)`.
    pub fn slice(&mut self, ranges: &[(usize, usize)]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let n = top.ndim();
        if ranges.len() != n {
            return Err(ShapeTrackerError::BadSlice {
                axis: n,
                lo: 0,
                hi: ranges.len(),
                len: n,
            });
        }
        let mut shape: AxisVec<usize> = SmallVec::with_capacity(n);
        let mut offset = top.offset();
        for (k, &(lo, hi)) in ranges.iter().enumerate() {
            let len = top.shape()[k];
            if lo > hi || hi > len {
                return Err(ShapeTrackerError::BadSlice {
                    axis: k,
                    lo,
                    hi,
                    len,
                });
            }
            shape.push(hi - lo);
            offset += lo as i64 * top.stride()[k];
        }
        self.set_top(View::new(shape, top.stride().iter().copied().collect(), offset));
        Ok(self)
    }

    /// Subsamples each axis by `factors[k]`. A positive factor keeps every
    /// `factor`-th element starting at 0; a negative factor additionally
    /// reverses the axis first. Magnitude-1 factors are a no-op.
    pub fn stride(&mut self, factors: &[i64]) -> ShapeTrackerResult<&mut Self> {
        let top = self.top();
        let n = top.ndim();
        if factors.len() != n {
            return Err(ShapeTrackerError::BadStride {
                axis: n,
                factor: factors.len() as i64,
            });
        }
        let mut shape: AxisVec<usize> = SmallVec::with_capacity(n);
        let mut stride: AxisVec<i64> = SmallVec::with_capacity(n);
        let mut offset = top.offset();
        for (k, &f) in factors.iter().enumerate() {
            if f == 0 {
                return Err(ShapeTrackerError::BadStride { axis: k, factor: f });
            }
            let s = top.shape()[k];
            let t = top.stride()[k];
            if s == 0 {
                shape.push(0);
                stride.push(t * f.abs());
                continue;
            }
            let mag = f.abs();
            let new_len = ((s as i64 + mag - 1) / mag) as usize;
            if f > 0 {
                shape.push(new_len);
                stride.push(t * f);
            } else {
                offset += (s as i64 - 1) * t;
                shape.push(new_len);
                stride.push(-t * mag);
            }
        }
        self.set_top(View::new(shape, stride, offset));
        Ok(self)
    }

    /// Synthesizes a single symbolic expression computing the backing
    /// index from axis variables `x_0, .., x_{n-1}` of the current logical
    /// shape, unraveling through every intermediate view on the stack.
    pub fn expr(&self) -> IndexExpr {
        let top = self.top();
        let n = top.ndim();
        let var_bounds: Vec<i64> = top.shape().iter().map(|&s| s as i64).collect();
        let vars: Vec<IndexExpr> = (0..n).map(IndexExpr::var).collect();

        let mut e = top.index_expr(&vars);

        for j in (0..self.views.len() - 1).rev() {
            let vj = &self.views[j];
            let m = vj.ndim();
            let group_strides = row_major_strides(vj.shape());
            let mut ys = Vec::with_capacity(m);
            for k in 0..m {
                let divided = e.clone().div(group_strides[k], &var_bounds);
                let yk = if k == 0 {
                    // No-op given the range of `e`: the leading axis never
                    // needs reduction modulo its own shape.
                    divided
                } else {
                    divided.modulo(vj.shape()[k] as i64, &var_bounds)
                };
                ys.push(yk);
            }
            e = vj.index_expr(&ys);
        }

        e
    }

    /// Substitutes concrete per-axis logical indices into [`Self::expr`]
    /// and evaluates the result.
    pub fn materialize(&self, indices: &[i64]) -> i64 {
        self.expr().eval(indices)
    }

    /// Unravels a flat logical index `k` against [`Self::shape`] and
    /// evaluates the backing index it addresses.
    pub fn at(&self, k: usize) -> ShapeTrackerResult<i64> {
        let shape = self.shape();
        let len: usize = shape.iter().product();
        if k >= len {
            return Err(ShapeTrackerError::BadIndex {
                index: k,
                shape: shape.to_vec(),
                len,
            });
        }
        let mut indices = vec![0i64; shape.len()];
        let mut rem = k;
        for axis in 0..shape.len() {
            let group: usize = shape[axis + 1..].iter().product();
            indices[axis] = (rem / group) as i64;
            rem %= group;
        }
        Ok(self.materialize(&indices))
    }
}

fn is_permutation(axes: &[usize], n: usize) -> bool {
    if axes.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &a in axes {
        if a >= n || seen[a] {
            return false;
        }
        seen[a] = true;
    }
    true
}

/// Attempts to express `new_shape` as strides over `old_shape`/`old_stride`
/// without moving data, following the classic squeeze-and-match reshape
/// algorithm shared by NumPy and most row-major tensor libraries: axes of
/// length 1 carry no information and are dropped, then old and new axes are
/// grouped from the left until their running products agree, and each group
/// is accepted only if its old axes form a contiguous run (so the group can
/// be freely re-split).
fn merge_reshape_strides(
    old_shape: &[usize],
    old_stride: &[i64],
    new_shape: &[usize],
) -> Option<AxisVec<i64>> {
    let mut dims: AxisVec<usize> = SmallVec::new();
    let mut strides: AxisVec<i64> = SmallVec::new();
    for (&d, &s) in old_shape.iter().zip(old_stride.iter()) {
        if d != 1 {
            dims.push(d);
            strides.push(s);
        }
    }
    let oldnd = dims.len();
    let newnd = new_shape.len();

    let mut new_strides: AxisVec<i64> = smallvec::smallvec![0; newnd];

    let (mut oi, mut oj) = (0usize, 1usize);
    let (mut ni, mut nj) = (0usize, 1usize);

    while ni < newnd && oi < oldnd {
        let mut np = new_shape[ni] as i64;
        let mut op = dims[oi] as i64;

        while np != op {
            if np < op {
                if nj >= newnd {
                    return None;
                }
                np *= new_shape[nj] as i64;
                nj += 1;
            } else {
                if oj >= oldnd {
                    return None;
                }
                op *= dims[oj] as i64;
                oj += 1;
            }
        }

        for ok in oi..oj.saturating_sub(1) {
            if strides[ok] != dims[ok + 1] as i64 * strides[ok + 1] {
                return None;
            }
        }

        new_strides[nj - 1] = strides[oj - 1];
        for nk in (ni + 1..nj).rev() {
            new_strides[nk - 1] = new_strides[nk] * new_shape[nk] as i64;
        }

        ni = nj;
        nj += 1;
        oi = oj;
        oj += 1;
    }

    let last_stride = if ni >= 1 { new_strides[ni - 1] } else { 1 };
    for s in new_strides.iter_mut().skip(ni) {
        *s = last_stride;
    }

    Some(new_strides)
}
