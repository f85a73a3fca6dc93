//! Error types for shape-tracker operations.

use alloc::vec::Vec;

/// Errors that can occur while building or querying a [`crate::ShapeTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ShapeTrackerError {
    /// `reshape` where the product of dimensions differs from the current shape.
    #[cfg_attr(
        feature = "std",
        error("cannot reshape {from:?} (len {from_len}) into {to:?} (len {to_len})")
    )]
    ShapeMismatch {
        from: Vec<usize>,
        from_len: usize,
        to: Vec<usize>,
        to_len: usize,
    },

    /// `permute` with a sequence that is not a permutation of `0..n-1`.
    #[cfg_attr(
        feature = "std",
        error("axes {axes:?} are not a permutation of 0..{ndim}")
    )]
    BadAxes { axes: Vec<usize>, ndim: usize },

    /// `expand` growing an axis whose source length is not 1.
    #[cfg_attr(
        feature = "std",
        error("cannot expand axis {axis} from {from} to {to}: source length is not 1")
    )]
    BadExpand { axis: usize, from: usize, to: usize },

    /// `slice` ranges out of `[0, s_k]`, or `lo > hi`, or wrong arity.
    #[cfg_attr(
        feature = "std",
        error("bad slice range ({lo}, {hi}) for axis {axis} of length {len}")
    )]
    BadSlice {
        axis: usize,
        lo: usize,
        hi: usize,
        len: usize,
    },

    /// `stride` with a zero factor, or wrong arity.
    #[cfg_attr(feature = "std", error("bad stride factor {factor} for axis {axis}"))]
    BadStride { axis: usize, factor: i64 },

    /// `at(k)` with `k` outside `[0, prod(shape))`.
    #[cfg_attr(
        feature = "std",
        error("index {index} out of bounds for shape {shape:?} (len {len})")
    )]
    BadIndex {
        index: usize,
        shape: Vec<usize>,
        len: usize,
    },
}

/// Result type for shape-tracker operations.
pub type ShapeTrackerResult<T> = core::result::Result<T, ShapeTrackerError>;
