//! Layout arithmetic: stride integer widths, flat-index-to-offset
//! conversion, and contiguous dimension collapsing.
//!
//! Collapsing merges adjacent axes that every participating view traverses
//! contiguously, so the rank-specialized kernels apply far more often than
//! the raw rank of an array would suggest. A fully contiguous array of any
//! rank collapses to a single axis.

use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// Signed stride integer used for offsets and per-axis steps.
///
/// Two widths are supported: `isize` is the default width and `i64` is the
/// 64-bit-safe width for layouts expressed in 64-bit integers. Kernels are
/// generic over this trait so both instantiations share one implementation.
pub trait Stride:
    Copy
    + Eq
    + Ord
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + 'static
{
    const ZERO: Self;
    const ONE: Self;

    /// Convert an axis extent into this stride width.
    fn from_extent(extent: usize) -> Self;

    /// Pointer-offset view of the value.
    fn to_isize(self) -> isize;
}

impl Stride for isize {
    const ZERO: Self = 0;
    const ONE: Self = 1;

    #[inline(always)]
    fn from_extent(extent: usize) -> Self {
        extent as isize
    }

    #[inline(always)]
    fn to_isize(self) -> isize {
        self
    }
}

impl Stride for i64 {
    const ZERO: Self = 0;
    const ONE: Self = 1;

    #[inline(always)]
    fn from_extent(extent: usize) -> Self {
        extent as i64
    }

    #[inline(always)]
    fn to_isize(self) -> isize {
        self as isize
    }
}

/// Row-major (last index varies fastest) strides for `shape`.
pub fn row_major_strides<I: Stride>(shape: &[usize]) -> Vec<I> {
    let rank = shape.len();
    let mut strides = vec![I::ONE; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * I::from_extent(shape[i + 1]);
    }
    strides
}

/// Convert a flat row-major element index into a strided memory offset.
///
/// Walks the axes from fastest-varying (last) to slowest, accumulating
/// `(index % extent) * stride` and dividing the index by the extent. Every
/// specialized loop kernel emulates exactly this visitation order.
#[inline]
pub fn elem_to_loc<I: Stride>(elem: usize, shape: &[usize], strides: &[I]) -> I {
    debug_assert_eq!(shape.len(), strides.len());
    let mut elem = elem;
    let mut loc = I::ZERO;
    for (&extent, &stride) in shape.iter().zip(strides.iter()).rev() {
        loc = loc + I::from_extent(elem % extent) * stride;
        elem /= extent;
    }
    loc
}

/// Merge adjacent axes that all supplied stride vectors traverse
/// contiguously.
///
/// Axes `i` and `i+1` (with `i` the slower-varying one) merge into a single
/// axis of extent `shape[i] * shape[i+1]` exactly when
/// `strides[k][i] == strides[k][i+1] * shape[i+1]` holds for every stride
/// vector `k`. The merged axis keeps the stride of its fastest constituent
/// axis. Axes of extent 1 are dropped outright since their stride never
/// contributes to an offset.
///
/// Returns the collapsed shape and one collapsed stride vector per input
/// vector. The result is never empty: a zero-rank input comes back as shape
/// `[1]` with stride 0 in every output vector.
pub fn collapse_contiguous_dims<I: Stride>(
    shape: &[usize],
    strides: &[&[I]],
) -> (Vec<usize>, Vec<Vec<I>>) {
    for st in strides {
        debug_assert_eq!(shape.len(), st.len());
    }

    let kept: Vec<usize> = (0..shape.len()).filter(|&i| shape[i] != 1).collect();
    if kept.is_empty() {
        return (vec![1], strides.iter().map(|_| vec![I::ZERO]).collect());
    }

    let mut out_shape = Vec::with_capacity(kept.len());
    let mut out_strides: Vec<Vec<I>> = strides
        .iter()
        .map(|_| Vec::with_capacity(kept.len()))
        .collect();

    // Running group: accumulated extent plus, per stride vector, the stride
    // of the fastest axis merged so far.
    let mut group_extent = shape[kept[0]];
    let mut group_strides: Vec<I> = strides.iter().map(|st| st[kept[0]]).collect();

    for &axis in &kept[1..] {
        let extent = shape[axis];
        let merges = strides
            .iter()
            .zip(group_strides.iter())
            .all(|(st, &group)| group == st[axis] * I::from_extent(extent));
        if !merges {
            out_shape.push(group_extent);
            for (outs, &group) in out_strides.iter_mut().zip(group_strides.iter()) {
                outs.push(group);
            }
            group_extent = 1;
        }
        group_extent *= extent;
        for (group, st) in group_strides.iter_mut().zip(strides.iter()) {
            *group = st[axis];
        }
    }
    out_shape.push(group_extent);
    for (outs, &group) in out_strides.iter_mut().zip(group_strides.iter()) {
        outs.push(group);
    }

    (out_shape, out_strides)
}
