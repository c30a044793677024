//! Strategy selection, dtype dispatch, and destination provisioning.
//!
//! The copy strategy is picked by the caller, typically from the source's
//! contiguity flags: [`CopyType::Scalar`] broadcasts a single element,
//! [`CopyType::Vector`] does a flat cast-copy between layouts that agree,
//! [`CopyType::General`] gathers a strided source into a linear
//! destination, and [`CopyType::GeneralGeneral`] lets both sides stride
//! independently. The dtype pair is resolved at runtime through a two-level
//! match, source first, that monomorphizes one kernel per pair.

use half::{bf16, f16};
use num_complex::Complex32;

use crate::array::Array;
use crate::buffer::malloc_or_wait;
use crate::dtype::{CastTo, DType, Element};
use crate::kernels::{copy_general, copy_general_general, copy_single, copy_vector};
use crate::layout::Stride;

// ============================================================================
// Strategy
// ============================================================================

/// How a copy traverses source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyType {
    /// Source is broadcast: a single materialized element fills the
    /// destination.
    Scalar,
    /// Source layout carries over to the destination; elements are copied
    /// flat without index arithmetic.
    Vector,
    /// Source is strided, destination is written linearly.
    General,
    /// Source and destination each follow their own strides.
    GeneralGeneral,
}

// ============================================================================
// Dtype dispatch
// ============================================================================

macro_rules! with_dtype {
    ($dtype:expr, $T:ident, $body:expr) => {
        match $dtype {
            DType::Bool => {
                type $T = bool;
                $body
            }
            DType::U8 => {
                type $T = u8;
                $body
            }
            DType::U16 => {
                type $T = u16;
                $body
            }
            DType::U32 => {
                type $T = u32;
                $body
            }
            DType::U64 => {
                type $T = u64;
                $body
            }
            DType::I8 => {
                type $T = i8;
                $body
            }
            DType::I16 => {
                type $T = i16;
                $body
            }
            DType::I32 => {
                type $T = i32;
                $body
            }
            DType::I64 => {
                type $T = i64;
                $body
            }
            DType::F16 => {
                type $T = f16;
                $body
            }
            DType::BF16 => {
                type $T = bf16;
                $body
            }
            DType::F32 => {
                type $T = f32;
                $body
            }
            DType::C64 => {
                type $T = Complex32;
                $body
            }
        }
    };
}

#[allow(clippy::too_many_arguments)]
fn copy_pair<S, D, I>(
    src: &Array,
    dst: &mut Array,
    ctype: CopyType,
    data_shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    i_offset: i64,
    o_offset: i64,
) where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    match ctype {
        CopyType::Scalar => copy_single::<S, D>(src, dst),
        CopyType::Vector => copy_vector::<S, D>(src, dst),
        CopyType::General => {
            copy_general::<S, D, I>(src, dst, data_shape, i_strides, i_offset)
        }
        CopyType::GeneralGeneral => copy_general_general::<S, D, I>(
            src, dst, data_shape, i_strides, o_strides, i_offset, o_offset,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn copy_dispatch_dst<S, I>(
    src: &Array,
    dst: &mut Array,
    ctype: CopyType,
    data_shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    i_offset: i64,
    o_offset: i64,
) where
    S: Element,
    I: Stride,
{
    with_dtype!(dst.dtype(), D, {
        copy_pair::<S, D, I>(
            src, dst, ctype, data_shape, i_strides, o_strides, i_offset, o_offset,
        )
    })
}

#[allow(clippy::too_many_arguments)]
fn copy_dispatch<I>(
    src: &Array,
    dst: &mut Array,
    ctype: CopyType,
    data_shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    i_offset: i64,
    o_offset: i64,
) where
    I: Stride,
{
    with_dtype!(src.dtype(), S, {
        copy_dispatch_dst::<S, I>(
            src, dst, ctype, data_shape, i_strides, o_strides, i_offset, o_offset,
        )
    })
}

// ============================================================================
// Entry points
// ============================================================================

/// Trust-boundary checks, compiled into debug builds only: the layout
/// handed to a copy must stay inside both buffers, and linear writes must
/// fit the destination. Release builds trust the caller and re-validate
/// nothing.
#[cfg(debug_assertions)]
#[allow(clippy::too_many_arguments)]
fn check_copy_bounds<I: Stride>(
    src: &Array,
    dst: &Array,
    data_shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    i_offset: i64,
    o_offset: i64,
    ctype: CopyType,
) {
    match ctype {
        CopyType::Scalar => {
            check_linear_span("source", src, 1);
            check_linear_span("destination", dst, dst.size());
        }
        CopyType::Vector => {
            check_linear_span("source", src, src.data_size());
            check_linear_span("destination", dst, src.data_size());
        }
        CopyType::General => {
            check_strided_span("source", src, data_shape, i_strides, i_offset);
            check_linear_span("destination", dst, data_shape.iter().product());
        }
        CopyType::GeneralGeneral => {
            check_strided_span("source", src, data_shape, i_strides, i_offset);
            check_strided_span("destination", dst, data_shape, o_strides, o_offset);
        }
    }
}

#[cfg(debug_assertions)]
fn check_strided_span<I: Stride>(
    side: &str,
    arr: &Array,
    shape: &[usize],
    strides: &[I],
    offset: i64,
) {
    let strides: Vec<isize> = strides.iter().map(|s| s.to_isize()).collect();
    if let Err(err) = arr.check_layout(shape, &strides, arr.offset() + offset as isize) {
        panic!("{side} layout escapes its buffer: {err}");
    }
}

#[cfg(debug_assertions)]
fn check_linear_span(side: &str, arr: &Array, count: usize) {
    let capacity = arr.capacity();
    let offset = arr.offset();
    assert!(
        offset >= 0 && offset as usize + count <= capacity,
        "{side} holds {capacity} elements at offset {offset}, copy touches {count}",
    );
}

/// Copy into a destination whose buffer is already provisioned.
///
/// The layout is taken from the arrays themselves: general copies read the
/// source's shape and strides, dual-strided copies additionally follow the
/// destination's strides. Shapes must agree for the strided strategies.
pub fn copy_inplace(src: &Array, dst: &mut Array, ctype: CopyType) {
    if matches!(ctype, CopyType::General | CopyType::GeneralGeneral) {
        debug_assert_eq!(src.shape(), dst.shape());
    }
    let o_strides = dst.strides().to_vec();
    copy_inplace_strided::<isize>(
        src,
        dst,
        src.shape(),
        src.strides(),
        &o_strides,
        0,
        0,
        ctype,
    );
}

/// Copy with an explicit layout, for callers that slice or reinterpret
/// arrays without materializing views.
///
/// `data_shape` with `i_strides`/`i_offset` locates source elements
/// relative to the source's data start. `o_strides`/`o_offset` do the same
/// for the destination but apply only to [`CopyType::GeneralGeneral`]; a
/// [`CopyType::General`] copy writes the destination linearly and the
/// contiguous strategies ignore the layout entirely. Offsets are in
/// elements and stay 64-bit regardless of the stride width `I`.
///
/// Debug builds assert that the described regions stay inside both
/// buffers; release builds trust the caller.
#[allow(clippy::too_many_arguments)]
pub fn copy_inplace_strided<I: Stride>(
    src: &Array,
    dst: &mut Array,
    data_shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    i_offset: i64,
    o_offset: i64,
    ctype: CopyType,
) {
    #[cfg(debug_assertions)]
    check_copy_bounds(
        src, dst, data_shape, i_strides, o_strides, i_offset, o_offset, ctype,
    );
    match ctype {
        CopyType::General | CopyType::GeneralGeneral => copy_dispatch::<I>(
            src, dst, ctype, data_shape, i_strides, o_strides, i_offset, o_offset,
        ),
        CopyType::Scalar | CopyType::Vector => {
            copy_dispatch::<I>(src, dst, ctype, &[], &[], &[], 0, 0)
        }
    }
}

/// Copy that provisions the destination's buffer first.
///
/// A [`CopyType::Vector`] source that is the sole owner of its buffer and
/// matches the destination's element width donates its storage instead of
/// allocating; the cast then runs in place. Otherwise the destination gets
/// a fresh buffer: mirroring the source's layout for `Vector`, row-major
/// contiguous for everything else. Since the destination is contiguous
/// after provisioning, [`CopyType::GeneralGeneral`] demotes to
/// [`CopyType::General`].
pub fn copy(src: &Array, dst: &mut Array, mut ctype: CopyType) {
    match ctype {
        CopyType::Vector => {
            if src.is_donatable() && src.itemsize() == dst.itemsize() {
                log::trace!(
                    "donating {} byte source buffer to destination",
                    src.data_size() * src.itemsize(),
                );
                dst.copy_shared_buffer(src);
            } else {
                let size = src.data_size();
                dst.set_data_with_layout(
                    malloc_or_wait(size * dst.itemsize()),
                    size,
                    src.strides().to_vec(),
                    src.flags(),
                );
            }
        }
        CopyType::Scalar | CopyType::General | CopyType::GeneralGeneral => {
            dst.set_data(malloc_or_wait(dst.nbytes()));
        }
    }
    if ctype == CopyType::GeneralGeneral {
        // The destination provisioned above is row-major contiguous.
        log::trace!("demoting GeneralGeneral to General for the write pass");
        ctype = CopyType::General;
    }
    copy_inplace(src, dst, ctype);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_broadcast() {
        let src = Array::from_vec(vec![7i32], &[]).unwrap();
        let mut dst = Array::zeros(&[4, 4], DType::F32);
        copy(&src, &mut dst, CopyType::Scalar);
        assert_eq!(dst.to_vec::<f32>(), vec![7.0; 16]);
    }

    #[test]
    fn test_vector_donates_same_itemsize() {
        let src = Array::from_vec(vec![1.5f32, 2.5, -3.5], &[3]).unwrap();
        let mut dst = Array::zeros(&[3], DType::I32);
        copy(&src, &mut dst, CopyType::Vector);
        // f32 and i32 share an itemsize, so the buffer moves and the cast
        // runs in place.
        assert!(dst.shares_buffer(&src));
        assert_eq!(dst.to_vec::<i32>(), vec![1, 2, -3]);
    }

    #[test]
    fn test_vector_shared_source_allocates() {
        let src = Array::from_vec(vec![1.0f32, 2.0], &[2]).unwrap();
        let held = src.clone();
        let mut dst = Array::zeros(&[2], DType::F32);
        copy(&src, &mut dst, CopyType::Vector);
        assert!(!dst.shares_buffer(&src));
        assert_eq!(dst.to_vec::<f32>(), vec![1.0, 2.0]);
        assert_eq!(held.to_vec::<f32>(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_vector_itemsize_change_allocates() {
        let src = Array::from_vec(vec![1.0f32, 2.0, 3.0], &[3]).unwrap();
        let mut dst = Array::zeros(&[3], DType::F16);
        copy(&src, &mut dst, CopyType::Vector);
        assert!(!dst.shares_buffer(&src));
        assert_eq!(
            dst.to_vec::<f16>(),
            vec![f16::from_f32(1.0), f16::from_f32(2.0), f16::from_f32(3.0)],
        );
    }

    #[test]
    fn test_general_from_transposed_view() {
        let base = Array::from_vec((0..6).collect::<Vec<i32>>(), &[2, 3]).unwrap();
        let t = base.as_strided(&[3, 2], &[1, 3], 0).unwrap();
        let mut dst = Array::zeros(&[3, 2], DType::I32);
        copy(&t, &mut dst, CopyType::General);
        assert!(dst.flags().row_contiguous);
        assert_eq!(dst.to_vec::<i32>(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_general_general_demotes_to_general() {
        let base = Array::from_vec((0..6).collect::<Vec<i32>>(), &[2, 3]).unwrap();
        let t = base.as_strided(&[3, 2], &[1, 3], 0).unwrap();
        let mut dst = Array::zeros(&[3, 2], DType::I32);
        copy(&t, &mut dst, CopyType::GeneralGeneral);
        // Freshly provisioned destinations are contiguous, so the result
        // matches the plain general copy.
        assert_eq!(dst.to_vec::<i32>(), vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(dst.strides(), &[2, 1]);
    }

    #[test]
    fn test_copy_inplace_strided_subblock() {
        let src = Array::from_vec(vec![9.0f32; 4], &[2, 2]).unwrap();
        let mut dst = Array::zeros(&[3, 3], DType::F32);
        copy_inplace_strided::<i64>(
            &src,
            &mut dst,
            &[2, 2],
            &[2, 1],
            &[3, 1],
            0,
            4,
            CopyType::GeneralGeneral,
        );
        #[rustfmt::skip]
        let want = vec![
            0.0, 0.0, 0.0,
            0.0, 9.0, 9.0,
            0.0, 9.0, 9.0,
        ];
        assert_eq!(dst.to_vec::<f32>(), want);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "destination holds")]
    fn test_general_copy_past_capacity_panics() {
        let src = Array::from_vec((0..8).map(|i| i as f32).collect::<Vec<_>>(), &[8]).unwrap();
        let mut dst = Array::zeros(&[4], DType::F32);
        copy_inplace_strided::<isize>(&src, &mut dst, &[8], &[1], &[1], 0, 0, CopyType::General);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "destination layout")]
    fn test_dual_strided_copy_past_capacity_panics() {
        let src = Array::from_vec(vec![1.0f32; 6], &[2, 3]).unwrap();
        let mut dst = Array::zeros(&[2, 3], DType::F32);
        // Row stride 4 pushes the last element one past the buffer.
        copy_inplace_strided::<isize>(
            &src,
            &mut dst,
            &[2, 3],
            &[3, 1],
            &[4, 1],
            0,
            0,
            CopyType::GeneralGeneral,
        );
    }
}
