//! Copy kernels, rank-specialized where it pays.
//!
//! Each strategy has a driver that collapses the layout first and then
//! dispatches on the collapsed rank: explicit nested loops with precomputed
//! stride carries for source-strided copies up to rank 7, runtime recursion
//! over axes for dual-strided copies up to rank 5, and gather fallbacks
//! above that. Destination buffers may be freshly allocated and therefore
//! uninitialized; every kernel writes through raw pointers and never reads
//! the destination.

use crate::array::Array;
use crate::dtype::{CastTo, Element};
use crate::layout::{collapse_contiguous_dims, elem_to_loc, Stride};

// ============================================================================
// Contiguous strategies
// ============================================================================

/// Broadcast the single source element over the whole destination.
pub(crate) fn copy_single<S, D>(src: &Array, dst: &mut Array)
where
    S: Element + CastTo<D>,
    D: Element,
{
    let val: D = unsafe { (*src.data_ptr::<S>()).cast_to() };
    let dst_ptr = dst.data_ptr_mut::<D>();
    for i in 0..dst.size() {
        unsafe { dst_ptr.add(i).write(val) };
    }
}

/// Flat cast-copy of the source's materialized elements.
///
/// Runs over `src.data_size()`, not `src.size()`, so broadcast layouts are
/// copied without expansion. Safe when source and destination share one
/// donated buffer: each index is read before it is written.
pub(crate) fn copy_vector<S, D>(src: &Array, dst: &mut Array)
where
    S: Element + CastTo<D>,
    D: Element,
{
    let n = src.data_size();
    let src_ptr = src.data_ptr::<S>();
    let dst_ptr = dst.data_ptr_mut::<D>();
    if S::DTYPE == D::DTYPE {
        // Identical element type on both sides: one memmove.
        unsafe {
            std::ptr::copy(
                src_ptr.cast::<u8>(),
                dst_ptr.cast::<u8>(),
                n * std::mem::size_of::<S>(),
            );
        }
        return;
    }
    for i in 0..n {
        unsafe { dst_ptr.add(i).write((*src_ptr.add(i)).cast_to()) };
    }
}

// ============================================================================
// Source-strided kernels (destination is written linearly)
// ============================================================================

/// Safety: `shape`/`strides` must address valid elements of `src`, and
/// `dst` must have room for the product of `shape`.
unsafe fn copy_general_dim1<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let d0 = shape[0];
    let s0 = strides[0];
    let mut src_idx = I::ZERO;
    for i in 0..d0 {
        dst.add(i).write((*src.offset(src_idx.to_isize())).cast_to());
        src_idx = src_idx + s0;
    }
}

unsafe fn copy_general_dim2<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1) = (shape[0], shape[1]);
    let (s0, s1) = (strides[0], strides[1]);
    // Carry applied when the inner axis wraps.
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            dst.add(dst_idx).write((*src.offset(src_idx.to_isize())).cast_to());
            dst_idx += 1;
            src_idx = src_idx + s1;
        }
        src_idx = src_idx + s0_adj;
    }
}

unsafe fn copy_general_dim3<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1, d2) = (shape[0], shape[1], shape[2]);
    let (s0, s1, s2) = (strides[0], strides[1], strides[2]);
    let s1_adj = s1 - s2 * I::from_extent(d2);
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            for _ in 0..d2 {
                dst.add(dst_idx).write((*src.offset(src_idx.to_isize())).cast_to());
                dst_idx += 1;
                src_idx = src_idx + s2;
            }
            src_idx = src_idx + s1_adj;
        }
        src_idx = src_idx + s0_adj;
    }
}

unsafe fn copy_general_dim4<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1, d2, d3) = (shape[0], shape[1], shape[2], shape[3]);
    let (s0, s1, s2, s3) = (strides[0], strides[1], strides[2], strides[3]);
    let s2_adj = s2 - s3 * I::from_extent(d3);
    let s1_adj = s1 - s2 * I::from_extent(d2);
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            for _ in 0..d2 {
                for _ in 0..d3 {
                    dst.add(dst_idx).write((*src.offset(src_idx.to_isize())).cast_to());
                    dst_idx += 1;
                    src_idx = src_idx + s3;
                }
                src_idx = src_idx + s2_adj;
            }
            src_idx = src_idx + s1_adj;
        }
        src_idx = src_idx + s0_adj;
    }
}

unsafe fn copy_general_dim5<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1, d2, d3, d4) = (shape[0], shape[1], shape[2], shape[3], shape[4]);
    let (s0, s1, s2, s3, s4) = (strides[0], strides[1], strides[2], strides[3], strides[4]);
    let s3_adj = s3 - s4 * I::from_extent(d4);
    let s2_adj = s2 - s3 * I::from_extent(d3);
    let s1_adj = s1 - s2 * I::from_extent(d2);
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            for _ in 0..d2 {
                for _ in 0..d3 {
                    for _ in 0..d4 {
                        dst.add(dst_idx).write((*src.offset(src_idx.to_isize())).cast_to());
                        dst_idx += 1;
                        src_idx = src_idx + s4;
                    }
                    src_idx = src_idx + s3_adj;
                }
                src_idx = src_idx + s2_adj;
            }
            src_idx = src_idx + s1_adj;
        }
        src_idx = src_idx + s0_adj;
    }
}

unsafe fn copy_general_dim6<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1, d2, d3, d4, d5) =
        (shape[0], shape[1], shape[2], shape[3], shape[4], shape[5]);
    let (s0, s1, s2, s3, s4, s5) = (
        strides[0], strides[1], strides[2], strides[3], strides[4], strides[5],
    );
    let s4_adj = s4 - s5 * I::from_extent(d5);
    let s3_adj = s3 - s4 * I::from_extent(d4);
    let s2_adj = s2 - s3 * I::from_extent(d3);
    let s1_adj = s1 - s2 * I::from_extent(d2);
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            for _ in 0..d2 {
                for _ in 0..d3 {
                    for _ in 0..d4 {
                        for _ in 0..d5 {
                            dst.add(dst_idx).write((*src.offset(src_idx.to_isize())).cast_to());
                            dst_idx += 1;
                            src_idx = src_idx + s5;
                        }
                        src_idx = src_idx + s4_adj;
                    }
                    src_idx = src_idx + s3_adj;
                }
                src_idx = src_idx + s2_adj;
            }
            src_idx = src_idx + s1_adj;
        }
        src_idx = src_idx + s0_adj;
    }
}

unsafe fn copy_general_dim7<S, D, I>(src: *const S, dst: *mut D, shape: &[usize], strides: &[I])
where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (d0, d1, d2, d3, d4, d5, d6) = (
        shape[0], shape[1], shape[2], shape[3], shape[4], shape[5], shape[6],
    );
    let (s0, s1, s2, s3, s4, s5, s6) = (
        strides[0], strides[1], strides[2], strides[3], strides[4], strides[5], strides[6],
    );
    let s5_adj = s5 - s6 * I::from_extent(d6);
    let s4_adj = s4 - s5 * I::from_extent(d5);
    let s3_adj = s3 - s4 * I::from_extent(d4);
    let s2_adj = s2 - s3 * I::from_extent(d3);
    let s1_adj = s1 - s2 * I::from_extent(d2);
    let s0_adj = s0 - s1 * I::from_extent(d1);
    let mut src_idx = I::ZERO;
    let mut dst_idx = 0usize;
    for _ in 0..d0 {
        for _ in 0..d1 {
            for _ in 0..d2 {
                for _ in 0..d3 {
                    for _ in 0..d4 {
                        for _ in 0..d5 {
                            for _ in 0..d6 {
                                dst.add(dst_idx)
                                    .write((*src.offset(src_idx.to_isize())).cast_to());
                                dst_idx += 1;
                                src_idx = src_idx + s6;
                            }
                            src_idx = src_idx + s5_adj;
                        }
                        src_idx = src_idx + s4_adj;
                    }
                    src_idx = src_idx + s3_adj;
                }
                src_idx = src_idx + s2_adj;
            }
            src_idx = src_idx + s1_adj;
        }
        src_idx = src_idx + s0_adj;
    }
}

/// Strided gather from `src` into a linearly written `dst`.
///
/// Collapses the layout, then runs the matching fixed-rank kernel; layouts
/// that still exceed rank 7 fall back to per-element offset computation.
pub(crate) fn copy_general<S, D, I>(
    src: &Array,
    dst: &mut Array,
    data_shape: &[usize],
    i_strides: &[I],
    i_offset: i64,
) where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let (shape, strides) = collapse_contiguous_dims(data_shape, &[i_strides]);
    let strides = &strides[0];
    let src_ptr = unsafe { src.data_ptr::<S>().offset(i_offset as isize) };
    let dst_ptr = dst.data_ptr_mut::<D>();
    unsafe {
        match shape.len() {
            1 => copy_general_dim1::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            2 => copy_general_dim2::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            3 => copy_general_dim3::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            4 => copy_general_dim4::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            5 => copy_general_dim5::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            6 => copy_general_dim6::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            7 => copy_general_dim7::<S, D, I>(src_ptr, dst_ptr, &shape, strides),
            rank => {
                log::trace!("per-element gather for collapsed rank {rank}");
                let total: usize = shape.iter().product();
                for i in 0..total {
                    let loc = elem_to_loc::<I>(i, &shape, strides);
                    dst_ptr.add(i).write((*src_ptr.offset(loc.to_isize())).cast_to());
                }
            }
        }
    }
}

// ============================================================================
// Dual-strided kernels
// ============================================================================

/// Safety: for every index combination under `shape[axis..]`, both stride
/// walks must stay inside their buffers.
unsafe fn copy_general_general_dims<S, D, I>(
    src: *const S,
    dst: *mut D,
    shape: &[usize],
    i_strides: &[I],
    o_strides: &[I],
    axis: usize,
) where
    S: Element + CastTo<D>,
    D: Element,
    I: Stride,
{
    let n = shape[axis];
    let stride_src = i_strides[axis].to_isize();
    let stride_dst = o_strides[axis].to_isize();
    if axis + 1 == shape.len() {
        let mut src_ptr = src;
        let mut dst_ptr = dst;
        for _ in 0..n {
            dst_ptr.write((*src_ptr).cast_to());
            src_ptr = src_ptr.offset(stride_src);
            dst_ptr = dst_ptr.offset(stride_dst);
        }
        return;
    }
    let mut src = src;
    let mut dst = dst;
    for _ in 0..n {
        copy_general_general_dims::<S, D, I>(src, dst, shape, i_strides, o_strides, axis + 1);
        src = src.offset(stride_src);
        dst = dst.offset(stride_dst);
    }
}

/// Strided gather-scatter: both sides walk their own strides.
///
/// Collapsed layouts up to rank 5 recurse directly. Above that, the flat
/// index steps by the product of the trailing five extents; each step lands
/// on a block boundary, so resolving the two origins once per block and
/// recursing over the trailing axes visits every element exactly once.
pub(crate) fn copy_general_general<S, D, I>(
    src: &Array,
    dst: &mut Array,
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
    let (shape, strides) = collapse_contiguous_dims(data_shape, &[i_strides, o_strides]);
    let istr = &strides[0];
    let ostr = &strides[1];
    let src_base = unsafe { src.data_ptr::<S>().offset(i_offset as isize) };
    let dst_base = unsafe { dst.data_ptr_mut::<D>().offset(o_offset as isize) };
    let rank = shape.len();
    if rank <= 5 {
        unsafe {
            copy_general_general_dims::<S, D, I>(src_base, dst_base, &shape, istr, ostr, 0);
        }
        return;
    }
    log::trace!("block fallback for collapsed rank {rank}");
    let block: usize = shape[rank - 5..].iter().product();
    let total: usize = shape.iter().product();
    let mut i = 0;
    while i < total {
        let src_loc = elem_to_loc::<I>(i, &shape, istr);
        let dst_loc = elem_to_loc::<I>(i, &shape, ostr);
        unsafe {
            copy_general_general_dims::<S, D, I>(
                src_base.offset(src_loc.to_isize()),
                dst_base.offset(dst_loc.to_isize()),
                &shape,
                istr,
                ostr,
                rank - 5,
            );
        }
        i += block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::dtype::DType;

    // Reference gather: resolve every logical index through the strides.
    fn gather_f32(src: &Array, shape: &[usize], strides: &[isize], offset: isize) -> Vec<f32> {
        let total: usize = shape.iter().product();
        (0..total)
            .map(|i| {
                let loc = offset + elem_to_loc::<isize>(i, shape, strides);
                unsafe { *src.data_ptr::<f32>().offset(loc) }
            })
            .collect()
    }

    fn arange_f32(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_copy_single_fills_destination() {
        let src = Array::from_vec(vec![2.5f32], &[]).unwrap();
        let mut dst = Array::zeros(&[2, 3], DType::I32);
        copy_single::<f32, i32>(&src, &mut dst);
        assert_eq!(dst.to_vec::<i32>(), vec![2; 6]);
    }

    #[test]
    fn test_copy_vector_casts() {
        let src = Array::from_vec(vec![1u8, 2, 200, 255], &[4]).unwrap();
        let mut dst = Array::zeros(&[4], DType::F32);
        copy_vector::<u8, f32>(&src, &mut dst);
        assert_eq!(dst.to_vec::<f32>(), vec![1.0, 2.0, 200.0, 255.0]);
    }

    #[test]
    fn test_copy_vector_same_dtype_memcpy() {
        let src = Array::from_vec(arange_f32(64), &[64]).unwrap();
        let mut dst = Array::zeros(&[64], DType::F32);
        copy_vector::<f32, f32>(&src, &mut dst);
        assert_eq!(dst.to_vec::<f32>(), arange_f32(64));
    }

    // Power-of-three strides never satisfy the merge condition, so the
    // collapsed rank equals the input rank and every fixed-rank kernel runs.
    #[test]
    fn test_copy_general_all_ranks() {
        for rank in 1..=7u32 {
            let shape = vec![2usize; rank as usize];
            let strides: Vec<isize> = (0..rank).map(|i| 3isize.pow(rank - 1 - i)).collect();
            let span = strides.iter().sum::<isize>() as usize + 1;
            let base = Array::from_vec(arange_f32(span), &[span]).unwrap();
            let view = base.as_strided(&shape, &strides, 0).unwrap();

            let mut dst = Array::zeros(&shape, DType::F32);
            copy_general::<f32, f32, isize>(&view, &mut dst, &shape, &strides, 0);
            assert_eq!(
                dst.to_vec::<f32>(),
                gather_f32(&base, &shape, &strides, 0),
                "rank {rank}",
            );
        }
    }

    #[test]
    fn test_copy_general_negative_stride() {
        let base = Array::from_vec(arange_f32(6), &[2, 3]).unwrap();
        // Rows reversed: last row first.
        let strides = [-3isize, 1];
        let mut dst = Array::zeros(&[2, 3], DType::F32);
        copy_general::<f32, f32, isize>(&base, &mut dst, &[2, 3], &strides, 3);
        assert_eq!(dst.to_vec::<f32>(), vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
    }

    // Strides chosen as powers of three so no adjacent pair can merge; the
    // collapsed rank stays 8 and the gather fallback runs.
    #[test]
    fn test_copy_general_rank8_fallback() {
        let shape = vec![2usize; 8];
        let strides: Vec<isize> = (0..8).map(|i| 3isize.pow(7 - i)).collect();
        let max_loc: isize = strides.iter().sum();
        let base = Array::from_vec(arange_f32(max_loc as usize + 1), &[max_loc as usize + 1])
            .unwrap();
        let view = base.as_strided(&shape, &strides, 0).unwrap();

        let mut dst = Array::zeros(&shape, DType::F32);
        copy_general::<f32, f32, isize>(&view, &mut dst, &shape, &strides, 0);
        assert_eq!(dst.to_vec::<f32>(), gather_f32(&base, &shape, &strides, 0));
    }

    #[test]
    fn test_copy_general_zero_stride_broadcast() {
        let src = Array::from_vec(arange_f32(4), &[4]).unwrap();
        let shape = [3usize, 4];
        let strides = [0isize, 1];
        let view = src.as_strided(&shape, &strides, 0).unwrap();

        let mut dst = Array::zeros(&shape, DType::F32);
        copy_general::<f32, f32, isize>(&view, &mut dst, &shape, &strides, 0);
        assert_eq!(
            dst.to_vec::<f32>(),
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0],
        );
    }

    #[test]
    fn test_copy_general_offset_applied() {
        let src = Array::from_vec(arange_f32(10), &[10]).unwrap();
        let mut dst = Array::zeros(&[4], DType::F32);
        copy_general::<f32, f32, isize>(&src, &mut dst, &[4], &[1], 3);
        assert_eq!(dst.to_vec::<f32>(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_copy_general_general_transpose_scatter() {
        // Write a row-major 2x3 source into a column-major destination.
        let src = Array::from_vec(arange_f32(6), &[2, 3]).unwrap();
        let mut dst = Array::zeros(&[2, 3], DType::F32);
        copy_general_general::<f32, f32, isize>(
            &src,
            &mut dst,
            &[2, 3],
            &[3, 1],
            &[1, 2],
            0,
            0,
        );
        // dst laid out column-major now holds [0, 3, 1, 4, 2, 5] linearly.
        let flat = dst.as_strided(&[6], &[1], 0).unwrap();
        assert_eq!(flat.to_vec::<f32>(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_copy_general_general_offsets() {
        // Copy a 2x2 source block into the center of a 4x4 destination.
        let src = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let mut dst = Array::zeros(&[4, 4], DType::F32);
        copy_general_general::<f32, f32, isize>(
            &src,
            &mut dst,
            &[2, 2],
            &[2, 1],
            &[4, 1],
            0,
            5,
        );
        #[rustfmt::skip]
        let want = vec![
            0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 2.0, 0.0,
            0.0, 3.0, 4.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        assert_eq!(dst.to_vec::<f32>(), want);
    }

    // Uncollapsible rank-6 and rank-7 layouts on both sides force the block
    // fallback; compare against a per-element gather-scatter.
    #[test]
    fn test_copy_general_general_block_fallback() {
        for rank in 6..=7u32 {
            let shape = vec![2usize; rank as usize];
            let strides: Vec<isize> = (0..rank).map(|i| 3isize.pow(rank - 1 - i)).collect();
            let span = strides.iter().sum::<isize>() as usize + 1;
            let base = Array::from_vec(arange_f32(span), &[span]).unwrap();
            let view = base.as_strided(&shape, &strides, 0).unwrap();

            let mut dst_fallback = Array::zeros(&[span], DType::F32);
            let dst_strides = strides.clone();
            copy_general_general::<f32, f32, isize>(
                &view,
                &mut dst_fallback,
                &shape,
                &strides,
                &dst_strides,
                0,
                0,
            );

            let total: usize = shape.iter().product();
            let mut want = vec![0.0f32; span];
            for i in 0..total {
                let s = elem_to_loc::<isize>(i, &shape, &strides);
                let d = elem_to_loc::<isize>(i, &shape, &dst_strides);
                want[d as usize] = base.item::<f32>(s as usize);
            }
            assert_eq!(dst_fallback.to_vec::<f32>(), want, "rank {rank}");
        }
    }

    #[test]
    fn test_copy_general_general_i64_strides() {
        let src = Array::from_vec(arange_f32(6), &[2, 3]).unwrap();
        let mut dst = Array::zeros(&[2, 3], DType::F32);
        copy_general_general::<f32, f32, i64>(
            &src,
            &mut dst,
            &[2, 3],
            &[3i64, 1],
            &[3i64, 1],
            0,
            0,
        );
        assert_eq!(dst.to_vec::<f32>(), arange_f32(6));
    }
}
