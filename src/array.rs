//! Dtype-erased array container: a shared byte buffer plus layout metadata.
//!
//! [`Array`] is the minimal host-side container the copy engine operates
//! on. The backing [`Buffer`] is reference-counted so a copy can donate the
//! source storage to its destination instead of allocating; layout metadata
//! (shape, strides, base offset, contiguity flags, materialized element
//! count) travels alongside the buffer.

use std::sync::Arc;

use crate::buffer::{malloc_or_wait, Buffer};
use crate::dtype::{DType, Element};
use crate::layout::{elem_to_loc, row_major_strides};
use crate::{CopyError, Result};

// ============================================================================
// Contiguity flags
// ============================================================================

/// Contiguity summary that travels with a buffer.
///
/// `row_contiguous` and `col_contiguous` describe the stride pattern against
/// the shape (ignoring axes of extent 1); `contiguous` is their disjunction,
/// meaning the elements occupy one gap-free span in some traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub contiguous: bool,
    pub row_contiguous: bool,
    pub col_contiguous: bool,
}

fn is_row_contiguous(shape: &[usize], strides: &[isize]) -> bool {
    let mut expected = 1isize;
    for (&dim, &stride) in shape.iter().zip(strides.iter()).rev() {
        if dim <= 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim as isize);
    }
    true
}

fn is_col_contiguous(shape: &[usize], strides: &[isize]) -> bool {
    let mut expected = 1isize;
    for (&dim, &stride) in shape.iter().zip(strides.iter()) {
        if dim <= 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim as isize);
    }
    true
}

pub(crate) fn contiguity_flags(shape: &[usize], strides: &[isize]) -> Flags {
    let row_contiguous = is_row_contiguous(shape, strides);
    let col_contiguous = is_col_contiguous(shape, strides);
    Flags {
        contiguous: row_contiguous || col_contiguous,
        row_contiguous,
        col_contiguous,
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that every offset reachable through `shape`/`strides`/`offset`
/// stays within `[0, len)` elements.
fn validate_bounds(len: usize, shape: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if shape.len() != strides.len() {
        return Err(CopyError::RankMismatch {
            shape: shape.len(),
            strides: strides.len(),
        });
    }
    // An empty view reaches nothing.
    if shape.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in shape.iter().zip(strides.iter()) {
        if dim > 1 {
            let span = stride
                .checked_mul(dim as isize - 1)
                .ok_or(CopyError::OffsetOverflow)?;
            if span >= 0 {
                max_offset = max_offset
                    .checked_add(span)
                    .ok_or(CopyError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(span)
                    .ok_or(CopyError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset as usize >= len {
        return Err(CopyError::OutOfBounds {
            offset: if min_offset < 0 { min_offset } else { max_offset },
            len,
        });
    }
    Ok(())
}

// ============================================================================
// Array
// ============================================================================

/// An n-dimensional array over a shared, dtype-erased byte buffer.
///
/// Cloning an `Array` clones the layout but shares the buffer; a shared
/// buffer is what makes the source of a copy non-donatable.
#[derive(Clone)]
pub struct Array {
    data: Arc<Buffer>,
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: isize,
    data_size: usize,
    flags: Flags,
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("data_size", &self.data_size)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Array {
    /// Build a row-major contiguous array that owns `data`.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Array> {
        let size: usize = shape.iter().product();
        if size != data.len() {
            return Err(CopyError::ShapeDataMismatch {
                expected: size,
                got: data.len(),
            });
        }
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let buffer = malloc_or_wait(bytes.len());
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.as_mut_ptr(), bytes.len());
        }
        let strides = row_major_strides(shape);
        let flags = contiguity_flags(shape, &strides);
        Ok(Array {
            data: Arc::new(buffer),
            dtype: T::DTYPE,
            shape: shape.to_vec(),
            strides,
            offset: 0,
            data_size: data.len(),
            flags,
        })
    }

    /// Zero-filled row-major array.
    ///
    /// The all-zero byte pattern is a valid value for every supported dtype.
    pub fn zeros(shape: &[usize], dtype: DType) -> Array {
        let size: usize = shape.iter().product();
        let nbytes = size * dtype.size_of();
        let buffer = malloc_or_wait(nbytes);
        unsafe { std::ptr::write_bytes(buffer.as_mut_ptr(), 0, nbytes) };
        let strides = row_major_strides(shape);
        let flags = contiguity_flags(shape, &strides);
        Array {
            data: Arc::new(buffer),
            dtype,
            shape: shape.to_vec(),
            strides,
            offset: 0,
            data_size: size,
            flags,
        }
    }

    /// View over the same buffer with an explicit layout.
    ///
    /// `offset` is measured in elements from the start of the buffer.
    /// Validates that every reachable element lies inside the buffer,
    /// failing on out-of-range layouts and on offset arithmetic overflow.
    pub fn as_strided(&self, shape: &[usize], strides: &[isize], offset: isize) -> Result<Array> {
        self.check_layout(shape, strides, offset)?;
        Ok(Array {
            data: Arc::clone(&self.data),
            dtype: self.dtype,
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
            data_size: self.data_size,
            flags: contiguity_flags(shape, strides),
        })
    }

    /// Buffer capacity in elements of this array's dtype.
    pub(crate) fn capacity(&self) -> usize {
        self.data.len() / self.itemsize()
    }

    /// Validate an explicit layout against this array's buffer.
    pub(crate) fn check_layout(
        &self,
        shape: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<()> {
        validate_bounds(self.capacity(), shape, strides, offset)
    }

    /// Number of logical elements, the product of the shape.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Size of one element in bytes.
    pub fn itemsize(&self) -> usize {
        self.dtype.size_of()
    }

    /// Logical size in bytes.
    pub fn nbytes(&self) -> usize {
        self.size() * self.itemsize()
    }

    /// Count of elements actually materialized in the buffer. Differs from
    /// [`size`](Array::size) for broadcast views, which visit the same
    /// materialized elements more than once.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Base offset into the buffer, in elements.
    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Whether this array is the only owner of its buffer, making the
    /// buffer eligible for donation to a copy destination.
    pub fn is_donatable(&self) -> bool {
        Arc::strong_count(&self.data) == 1
    }

    /// Whether `self` and `other` share one backing buffer.
    pub fn shares_buffer(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Typed pointer to the element at the base offset.
    ///
    /// The dtype tag must match `T`; entry points check this in debug
    /// builds only and otherwise trust the caller.
    #[inline]
    pub fn data_ptr<T: Element>(&self) -> *const T {
        debug_assert_eq!(self.dtype, T::DTYPE);
        unsafe { self.data.as_ptr().cast::<T>().offset(self.offset) }
    }

    /// Mutable typed pointer to the element at the base offset.
    #[inline]
    pub fn data_ptr_mut<T: Element>(&mut self) -> *mut T {
        debug_assert_eq!(self.dtype, T::DTYPE);
        unsafe { self.data.as_mut_ptr().cast::<T>().offset(self.offset) }
    }

    /// Value at row-major logical position `index`, resolved through the
    /// strides.
    ///
    /// # Panics
    ///
    /// Panics when `T` does not match the dtype tag or `index` is out of
    /// range.
    pub fn item<T: Element>(&self, index: usize) -> T {
        assert_eq!(self.dtype, T::DTYPE, "item::<{}> on {} array", T::DTYPE, self.dtype);
        assert!(index < self.size(), "index {index} out of range for size {}", self.size());
        let loc = elem_to_loc::<isize>(index, &self.shape, &self.strides);
        unsafe { *self.data_ptr::<T>().offset(loc) }
    }

    /// Materialize the logical contents in row-major order.
    ///
    /// # Panics
    ///
    /// Panics when `T` does not match the dtype tag.
    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        (0..self.size()).map(|i| self.item::<T>(i)).collect()
    }

    /// Adopt a freshly allocated buffer with standard row-major layout.
    pub(crate) fn set_data(&mut self, buffer: Buffer) {
        self.strides = row_major_strides(&self.shape);
        self.flags = contiguity_flags(&self.shape, &self.strides);
        self.data_size = self.size();
        self.offset = 0;
        self.data = Arc::new(buffer);
    }

    /// Adopt a freshly allocated buffer, inheriting an explicit layout.
    pub(crate) fn set_data_with_layout(
        &mut self,
        buffer: Buffer,
        data_size: usize,
        strides: Vec<isize>,
        flags: Flags,
    ) {
        self.strides = strides;
        self.flags = flags;
        self.data_size = data_size;
        self.offset = 0;
        self.data = Arc::new(buffer);
    }

    /// Donate `src`'s storage: share the buffer and take over its layout.
    pub(crate) fn copy_shared_buffer(&mut self, src: &Array) {
        self.data = Arc::clone(&src.data);
        self.strides = src.strides.clone();
        self.flags = src.flags;
        self.data_size = src.data_size;
        self.offset = src.offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_layout() {
        let a = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(a.dtype(), DType::F32);
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a.strides(), &[3, 1]);
        assert_eq!(a.size(), 6);
        assert_eq!(a.data_size(), 6);
        assert_eq!(a.nbytes(), 24);
        assert!(a.flags().row_contiguous);
        assert!(a.flags().contiguous);
        assert!(!a.flags().col_contiguous);
        assert_eq!(a.item::<f32>(4), 5.0);
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let err = Array::from_vec(vec![1u8, 2, 3], &[2, 2]).unwrap_err();
        assert!(matches!(err, CopyError::ShapeDataMismatch { expected: 4, got: 3 }));
    }

    #[test]
    fn test_scalar_array() {
        let a = Array::from_vec(vec![42i64], &[]).unwrap();
        assert_eq!(a.size(), 1);
        assert_eq!(a.ndim(), 0);
        assert_eq!(a.item::<i64>(0), 42);
    }

    #[test]
    fn test_zeros() {
        let a = Array::zeros(&[3, 2], DType::I16);
        assert_eq!(a.to_vec::<i16>(), vec![0i16; 6]);
        assert!(a.flags().row_contiguous);
    }

    #[test]
    fn test_as_strided_transpose() {
        let a = Array::from_vec((0..6).collect::<Vec<i32>>(), &[2, 3]).unwrap();
        let t = a.as_strided(&[3, 2], &[1, 3], 0).unwrap();
        // Rows of the transpose walk the original columns.
        assert_eq!(t.to_vec::<i32>(), vec![0, 3, 1, 4, 2, 5]);
        assert!(t.shares_buffer(&a));
        assert!(!t.flags().contiguous);
    }

    #[test]
    fn test_as_strided_reversed() {
        let a = Array::from_vec((0..5).collect::<Vec<u8>>(), &[5]).unwrap();
        let r = a.as_strided(&[5], &[-1], 4).unwrap();
        assert_eq!(r.to_vec::<u8>(), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_as_strided_broadcast() {
        let a = Array::from_vec(vec![1.5f32, 2.5], &[2]).unwrap();
        let b = a.as_strided(&[3, 2], &[0, 1], 0).unwrap();
        assert_eq!(b.size(), 6);
        // data_size still counts the two materialized elements.
        assert_eq!(b.data_size(), 2);
        assert_eq!(b.to_vec::<f32>(), vec![1.5, 2.5, 1.5, 2.5, 1.5, 2.5]);
    }

    #[test]
    fn test_as_strided_out_of_bounds() {
        let a = Array::from_vec(vec![0u32; 6], &[6]).unwrap();
        assert!(matches!(
            a.as_strided(&[7], &[1], 0),
            Err(CopyError::OutOfBounds { .. })
        ));
        assert!(matches!(
            a.as_strided(&[2], &[1], -1),
            Err(CopyError::OutOfBounds { .. })
        ));
        assert!(matches!(
            a.as_strided(&[2, 3], &[1], 0),
            Err(CopyError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_as_strided_overflow() {
        let a = Array::from_vec(vec![0u32; 4], &[4]).unwrap();
        let err = a.as_strided(&[usize::MAX / 2], &[isize::MAX / 2], 0).unwrap_err();
        assert!(matches!(err, CopyError::OffsetOverflow));
    }

    #[test]
    fn test_donatable_tracks_buffer_sharing() {
        let a = Array::from_vec(vec![1u8, 2], &[2]).unwrap();
        assert!(a.is_donatable());
        let view = a.as_strided(&[2], &[1], 0).unwrap();
        assert!(!a.is_donatable());
        drop(view);
        assert!(a.is_donatable());
        let clone = a.clone();
        assert!(!a.is_donatable());
        drop(clone);
        assert!(a.is_donatable());
    }

    #[test]
    fn test_contiguity_flags_column_major() {
        let flags = contiguity_flags(&[3, 2], &[1, 3]);
        assert!(flags.col_contiguous);
        assert!(!flags.row_contiguous);
        assert!(flags.contiguous);

        // One effective axis counts as both orders.
        let flags = contiguity_flags(&[1, 5], &[5, 1]);
        assert!(flags.row_contiguous && flags.col_contiguous);
    }
}
