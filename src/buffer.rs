//! Raw byte buffers and the blocking allocation primitive.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::CACHE_LINE_SIZE;

/// Owned, cache-line-aligned byte buffer backing an array.
///
/// The buffer is dtype-erased; typed access goes through
/// [`Array::data_ptr`](crate::Array::data_ptr). Alignment is fixed at
/// [`CACHE_LINE_SIZE`] so every supported element type can be loaded from
/// any element boundary without misalignment.
pub struct Buffer {
    ptr: NonNull<u8>,
    layout: Layout,
    len: usize,
}

// The allocation is uniquely owned and only handed out as raw pointers.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Length of the buffer in bytes, as requested at allocation.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read-only base pointer.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable base pointer.
    ///
    /// Buffers are shared through `Arc` after donation, so this takes
    /// `&self`; writes are sequenced by the caller holding `&mut` on the
    /// owning array. The pointer must not be written through while any
    /// other live reference reads the same bytes.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

/// Allocate `nbytes` of cache-line-aligned storage, waiting under pressure.
///
/// This primitive never returns failure: if the global allocator reports
/// exhaustion the call yields and retries until the request can be
/// satisfied. A zero-byte request still produces a valid (one-line)
/// allocation so base pointers are always aligned and dereferenceable.
pub fn malloc_or_wait(nbytes: usize) -> Buffer {
    let layout = match Layout::from_size_align(nbytes.max(1), CACHE_LINE_SIZE) {
        Ok(layout) => layout,
        // Rounding the size up to the alignment overflowed isize; no
        // allocator can satisfy this request, so report it as exhaustion.
        Err(_) => alloc::handle_alloc_error(Layout::new::<u8>()),
    };
    let mut ptr = unsafe { alloc::alloc(layout) };
    while ptr.is_null() {
        std::thread::yield_now();
        ptr = unsafe { alloc::alloc(layout) };
    }
    // Null was just excluded by the retry loop.
    let ptr = match NonNull::new(ptr) {
        Some(ptr) => ptr,
        None => alloc::handle_alloc_error(layout),
    };
    Buffer {
        ptr,
        layout,
        len: nbytes,
    }
}
