//! Copy-and-cast kernels for strided multidimensional arrays.
//!
//! This crate moves elements between arrays whose layouts are described by
//! shapes, per-axis strides, and a base offset, converting between element
//! types on the fly. Broadcast views (stride 0), reversed axes (negative
//! strides), and rank-changing reinterpretations all go through the same
//! four copy strategies.
//!
//! # Core Types
//!
//! - [`Array`]: Dtype-erased container pairing a shared byte buffer with
//!   shape, strides, offset, and contiguity [`Flags`]
//! - [`DType`] / [`Element`]: Runtime dtype tags and the trait connecting
//!   them to concrete element types, with casts between all pairs
//! - [`CopyType`]: The traversal strategy, chosen from the source's and
//!   destination's contiguity
//!
//! # Primary API
//!
//! - [`copy`]: Provision the destination (donating the source buffer when
//!   possible) and copy
//! - [`copy_inplace`]: Copy into an already-provisioned destination
//! - [`copy_inplace_strided`]: Copy with an explicit shape, strides, and
//!   offsets, for slicing without materializing views
//!
//! # Example
//!
//! ```rust
//! use strided_copy::{copy, Array, CopyType, DType};
//!
//! let src = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
//! let mut dst = Array::zeros(&[2, 3], DType::I32);
//!
//! // Contiguous source: flat cast-copy.
//! copy(&src, &mut dst, CopyType::Vector);
//! assert_eq!(dst.to_vec::<i32>(), vec![1, 2, 3, 4, 5, 6]);
//! ```
//!
//! # Strided Example
//!
//! ```rust
//! use strided_copy::{copy, Array, CopyType, DType};
//!
//! let base = Array::from_vec((0..6).collect::<Vec<i32>>(), &[2, 3]).unwrap();
//! // Zero-copy transpose.
//! let transposed = base.as_strided(&[3, 2], &[1, 3], 0).unwrap();
//!
//! let mut dst = Array::zeros(&[3, 2], DType::F32);
//! copy(&transposed, &mut dst, CopyType::General);
//! assert_eq!(dst.to_vec::<f32>(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
//! ```
//!
//! # Dimension Collapsing
//!
//! Strided copies first merge adjacent axes that are jointly contiguous
//! across every stride vector involved, so a permuted-but-dense layout
//! degenerates to a handful of loops over long runs. The collapsed rank
//! selects a fixed-rank kernel (up to rank 7 for gather copies, rank 5 for
//! dual-strided ones); higher ranks fall back to per-element or per-block
//! offset arithmetic.

mod array;
mod buffer;
mod copy;
mod dtype;
mod kernels;
mod layout;

// ============================================================================
// Core types
// ============================================================================
pub use array::{Array, Flags};
pub use dtype::{CastFrom, CastTo, DType, Element};

// ============================================================================
// Copy operations
// ============================================================================
pub use copy::{copy, copy_inplace, copy_inplace_strided, CopyType};

// ============================================================================
// Layout utilities
// ============================================================================
pub use layout::{collapse_contiguous_dims, elem_to_loc, row_major_strides, Stride};

// ============================================================================
// Allocation
// ============================================================================
pub use buffer::{malloc_or_wait, Buffer};

// ============================================================================
// Constants
// ============================================================================

/// Cache line size in bytes.
///
/// Fresh buffers are aligned to this so kernel inner loops never straddle
/// a line at element zero.
pub const CACHE_LINE_SIZE: usize = 64;

// ============================================================================
// Error types
// ============================================================================

/// Errors from array construction and view validation.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// Shape and stride vectors disagree in length.
    #[error("rank mismatch: {shape} dims vs {strides} strides")]
    RankMismatch { shape: usize, strides: usize },

    /// Element count implied by the shape differs from the data length.
    #[error("shape implies {expected} elements, data has {got}")]
    ShapeDataMismatch { expected: usize, got: usize },

    /// Integer overflow while computing a buffer offset.
    #[error("offset overflow while validating layout")]
    OffsetOverflow,

    /// Layout reaches outside the backing buffer.
    #[error("offset {offset} out of bounds for buffer of {len} elements")]
    OutOfBounds { offset: isize, len: usize },
}

/// Result type for array construction and view validation.
pub type Result<T> = std::result::Result<T, CopyError>;
