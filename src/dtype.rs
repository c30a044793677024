//! Element types, runtime dtype tags, and the cast matrix.
//!
//! Copy kernels are generic over a source and a destination element type.
//! The full set of supported element kinds is closed: one boolean, eight
//! integers, three floating-point formats, and one complex format. Every
//! ordered (source, destination) pair is a valid cast path; the conversions
//! use the destination type's built-in semantics (`as` casts for the
//! primitive types, through-`f32` conversion for the reduced-precision
//! floats, real-part extraction for complex sources).

use half::{bf16, f16};
use num_complex::Complex32;

/// Runtime tag for the element type stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    BF16,
    F32,
    /// Complex number made of two `f32` parts.
    C64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn size_of(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::C64 => 8,
        }
    }

    /// All supported dtypes, in tag order.
    pub const ALL: [DType; 13] = [
        DType::Bool,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::C64,
    ];
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::C64 => "complex64",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Cast traits
// ============================================================================

/// Conversion into `Self` from a source element value.
///
/// This is the conversion every copy kernel applies per element. It follows
/// the destination type's built-in rules and performs no saturation or
/// overflow checking beyond what those rules define.
pub trait CastFrom<S> {
    fn cast_from(v: S) -> Self;
}

/// Blanket inverse of [`CastFrom`], used as the kernel-side bound.
pub trait CastTo<D> {
    fn cast_to(self) -> D;
}

impl<S, D: CastFrom<S>> CastTo<D> for S {
    #[inline(always)]
    fn cast_to(self) -> D {
        D::cast_from(self)
    }
}

// ============================================================================
// Element trait
// ============================================================================

/// A storable element type, tied to its runtime [`DType`] tag.
///
/// The `CastTo` supertraits make every destination type reachable from a
/// single `S: Element` bound, which is what lets the two-level dtype
/// dispatch instantiate the full cast matrix.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + std::fmt::Debug
    + Send
    + Sync
    + bytemuck::NoUninit
    + CastTo<bool>
    + CastTo<u8>
    + CastTo<u16>
    + CastTo<u32>
    + CastTo<u64>
    + CastTo<i8>
    + CastTo<i16>
    + CastTo<i32>
    + CastTo<i64>
    + CastTo<f16>
    + CastTo<bf16>
    + CastTo<f32>
    + CastTo<Complex32>
    + 'static
{
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($t:ty => $tag:ident),* $(,)?) => {$(
        impl Element for $t {
            const DTYPE: DType = DType::$tag;
        }
    )*};
}

impl_element! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f16 => F16,
    bf16 => BF16,
    f32 => F32,
    Complex32 => C64,
}

// ============================================================================
// Cast matrix
// ============================================================================

/// Identity casts, one per element type.
macro_rules! impl_cast_identity {
    ($($t:ty),* $(,)?) => {$(
        impl CastFrom<$t> for $t {
            #[inline(always)]
            fn cast_from(v: $t) -> Self {
                v
            }
        }
    )*};
}

impl_cast_identity!(bool, u8, u16, u32, u64, i8, i16, i32, i64, f16, bf16, f32, Complex32);

/// Casts between distinct primitive numeric types via `as`.
macro_rules! impl_cast_as {
    ($src:ty => $($dst:ty),* $(,)?) => {$(
        impl CastFrom<$src> for $dst {
            #[inline(always)]
            fn cast_from(v: $src) -> Self {
                v as $dst
            }
        }
    )*};
}

impl_cast_as!(u8 => u16, u32, u64, i8, i16, i32, i64, f32);
impl_cast_as!(u16 => u8, u32, u64, i8, i16, i32, i64, f32);
impl_cast_as!(u32 => u8, u16, u64, i8, i16, i32, i64, f32);
impl_cast_as!(u64 => u8, u16, u32, i8, i16, i32, i64, f32);
impl_cast_as!(i8 => u8, u16, u32, u64, i16, i32, i64, f32);
impl_cast_as!(i16 => u8, u16, u32, u64, i8, i32, i64, f32);
impl_cast_as!(i32 => u8, u16, u32, u64, i8, i16, i64, f32);
impl_cast_as!(i64 => u8, u16, u32, u64, i8, i16, i32, f32);
impl_cast_as!(f32 => u8, u16, u32, u64, i8, i16, i32, i64);

/// Boolean sources widen through `u8`, so `true` lands as 1 in every type.
macro_rules! impl_cast_from_bool {
    ($($dst:ty),* $(,)?) => {$(
        impl CastFrom<bool> for $dst {
            #[inline(always)]
            fn cast_from(v: bool) -> Self {
                v as u8 as $dst
            }
        }
    )*};
}

impl CastFrom<bool> for u8 {
    #[inline(always)]
    fn cast_from(v: bool) -> Self {
        v as u8
    }
}

impl_cast_from_bool!(u16, u32, u64, i8, i16, i32, i64, f32);

/// Integer sources cast to boolean by comparison against zero.
macro_rules! impl_cast_to_bool {
    ($($src:ty),* $(,)?) => {$(
        impl CastFrom<$src> for bool {
            #[inline(always)]
            fn cast_from(v: $src) -> Self {
                v != 0
            }
        }
    )*};
}

impl_cast_to_bool!(u8, u16, u32, u64, i8, i16, i32, i64);

impl CastFrom<f32> for bool {
    #[inline(always)]
    fn cast_from(v: f32) -> Self {
        v != 0.0
    }
}

/// Reduced-precision floats convert to and from integers through `f32`.
macro_rules! impl_cast_half {
    ($half:ty => $($t:ty),* $(,)?) => {$(
        impl CastFrom<$t> for $half {
            #[inline(always)]
            fn cast_from(v: $t) -> Self {
                <$half>::from_f32(v as f32)
            }
        }
        impl CastFrom<$half> for $t {
            #[inline(always)]
            fn cast_from(v: $half) -> Self {
                v.to_f32() as $t
            }
        }
    )*};
}

impl_cast_half!(f16 => u8, u16, u32, u64, i8, i16, i32, i64);
impl_cast_half!(bf16 => u8, u16, u32, u64, i8, i16, i32, i64);

impl CastFrom<f32> for f16 {
    #[inline(always)]
    fn cast_from(v: f32) -> Self {
        f16::from_f32(v)
    }
}

impl CastFrom<f16> for f32 {
    #[inline(always)]
    fn cast_from(v: f16) -> Self {
        v.to_f32()
    }
}

impl CastFrom<f32> for bf16 {
    #[inline(always)]
    fn cast_from(v: f32) -> Self {
        bf16::from_f32(v)
    }
}

impl CastFrom<bf16> for f32 {
    #[inline(always)]
    fn cast_from(v: bf16) -> Self {
        v.to_f32()
    }
}

impl CastFrom<bf16> for f16 {
    #[inline(always)]
    fn cast_from(v: bf16) -> Self {
        f16::from_f32(v.to_f32())
    }
}

impl CastFrom<f16> for bf16 {
    #[inline(always)]
    fn cast_from(v: f16) -> Self {
        bf16::from_f32(v.to_f32())
    }
}

impl CastFrom<f16> for bool {
    #[inline(always)]
    fn cast_from(v: f16) -> Self {
        v.to_f32() != 0.0
    }
}

impl CastFrom<bf16> for bool {
    #[inline(always)]
    fn cast_from(v: bf16) -> Self {
        v.to_f32() != 0.0
    }
}

impl CastFrom<bool> for f16 {
    #[inline(always)]
    fn cast_from(v: bool) -> Self {
        f16::from_f32(v as u8 as f32)
    }
}

impl CastFrom<bool> for bf16 {
    #[inline(always)]
    fn cast_from(v: bool) -> Self {
        bf16::from_f32(v as u8 as f32)
    }
}

/// Real scalars become complex with a zero imaginary part; complex sources
/// cast by taking the real part.
macro_rules! impl_cast_complex {
    ($($t:ty),* $(,)?) => {$(
        impl CastFrom<$t> for Complex32 {
            #[inline(always)]
            fn cast_from(v: $t) -> Self {
                Complex32::new(v as f32, 0.0)
            }
        }
        impl CastFrom<Complex32> for $t {
            #[inline(always)]
            fn cast_from(v: Complex32) -> Self {
                v.re as $t
            }
        }
    )*};
}

impl_cast_complex!(u8, u16, u32, u64, i8, i16, i32, i64);

impl CastFrom<f32> for Complex32 {
    #[inline(always)]
    fn cast_from(v: f32) -> Self {
        Complex32::new(v, 0.0)
    }
}

impl CastFrom<Complex32> for f32 {
    #[inline(always)]
    fn cast_from(v: Complex32) -> Self {
        v.re
    }
}

impl CastFrom<bool> for Complex32 {
    #[inline(always)]
    fn cast_from(v: bool) -> Self {
        Complex32::new(v as u8 as f32, 0.0)
    }
}

impl CastFrom<Complex32> for bool {
    #[inline(always)]
    fn cast_from(v: Complex32) -> Self {
        v.re != 0.0
    }
}

impl CastFrom<f16> for Complex32 {
    #[inline(always)]
    fn cast_from(v: f16) -> Self {
        Complex32::new(v.to_f32(), 0.0)
    }
}

impl CastFrom<Complex32> for f16 {
    #[inline(always)]
    fn cast_from(v: Complex32) -> Self {
        f16::from_f32(v.re)
    }
}

impl CastFrom<bf16> for Complex32 {
    #[inline(always)]
    fn cast_from(v: bf16) -> Self {
        Complex32::new(v.to_f32(), 0.0)
    }
}

impl CastFrom<Complex32> for bf16 {
    #[inline(always)]
    fn cast_from(v: Complex32) -> Self {
        bf16::from_f32(v.re)
    }
}
