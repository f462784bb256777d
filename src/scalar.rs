//! Element-type descriptors.
//!
//! [`ScalarType`] describes the storage format of a single buffer
//! element: a bit width plus signedness or float-ness. Buffers and
//! bound images treat it as an opaque comparable value; the pipeline
//! compiler is what gives it computational meaning.

use core::fmt;

/// Arithmetic interpretation of an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Unsigned integer.
    UInt,
    /// Two's-complement signed integer.
    Int,
    /// IEEE-754 binary float.
    Float,
}

/// Element storage format: kind plus bit width.
///
/// Bit widths are whole bytes (8, 16, 32, or 64) so that
/// [`byte_width`](Self::byte_width) is exact and buffer storage stays
/// byte-addressable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScalarType {
    kind: ScalarKind,
    bits: u16,
}

impl ScalarType {
    /// 8-bit unsigned integer.
    pub const U8: Self = Self::uint(8);
    /// 16-bit unsigned integer.
    pub const U16: Self = Self::uint(16);
    /// 32-bit unsigned integer.
    pub const U32: Self = Self::uint(32);
    /// 64-bit unsigned integer.
    pub const U64: Self = Self::uint(64);
    /// 8-bit signed integer.
    pub const I8: Self = Self::int(8);
    /// 16-bit signed integer.
    pub const I16: Self = Self::int(16);
    /// 32-bit signed integer.
    pub const I32: Self = Self::int(32);
    /// 64-bit signed integer.
    pub const I64: Self = Self::int(64);
    /// 32-bit float.
    pub const F32: Self = Self::float(32);
    /// 64-bit float.
    pub const F64: Self = Self::float(64);

    /// Unsigned integer type of the given bit width.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in `const` position) unless
    /// `bits` is a nonzero multiple of 8.
    pub const fn uint(bits: u16) -> Self {
        Self::new(ScalarKind::UInt, bits)
    }

    /// Signed integer type of the given bit width.
    ///
    /// # Panics
    ///
    /// Panics unless `bits` is a nonzero multiple of 8.
    pub const fn int(bits: u16) -> Self {
        Self::new(ScalarKind::Int, bits)
    }

    /// Float type of the given bit width.
    ///
    /// # Panics
    ///
    /// Panics unless `bits` is a nonzero multiple of 8.
    pub const fn float(bits: u16) -> Self {
        Self::new(ScalarKind::Float, bits)
    }

    const fn new(kind: ScalarKind, bits: u16) -> Self {
        assert!(bits > 0 && bits % 8 == 0, "bit width must be a nonzero multiple of 8");
        Self { kind, bits }
    }

    /// Arithmetic interpretation.
    #[inline]
    pub const fn kind(self) -> ScalarKind {
        self.kind
    }

    /// Width in bits.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.bits
    }

    /// Bytes per element.
    #[inline]
    pub const fn byte_width(self) -> usize {
        self.bits as usize / 8
    }

    /// Whether this is a float type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self.kind, ScalarKind::Float)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ScalarKind::UInt => 'u',
            ScalarKind::Int => 'i',
            ScalarKind::Float => 'f',
        };
        write!(f, "{prefix}{}", self.bits)
    }
}
