//! Element types and untyped scalar literals.
//!
//! The analysable type universe is small: finite-width integers (including
//! `bool` as a one-bit value) and fixed-size arrays of them. Every scalar
//! type exposes its bit width; integer semantics are two's-complement of that
//! width. [`ScalarLit`] is the untyped literal sum carried by instruction
//! nodes; the typed expression surface wraps it behind the [`Scalar`] trait.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element types supported by the instruction layer.
///
/// The names follow the conventional C types the analysed programs are
/// written against: `char` is 8-bit unsigned (character data), `int` 32-bit
/// signed, `long` 64-bit signed, `size` 64-bit unsigned (array indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Char,
    Int,
    Long,
    Size,
}

impl ScalarType {
    /// Width of the two's-complement representation in bits.
    pub const fn bit_width(self) -> u32 {
        match self {
            ScalarType::Bool => 1,
            ScalarType::Char => 8,
            ScalarType::Int => 32,
            ScalarType::Long => 64,
            ScalarType::Size => 64,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Long)
    }

    /// Conversion rank used for implicit widening: the wider operand wins,
    /// and on equal widths the unsigned type wins.
    const fn rank(self) -> u8 {
        match self {
            ScalarType::Bool => 0,
            ScalarType::Char => 1,
            ScalarType::Int => 2,
            ScalarType::Long => 3,
            ScalarType::Size => 4,
        }
    }

    /// Common type of a binary arithmetic operation over `self` and `other`.
    pub const fn promote(self, other: ScalarType) -> ScalarType {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::Char => "char",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Size => "size",
        };
        write!(f, "{}", name)
    }
}

/// Type descriptor of an event or instruction node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Scalar(ScalarType),
    /// Fixed-size array of `len` elements of a scalar type.
    Array { elem: ScalarType, len: u32 },
}

impl ElementType {
    pub const fn is_array(self) -> bool {
        matches!(self, ElementType::Array { .. })
    }

    /// Scalar type of the value this element produces when read: the type
    /// itself for scalars, the element type for arrays.
    pub const fn scalar(self) -> ScalarType {
        match self {
            ElementType::Scalar(ty) => ty,
            ElementType::Array { elem, .. } => elem,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Scalar(ty) => write!(f, "{}", ty),
            ElementType::Array { elem, len } => write!(f, "{}[{}]", elem, len),
        }
    }
}

/// An untyped scalar literal.
///
/// Carried by literal instruction nodes and by the partial-evaluation
/// aggregate of open n-ary nodes. Arithmetic on literals lives in
/// [`crate::eval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarLit {
    Bool(bool),
    Char(u8),
    Int(i32),
    Long(i64),
    Size(u64),
}

impl ScalarLit {
    pub const fn scalar_type(self) -> ScalarType {
        match self {
            ScalarLit::Bool(_) => ScalarType::Bool,
            ScalarLit::Char(_) => ScalarType::Char,
            ScalarLit::Int(_) => ScalarType::Int,
            ScalarLit::Long(_) => ScalarType::Long,
            ScalarLit::Size(_) => ScalarType::Size,
        }
    }

    /// Zero of the given type. Freshly declared variables initialise to this.
    pub const fn zero(ty: ScalarType) -> ScalarLit {
        match ty {
            ScalarType::Bool => ScalarLit::Bool(false),
            ScalarType::Char => ScalarLit::Char(0),
            ScalarType::Int => ScalarLit::Int(0),
            ScalarType::Long => ScalarLit::Long(0),
            ScalarType::Size => ScalarLit::Size(0),
        }
    }

    /// Signed interpretation of the two's-complement value.
    pub const fn as_signed(self) -> i128 {
        match self {
            ScalarLit::Bool(b) => b as i128,
            ScalarLit::Char(v) => v as i128,
            ScalarLit::Int(v) => v as i128,
            ScalarLit::Long(v) => v as i128,
            ScalarLit::Size(v) => v as i128,
        }
    }

    /// Raw bit pattern, zero-extended to 64 bits.
    pub const fn as_bits(self) -> u64 {
        match self {
            ScalarLit::Bool(b) => b as u64,
            ScalarLit::Char(v) => v as u64,
            ScalarLit::Int(v) => v as u32 as u64,
            ScalarLit::Long(v) => v as u64,
            ScalarLit::Size(v) => v,
        }
    }

    /// Two's-complement conversion into `ty`: truncate the bit pattern to the
    /// target width and reinterpret.
    pub const fn cast(self, ty: ScalarType) -> ScalarLit {
        let bits = self.as_bits();
        match ty {
            ScalarType::Bool => ScalarLit::Bool(bits & 1 != 0),
            ScalarType::Char => ScalarLit::Char(bits as u8),
            ScalarType::Int => ScalarLit::Int(bits as u32 as i32),
            ScalarType::Long => ScalarLit::Long(bits as i64),
            ScalarType::Size => ScalarLit::Size(bits),
        }
    }

    /// Boolean value of a `Bool` literal.
    ///
    /// Panics on non-boolean literals; callers are expected to have checked
    /// the type through the surface layer.
    pub fn as_bool(self) -> bool {
        match self {
            ScalarLit::Bool(b) => b,
            other => panic!("expected bool literal, got {}", other.scalar_type()),
        }
    }
}

impl fmt::Display for ScalarLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarLit::Bool(b) => write!(f, "{}", b),
            ScalarLit::Char(v) => write!(f, "{}", v),
            ScalarLit::Int(v) => write!(f, "{}", v),
            ScalarLit::Long(v) => write!(f, "{}", v),
            ScalarLit::Size(v) => write!(f, "{}", v),
        }
    }
}

/// Rust-side counterpart of a [`ScalarType`].
///
/// Implemented for exactly the five scalar representations; the typed
/// expression and variable surface is generic over this trait.
pub trait Scalar: Copy + 'static {
    const TYPE: ScalarType;

    fn lit(self) -> ScalarLit;
}

impl Scalar for bool {
    const TYPE: ScalarType = ScalarType::Bool;

    fn lit(self) -> ScalarLit {
        ScalarLit::Bool(self)
    }
}

impl Scalar for u8 {
    const TYPE: ScalarType = ScalarType::Char;

    fn lit(self) -> ScalarLit {
        ScalarLit::Char(self)
    }
}

impl Scalar for i32 {
    const TYPE: ScalarType = ScalarType::Int;

    fn lit(self) -> ScalarLit {
        ScalarLit::Int(self)
    }
}

impl Scalar for i64 {
    const TYPE: ScalarType = ScalarType::Long;

    fn lit(self) -> ScalarLit {
        ScalarLit::Long(self)
    }
}

impl Scalar for u64 {
    const TYPE: ScalarType = ScalarType::Size;

    fn lit(self) -> ScalarLit {
        ScalarLit::Size(self)
    }
}
