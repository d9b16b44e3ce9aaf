//! Operator catalogue for the instruction layer.
//!
//! The operator set is closed: symbolic execution supports exactly the
//! operators listed in [`Op`]. Each operator carries a compile-time attribute
//! bitmap describing its algebraic properties. The instruction layer consults
//! these attributes to decide when flattening into n-ary nodes applies: an
//! operator that is associative, commutative, and has an identity element is
//! a *commutative monoid* and its operand trees collapse into flat operand
//! lists.
//!
//! Identity *elements* are not defined here; they depend on the element type
//! and are supplied by [`crate::eval::identity`].

use serde::{Deserialize, Serialize};

/// Attribute bitmap describing an operator's mathematical properties.
pub type OpAttr = u8;

/// Operator is left associative, i.e. `x ~ y ~ z = (x ~ y) ~ z`.
pub const LASSOC_ATTR: OpAttr = 1 << 0;

/// Operator is right associative, i.e. `x ~ y ~ z = x ~ (y ~ z)`.
pub const RASSOC_ATTR: OpAttr = 1 << 1;

/// Operator is commutative, i.e. `x ~ y = y ~ x`.
pub const COMM_ATTR: OpAttr = 1 << 2;

/// Operator has a unique identity element `e`, i.e. `x ~ e = e ~ x = x`.
pub const HAS_ID_ATTR: OpAttr = 1 << 3;

/// Operator is always unary, e.g. [`Op::Not`].
pub const UNARY_ATTR: OpAttr = 1 << 4;

/// Built-in operators for which symbolic execution is supported.
///
/// The set is deliberately small: logical negation, addition, subtraction,
/// logical conjunction and disjunction, equality, and less-than. Everything
/// else a program needs is expressed in terms of these (e.g. `a > b` records
/// as `b < a`, `a != b` as `!(a == b)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// Logical negation `!`. Unary only.
    Not,
    /// Two's-complement addition `+`. Commutative monoid.
    Add,
    /// Two's-complement subtraction `-`. Left associative, identity on the
    /// right only; never flattened.
    Sub,
    /// Logical conjunction `&&`. Commutative monoid.
    Land,
    /// Logical disjunction `||`. Commutative monoid.
    Lor,
    /// Equality `==`. Commutative but has no identity element.
    Eql,
    /// Less-than `<`. Neither commutative nor associative.
    Lss,
}

impl Op {
    const fn attr(self) -> OpAttr {
        match self {
            Op::Not => UNARY_ATTR,
            Op::Add => LASSOC_ATTR | RASSOC_ATTR | COMM_ATTR | HAS_ID_ATTR,
            Op::Sub => LASSOC_ATTR | HAS_ID_ATTR,
            Op::Land => LASSOC_ATTR | RASSOC_ATTR | COMM_ATTR | HAS_ID_ATTR,
            Op::Lor => LASSOC_ATTR | RASSOC_ATTR | COMM_ATTR | HAS_ID_ATTR,
            Op::Eql => LASSOC_ATTR | RASSOC_ATTR | COMM_ATTR,
            Op::Lss => 0,
        }
    }

    pub const fn is_commutative(self) -> bool {
        self.attr() & COMM_ATTR != 0
    }

    /// An operator counts as associative only when it associates both ways.
    pub const fn is_associative(self) -> bool {
        self.attr() & (LASSOC_ATTR | RASSOC_ATTR) == LASSOC_ATTR | RASSOC_ATTR
    }

    pub const fn has_identity(self) -> bool {
        self.attr() & HAS_ID_ATTR != 0
    }

    pub const fn is_unary(self) -> bool {
        self.attr() & UNARY_ATTR != 0
    }

    /// Associative, commutative, and has an identity element. Operand trees
    /// of such operators flatten into n-ary operand lists.
    pub const fn is_commutative_monoid(self) -> bool {
        self.is_commutative() && self.is_associative() && self.has_identity()
    }

    /// Returns `true` if the operator produces a boolean result regardless of
    /// its operand types.
    pub const fn is_predicate(self) -> bool {
        matches!(self, Op::Not | Op::Land | Op::Lor | Op::Eql | Op::Lss)
    }
}
