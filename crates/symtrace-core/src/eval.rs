//! Concrete evaluation of catalogue operators over scalar literals.
//!
//! Used by the partial-evaluation path of the expression layer: when both
//! operands of a commutative-monoid operator are literals, the operator is
//! folded at record time instead of growing the instruction DAG. Integer
//! arithmetic wraps in two's-complement at the width of the promoted type.

use crate::op::Op;
use crate::types::{ScalarLit, ScalarType};

/// Identity element of `op` over the given element type, if the operator has
/// one: 0 for addition, `true` for conjunction, `false` for disjunction.
///
/// Subtraction has a right identity only and is never flattened, so it is
/// deliberately excluded here.
pub fn identity(op: Op, ty: ScalarType) -> Option<ScalarLit> {
    match op {
        Op::Add => Some(ScalarLit::zero(ty)),
        Op::Land => Some(ScalarLit::Bool(true)),
        Op::Lor => Some(ScalarLit::Bool(false)),
        _ => None,
    }
}

/// Evaluates a unary operator.
///
/// Panics if `op` is not unary or the operand type does not fit; operand
/// types are checked by the typed expression surface before literals reach
/// this point.
pub fn eval_unary(op: Op, v: ScalarLit) -> ScalarLit {
    match op {
        Op::Not => ScalarLit::Bool(!v.as_bool()),
        other => panic!("{:?} is not a unary operator", other),
    }
}

/// Evaluates a binary operator over two literals.
///
/// Operands are first widened to their common promoted type; arithmetic then
/// wraps at that type's width. Predicates yield `Bool`.
pub fn eval_binary(op: Op, lhs: ScalarLit, rhs: ScalarLit) -> ScalarLit {
    let ty = lhs.scalar_type().promote(rhs.scalar_type());
    let a = lhs.cast(ty);
    let b = rhs.cast(ty);

    match op {
        Op::Add => wrap(ty, a.as_signed().wrapping_add(b.as_signed())),
        Op::Sub => wrap(ty, a.as_signed().wrapping_sub(b.as_signed())),
        Op::Land => ScalarLit::Bool(a.as_bool() && b.as_bool()),
        Op::Lor => ScalarLit::Bool(a.as_bool() || b.as_bool()),
        Op::Eql => ScalarLit::Bool(a.as_bits() == b.as_bits()),
        Op::Lss => {
            let less = if ty.is_signed() {
                a.as_signed() < b.as_signed()
            } else {
                a.as_bits() < b.as_bits()
            };
            ScalarLit::Bool(less)
        }
        Op::Not => panic!("Not is not a binary operator"),
    }
}

/// Truncates a wide intermediate result back into `ty`.
fn wrap(ty: ScalarType, wide: i128) -> ScalarLit {
    ScalarLit::Long(wide as i64).cast(ty)
}
