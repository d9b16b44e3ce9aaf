//! Typed expression surface with on-the-fly partial evaluation.
//!
//! An [`Expr<T>`] is what the instrumented program computes with: variables
//! lift into expressions, operators combine them, and assignment
//! materialises the underlying instruction DAG. For commutative-monoid
//! operators the expression stays *open*: literal operands are folded into an
//! aggregate by concrete evaluation instead of growing the DAG, so
//! `x + 2 + 3` is held as the operand list `[x]` with aggregate `5` and
//! materialises as the single n-ary node `x + 5`. The aggregate is undefined
//! until at least one literal has been folded in.
//!
//! Rust operators cover the catalogue where the language allows: `+`, `-`,
//! `!`, and `&`/`|` for the logical connectives; equality and less-than are
//! the [`Expr::eq`] and [`Expr::lt`] methods because their `std` traits
//! cannot return a symbolic result.

use std::marker::PhantomData;
use std::ops::{Add, BitAnd, BitOr, Not, Sub};

use smallvec::SmallVec;
use symtrace_core::eval::{eval_binary, identity};
use symtrace_core::op::Op;
use symtrace_core::types::{ElementType, Scalar, ScalarLit};

use crate::instr::{push_flattened, InstrRef, ReadInstr};
use crate::threads;
use crate::zone::Zone;

#[derive(Debug, Clone)]
enum ExprState {
    /// Materialised instruction.
    Done(InstrRef),
    /// Open n-ary node of a commutative-monoid operator: spliced operands
    /// plus the literal aggregate folded so far.
    Open {
        op: Op,
        operands: SmallVec<[InstrRef; 4]>,
        aggregate: Option<ScalarLit>,
    },
}

/// A symbolic value of element type `T`.
#[derive(Debug, Clone)]
pub struct Expr<T: Scalar> {
    state: ExprState,
    _marker: PhantomData<T>,
}

/// A fresh, unconstrained symbolic value of type `T`.
///
/// The backing read event lives on the bottom zone: it is thread-local and
/// not tied to any shared memory location, so the solver may pick any value
/// admitted by the surrounding constraints.
pub fn any<T: Scalar>() -> Expr<T> {
    Expr::from_instr(ReadInstr::basic(threads::make_read_event(
        Zone::bottom(),
        ElementType::Scalar(T::TYPE),
    )))
}

impl<T: Scalar> Expr<T> {
    /// Lifts a concrete value, guarded by the current path condition.
    pub fn lit(value: T) -> Expr<T> {
        Expr::from_instr(ReadInstr::literal(value.lit(), threads::try_path_condition()))
    }

    pub fn from_instr(instr: InstrRef) -> Expr<T> {
        Expr {
            state: ExprState::Done(instr),
            _marker: PhantomData,
        }
    }

    /// Materialises the expression as an instruction. A pending aggregate
    /// that differs from the operator's identity becomes one literal
    /// operand; a single remaining operand short-circuits the n-ary node.
    pub fn into_instr(self) -> InstrRef {
        match self.state {
            ExprState::Done(instr) => instr,
            ExprState::Open {
                op,
                mut operands,
                aggregate,
            } => {
                if let Some(value) = aggregate {
                    if identity(op, value.scalar_type()) != Some(value) {
                        let guard = match operands.first() {
                            Some(first) => first.guard(),
                            None => threads::try_path_condition(),
                        };
                        operands.push(ReadInstr::literal(value, guard));
                    }
                }
                match operands.len() {
                    0 => {
                        // Every operand folded away: the whole expression
                        // was the operator's identity.
                        let value = aggregate.unwrap();
                        ReadInstr::literal(value, threads::try_path_condition())
                    }
                    1 => operands.into_iter().next().unwrap(),
                    _ => ReadInstr::nary(op, operands.into_vec()),
                }
            }
        }
    }

    /// Aggregate literal of an open node.
    ///
    /// Reading the aggregate before any literal has been folded in is a
    /// usage fault.
    pub fn aggregate(&self) -> ScalarLit {
        match &self.state {
            ExprState::Open {
                aggregate: Some(value),
                ..
            } => *value,
            _ => panic!("expression has no aggregate literal"),
        }
    }

    /// Converts into the open representation for `op`, materialising first
    /// when the expression is open under a different operator.
    fn open(self, op: Op) -> (SmallVec<[InstrRef; 4]>, Option<ScalarLit>) {
        match self.state {
            ExprState::Open {
                op: own,
                operands,
                aggregate,
            } if own == op => (operands, aggregate),
            state => {
                let instr = Expr::<T> {
                    state,
                    _marker: PhantomData,
                }
                .into_instr();
                if let ReadInstr::Literal { value, .. } = &*instr {
                    // A literal seed goes straight into the aggregate.
                    (SmallVec::new(), Some(*value))
                } else {
                    let mut operands = SmallVec::new();
                    push_flattened(op, &mut operands, instr);
                    (operands, None)
                }
            }
        }
    }

    fn merge_expr(self, op: Op, rhs: Expr<T>) -> Expr<T> {
        debug_assert!(op.is_commutative_monoid());
        let (mut operands, mut aggregate) = self.open(op);
        match rhs.state {
            ExprState::Open {
                op: rhs_op,
                operands: rhs_operands,
                aggregate: rhs_aggregate,
            } if rhs_op == op => {
                for operand in rhs_operands {
                    push_flattened(op, &mut operands, operand);
                }
                if let Some(value) = rhs_aggregate {
                    aggregate = Some(fold(op, aggregate, value));
                }
            }
            state => {
                let instr = Expr::<T> {
                    state,
                    _marker: PhantomData,
                }
                .into_instr();
                if let ReadInstr::Literal { value, .. } = &*instr {
                    aggregate = Some(fold(op, aggregate, *value));
                } else {
                    push_flattened(op, &mut operands, instr);
                }
            }
        }
        Expr {
            state: ExprState::Open {
                op,
                operands,
                aggregate,
            },
            _marker: PhantomData,
        }
    }

    fn merge_literal(self, op: Op, value: ScalarLit) -> Expr<T> {
        debug_assert!(op.is_commutative_monoid());
        let (operands, aggregate) = self.open(op);
        Expr {
            state: ExprState::Open {
                op,
                operands,
                aggregate: Some(fold(op, aggregate, value)),
            },
            _marker: PhantomData,
        }
    }

    /// Equality test, recorded as a symbolic boolean.
    pub fn eq(self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        Expr::from_instr(ReadInstr::binary(
            Op::Eql,
            self.into_instr(),
            rhs.into_expr().into_instr(),
        ))
    }

    /// Disequality, recorded as the negated equality.
    pub fn ne(self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        !self.eq(rhs)
    }

    /// Less-than test, recorded as a symbolic boolean.
    pub fn lt(self, rhs: impl IntoExpr<T>) -> Expr<bool> {
        Expr::from_instr(ReadInstr::binary(
            Op::Lss,
            self.into_instr(),
            rhs.into_expr().into_instr(),
        ))
    }
}

fn fold(op: Op, aggregate: Option<ScalarLit>, value: ScalarLit) -> ScalarLit {
    match aggregate {
        None => value,
        Some(current) => eval_binary(op, current, value),
    }
}

/// Anything that lifts into a symbolic value of type `T`: a concrete value,
/// an expression, or (through the variable layer) a variable reference.
pub trait IntoExpr<T: Scalar> {
    fn into_expr(self) -> Expr<T>;
}

impl<T: Scalar> IntoExpr<T> for Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self
    }
}

impl<T: Scalar> IntoExpr<T> for T {
    fn into_expr(self) -> Expr<T> {
        Expr::lit(self)
    }
}

impl<T: Scalar> Add for Expr<T> {
    type Output = Expr<T>;

    fn add(self, rhs: Expr<T>) -> Expr<T> {
        self.merge_expr(Op::Add, rhs)
    }
}

impl<T: Scalar> Add<T> for Expr<T> {
    type Output = Expr<T>;

    fn add(self, rhs: T) -> Expr<T> {
        self.merge_literal(Op::Add, rhs.lit())
    }
}

impl<T: Scalar> Sub for Expr<T> {
    type Output = Expr<T>;

    fn sub(self, rhs: Expr<T>) -> Expr<T> {
        Expr::from_instr(ReadInstr::binary(
            Op::Sub,
            self.into_instr(),
            rhs.into_instr(),
        ))
    }
}

impl<T: Scalar> Sub<T> for Expr<T> {
    type Output = Expr<T>;

    fn sub(self, rhs: T) -> Expr<T> {
        self - Expr::lit(rhs)
    }
}

impl BitAnd for Expr<bool> {
    type Output = Expr<bool>;

    fn bitand(self, rhs: Expr<bool>) -> Expr<bool> {
        self.merge_expr(Op::Land, rhs)
    }
}

impl BitAnd<bool> for Expr<bool> {
    type Output = Expr<bool>;

    fn bitand(self, rhs: bool) -> Expr<bool> {
        self.merge_literal(Op::Land, ScalarLit::Bool(rhs))
    }
}

impl BitOr for Expr<bool> {
    type Output = Expr<bool>;

    fn bitor(self, rhs: Expr<bool>) -> Expr<bool> {
        self.merge_expr(Op::Lor, rhs)
    }
}

impl BitOr<bool> for Expr<bool> {
    type Output = Expr<bool>;

    fn bitor(self, rhs: bool) -> Expr<bool> {
        self.merge_literal(Op::Lor, ScalarLit::Bool(rhs))
    }
}

impl Not for Expr<bool> {
    type Output = Expr<bool>;

    fn not(self) -> Expr<bool> {
        Expr::from_instr(ReadInstr::unary(Op::Not, self.into_instr()))
    }
}

macro_rules! impl_scalar_lhs {
    ($($ty:ty),*) => {$(
        impl Add<Expr<$ty>> for $ty {
            type Output = Expr<$ty>;

            fn add(self, rhs: Expr<$ty>) -> Expr<$ty> {
                rhs + self
            }
        }

        impl Sub<Expr<$ty>> for $ty {
            type Output = Expr<$ty>;

            fn sub(self, rhs: Expr<$ty>) -> Expr<$ty> {
                Expr::lit(self) - rhs
            }
        }
    )*};
}

impl_scalar_lhs!(u8, i32, i64, u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::Threads;

    fn session() {
        Threads::reset();
        Threads::begin_main_thread();
    }

    #[test]
    fn literals_fold_into_the_aggregate() {
        session();
        let x = any::<i32>();
        let sum = x + 2 + 3;
        assert_eq!(sum.aggregate(), ScalarLit::Int(5));

        let instr = sum.into_instr();
        match &*instr {
            ReadInstr::Nary { op, operands } => {
                assert_eq!(*op, Op::Add);
                assert_eq!(operands.len(), 2);
                assert!(matches!(&*operands[0], ReadInstr::Basic { .. }));
                match &*operands[1] {
                    ReadInstr::Literal { value, .. } => assert_eq!(*value, ScalarLit::Int(5)),
                    other => panic!("expected aggregate literal, got {:?}", other),
                }
            }
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    fn aggregate_folding_is_order_independent() {
        session();
        let x = any::<i32>();
        let left = (x.clone() + 2) + 3;
        let right = 3 + (x + 2);
        assert_eq!(left.aggregate(), right.aggregate());
    }

    #[test]
    fn identity_aggregate_is_not_materialised() {
        session();
        let x = any::<i32>();
        let instr = (x + 2 - 2 as i32).into_instr();
        // `x + 2` materialises, then subtraction builds a binary node; the
        // subtraction is not a monoid so nothing folds across it.
        assert!(matches!(&*instr, ReadInstr::Binary { op: Op::Sub, .. }));

        let y = any::<i32>();
        let unchanged = (y + 0).into_instr();
        assert!(matches!(&*unchanged, ReadInstr::Basic { .. }));
    }

    #[test]
    fn pure_literal_expression_materialises_as_literal() {
        session();
        let sum = (Expr::lit(2) + 3).into_instr();
        match &*sum {
            ReadInstr::Literal { value, .. } => assert_eq!(*value, ScalarLit::Int(5)),
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn symbolic_operands_splice_into_one_nary_node() {
        session();
        let (x, y, z) = (any::<i32>(), any::<i32>(), any::<i32>());
        let instr = ((x + y) + z).into_instr();
        match &*instr {
            ReadInstr::Nary { op, operands } => {
                assert_eq!(*op, Op::Add);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "no aggregate literal")]
    fn aggregate_is_undefined_before_folding() {
        session();
        let sum = any::<i32>() + any::<i32>();
        sum.aggregate();
    }

    #[test]
    fn subtraction_builds_a_binary_node() {
        session();
        let x = any::<u64>();
        let instr = (x - 1u64).into_instr();
        match &*instr {
            ReadInstr::Binary { op, .. } => assert_eq!(*op, Op::Sub),
            other => panic!("expected binary node, got {:?}", other),
        }
    }

    #[test]
    fn comparisons_produce_boolean_expressions() {
        session();
        let x = any::<i32>();
        let instr = x.lt(10).into_instr();
        assert_eq!(
            instr.element_type(),
            ElementType::Scalar(symtrace_core::types::ScalarType::Bool)
        );
        assert!(matches!(&*instr, ReadInstr::Binary { op: Op::Lss, .. }));
    }

    #[test]
    fn boolean_connectives_flatten() {
        session();
        let (a, b, c) = (any::<bool>(), any::<bool>(), any::<bool>());
        let instr = ((a & b) & c).into_instr();
        match &*instr {
            ReadInstr::Nary { op, operands } => {
                assert_eq!(*op, Op::Land);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected n-ary node, got {:?}", other),
        }

        let (d, e) = (any::<bool>(), any::<bool>());
        let disj = (d | e | true).into_instr();
        // true is absorbing for disjunction only through the solver; here it
        // stays a folded aggregate operand.
        match &*disj {
            ReadInstr::Nary { op, operands } => {
                assert_eq!(*op, Op::Lor);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    fn negation_wraps_in_unary_not() {
        session();
        let instr = (!any::<bool>()).into_instr();
        assert!(matches!(&*instr, ReadInstr::Unary { op: Op::Not, .. }));
    }
}
