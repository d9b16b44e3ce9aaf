//! Ground, quantifier-free terms.
//!
//! Terms form an immutable DAG behind [`TermRef`] handles. Construction goes
//! through the smart constructors, which perform the light boolean
//! simplifications the encoders rely on (folding `true`/`false` out of
//! conjunctions and disjunctions built incrementally). `Display` renders the
//! SMT-LIB 2 s-expression; arithmetic and comparison spellings are selected
//! by the operand sort, so the same term shape serves both the bit-vector
//! and the integer data model.

use std::fmt;
use std::rc::Rc;

use crate::sort::Sort;

pub type TermRef = Rc<Term>;

/// A term node. See the module docs for construction and rendering rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    BoolLit(bool),
    IntLit(i128),
    BvLit { bits: u64, width: u32 },
    Const { name: String, sort: Sort },
    Not(TermRef),
    And(Vec<TermRef>),
    Or(Vec<TermRef>),
    Implies(TermRef, TermRef),
    Eq(TermRef, TermRef),
    /// Less-than; `signed` selects `bvslt` vs `bvult` under bit-vector sorts
    /// and is ignored for `Int`.
    Lt {
        lhs: TermRef,
        rhs: TermRef,
        signed: bool,
    },
    Add(Vec<TermRef>),
    Sub(TermRef, TermRef),
    Select(TermRef, TermRef),
    Store(TermRef, TermRef, TermRef),
    /// Constant array: every index maps to `elem`.
    ConstArray { index: Sort, elem: TermRef },
}

impl Term {
    pub fn bool_lit(value: bool) -> TermRef {
        Rc::new(Term::BoolLit(value))
    }

    pub fn int_lit(value: i128) -> TermRef {
        Rc::new(Term::IntLit(value))
    }

    pub fn bv_lit(bits: u64, width: u32) -> TermRef {
        let masked = if width >= 64 { bits } else { bits & ((1u64 << width) - 1) };
        Rc::new(Term::BvLit { bits: masked, width })
    }

    pub fn constant(name: impl Into<String>, sort: Sort) -> TermRef {
        Rc::new(Term::Const {
            name: name.into(),
            sort,
        })
    }

    pub fn not(operand: TermRef) -> TermRef {
        match &*operand {
            Term::BoolLit(b) => Term::bool_lit(!b),
            _ => Rc::new(Term::Not(operand)),
        }
    }

    /// Binary conjunction with unit/zero folding. The encoders accumulate
    /// conjunctions starting from `true`, so the fold keeps formulas free of
    /// trivial operands.
    pub fn and2(lhs: TermRef, rhs: TermRef) -> TermRef {
        match (&*lhs, &*rhs) {
            (Term::BoolLit(true), _) => rhs,
            (_, Term::BoolLit(true)) => lhs,
            (Term::BoolLit(false), _) | (_, Term::BoolLit(false)) => Term::bool_lit(false),
            _ => Rc::new(Term::And(vec![lhs, rhs])),
        }
    }

    /// Binary disjunction with unit/zero folding, dual to [`Term::and2`].
    pub fn or2(lhs: TermRef, rhs: TermRef) -> TermRef {
        match (&*lhs, &*rhs) {
            (Term::BoolLit(false), _) => rhs,
            (_, Term::BoolLit(false)) => lhs,
            (Term::BoolLit(true), _) | (_, Term::BoolLit(true)) => Term::bool_lit(true),
            _ => Rc::new(Term::Or(vec![lhs, rhs])),
        }
    }

    pub fn and(operands: Vec<TermRef>) -> TermRef {
        operands
            .into_iter()
            .fold(Term::bool_lit(true), Term::and2)
    }

    pub fn or(operands: Vec<TermRef>) -> TermRef {
        operands
            .into_iter()
            .fold(Term::bool_lit(false), Term::or2)
    }

    pub fn implies(antecedent: TermRef, consequent: TermRef) -> TermRef {
        match (&*antecedent, &*consequent) {
            (Term::BoolLit(true), _) => consequent,
            (Term::BoolLit(false), _) => Term::bool_lit(true),
            (_, Term::BoolLit(true)) => Term::bool_lit(true),
            _ => Rc::new(Term::Implies(antecedent, consequent)),
        }
    }

    pub fn eq(lhs: TermRef, rhs: TermRef) -> TermRef {
        Rc::new(Term::Eq(lhs, rhs))
    }

    pub fn lt(lhs: TermRef, rhs: TermRef, signed: bool) -> TermRef {
        Rc::new(Term::Lt { lhs, rhs, signed })
    }

    pub fn add(operands: Vec<TermRef>) -> TermRef {
        debug_assert!(operands.len() >= 2);
        Rc::new(Term::Add(operands))
    }

    pub fn sub(lhs: TermRef, rhs: TermRef) -> TermRef {
        Rc::new(Term::Sub(lhs, rhs))
    }

    pub fn select(array: TermRef, index: TermRef) -> TermRef {
        Rc::new(Term::Select(array, index))
    }

    pub fn store(array: TermRef, index: TermRef, value: TermRef) -> TermRef {
        Rc::new(Term::Store(array, index, value))
    }

    pub fn const_array(index: Sort, elem: TermRef) -> TermRef {
        Rc::new(Term::ConstArray { index, elem })
    }

    /// Sort of the term. Total: every well-formed term has one.
    pub fn sort(&self) -> Sort {
        match self {
            Term::BoolLit(_) => Sort::Bool,
            Term::IntLit(_) => Sort::Int,
            Term::BvLit { width, .. } => Sort::BitVec(*width),
            Term::Const { sort, .. } => sort.clone(),
            Term::Not(_)
            | Term::And(_)
            | Term::Or(_)
            | Term::Implies(_, _)
            | Term::Eq(_, _)
            | Term::Lt { .. } => Sort::Bool,
            Term::Add(operands) => operands[0].sort(),
            Term::Sub(lhs, _) => lhs.sort(),
            Term::Select(array, _) => array.sort().array_range().clone(),
            Term::Store(array, _, _) => array.sort(),
            Term::ConstArray { index, elem } => Sort::array(index.clone(), elem.sort()),
        }
    }

    /// Collects every named constant reachable through the term, in first-use
    /// order, invoking `visit` once per occurrence. The script layer uses
    /// this to emit declarations.
    pub fn visit_consts(&self, visit: &mut impl FnMut(&str, &Sort)) {
        match self {
            Term::BoolLit(_) | Term::IntLit(_) | Term::BvLit { .. } => {}
            Term::Const { name, sort } => visit(name, sort),
            Term::Not(operand) => operand.visit_consts(visit),
            Term::And(operands) | Term::Or(operands) | Term::Add(operands) => {
                for operand in operands {
                    operand.visit_consts(visit);
                }
            }
            Term::Implies(lhs, rhs)
            | Term::Eq(lhs, rhs)
            | Term::Lt { lhs, rhs, .. }
            | Term::Sub(lhs, rhs)
            | Term::Select(lhs, rhs) => {
                lhs.visit_consts(visit);
                rhs.visit_consts(visit);
            }
            Term::Store(array, index, value) => {
                array.visit_consts(visit);
                index.visit_consts(visit);
                value.visit_consts(visit);
            }
            Term::ConstArray { elem, .. } => elem.visit_consts(visit),
        }
    }

    fn write_nary(
        f: &mut fmt::Formatter<'_>,
        symbol: &str,
        operands: &[TermRef],
    ) -> fmt::Result {
        write!(f, "({}", symbol)?;
        for operand in operands {
            write!(f, " {}", operand)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::BoolLit(b) => write!(f, "{}", b),
            Term::IntLit(v) => {
                if *v < 0 {
                    write!(f, "(- {})", -v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Term::BvLit { bits, width } => write!(f, "(_ bv{} {})", bits, width),
            Term::Const { name, .. } => write!(f, "{}", name),
            Term::Not(operand) => write!(f, "(not {})", operand),
            Term::And(operands) => Term::write_nary(f, "and", operands),
            Term::Or(operands) => Term::write_nary(f, "or", operands),
            Term::Implies(lhs, rhs) => write!(f, "(=> {} {})", lhs, rhs),
            Term::Eq(lhs, rhs) => write!(f, "(= {} {})", lhs, rhs),
            Term::Lt { lhs, rhs, signed } => {
                let symbol = if lhs.sort().uses_bitvec() {
                    if *signed {
                        "bvslt"
                    } else {
                        "bvult"
                    }
                } else {
                    "<"
                };
                write!(f, "({} {} {})", symbol, lhs, rhs)
            }
            Term::Add(operands) => {
                let symbol = if operands[0].sort().uses_bitvec() {
                    "bvadd"
                } else {
                    "+"
                };
                Term::write_nary(f, symbol, operands)
            }
            Term::Sub(lhs, rhs) => {
                let symbol = if lhs.sort().uses_bitvec() { "bvsub" } else { "-" };
                write!(f, "({} {} {})", symbol, lhs, rhs)
            }
            Term::Select(array, index) => write!(f, "(select {} {})", array, index),
            Term::Store(array, index, value) => {
                write!(f, "(store {} {} {})", array, index, value)
            }
            Term::ConstArray { index, elem } => {
                write!(
                    f,
                    "((as const (Array {} {})) {})",
                    index,
                    elem.sort(),
                    elem
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and2_folds_units_and_zeros() {
        let x = Term::constant("x", Sort::Bool);
        assert!(Rc::ptr_eq(&Term::and2(Term::bool_lit(true), x.clone()), &x));
        assert!(Rc::ptr_eq(&Term::and2(x.clone(), Term::bool_lit(true)), &x));
        assert_eq!(
            *Term::and2(Term::bool_lit(false), x.clone()),
            Term::BoolLit(false)
        );
    }

    #[test]
    fn or2_folds_units_and_zeros() {
        let x = Term::constant("x", Sort::Bool);
        assert!(Rc::ptr_eq(&Term::or2(Term::bool_lit(false), x.clone()), &x));
        assert_eq!(
            *Term::or2(x.clone(), Term::bool_lit(true)),
            Term::BoolLit(true)
        );
    }

    #[test]
    fn implies_folds_literal_antecedents() {
        let x = Term::constant("x", Sort::Bool);
        assert!(Rc::ptr_eq(
            &Term::implies(Term::bool_lit(true), x.clone()),
            &x
        ));
        assert_eq!(
            *Term::implies(Term::bool_lit(false), x.clone()),
            Term::BoolLit(true)
        );
    }

    #[test]
    fn bv_literal_masks_to_width() {
        let lit = Term::bv_lit(0x1FF, 8);
        assert_eq!(*lit, Term::BvLit { bits: 0xFF, width: 8 });
    }

    #[test]
    fn rendering_selects_spelling_by_sort() {
        let a = Term::constant("a", Sort::BitVec(32));
        let b = Term::constant("b", Sort::BitVec(32));
        assert_eq!(
            Term::add(vec![a.clone(), b.clone()]).to_string(),
            "(bvadd a b)"
        );
        assert_eq!(Term::lt(a.clone(), b.clone(), true).to_string(), "(bvslt a b)");
        assert_eq!(Term::lt(a, b, false).to_string(), "(bvult a b)");

        let x = Term::constant("x", Sort::Int);
        let y = Term::constant("y", Sort::Int);
        assert_eq!(Term::add(vec![x.clone(), y.clone()]).to_string(), "(+ x y)");
        assert_eq!(Term::lt(x.clone(), y.clone(), true).to_string(), "(< x y)");
        assert_eq!(Term::sub(x, y).to_string(), "(- x y)");
    }

    #[test]
    fn rendering_negative_int_literal() {
        assert_eq!(Term::int_lit(-5).to_string(), "(- 5)");
        assert_eq!(Term::int_lit(5).to_string(), "5");
    }

    #[test]
    fn rendering_array_operations() {
        let arr = Term::constant("xs", Sort::array(Sort::BitVec(64), Sort::BitVec(8)));
        let idx = Term::bv_lit(2, 64);
        let val = Term::bv_lit(90, 8);
        assert_eq!(
            Term::select(arr.clone(), idx.clone()).to_string(),
            "(select xs (_ bv2 64))"
        );
        assert_eq!(
            Term::store(arr, idx, val).to_string(),
            "(store xs (_ bv2 64) (_ bv90 8))"
        );
        let init = Term::const_array(Sort::BitVec(64), Term::bv_lit(0, 8));
        assert_eq!(
            init.to_string(),
            "((as const (Array (_ BitVec 64) (_ BitVec 8))) (_ bv0 8))"
        );
    }

    #[test]
    fn select_sort_is_array_range() {
        let arr = Term::constant("xs", Sort::array(Sort::Int, Sort::Bool));
        let select = Term::select(arr, Term::int_lit(0));
        assert_eq!(select.sort(), Sort::Bool);
    }

    #[test]
    fn visit_consts_reaches_all_leaves() {
        let a = Term::constant("a", Sort::Int);
        let b = Term::constant("b", Sort::Int);
        let term = Term::implies(
            Term::lt(a.clone(), b.clone(), true),
            Term::eq(a, Term::int_lit(0)),
        );
        let mut seen = Vec::new();
        term.visit_consts(&mut |name, _| seen.push(name.to_string()));
        assert_eq!(seen, vec!["a", "b", "a"]);
    }
}
