//! The read-instruction DAG.
//!
//! A [`ReadInstr`] describes how a value was obtained: a literal, a read
//! event, an operator over sub-instructions, or an array element load. Nodes
//! are immutable and shared through [`InstrRef`] handles; the graph is
//! acyclic by construction. Identity of nodes (not structural equality) is
//! what matters for the guard invariant: the two children of a binary node
//! must share the *same* guard node, not merely equal content.
//!
//! Commutative-monoid operators (`Add`, `Land`, `Lor`) never form binary
//! trees. Their operand lists are flattened greedily at construction:
//! operands that are themselves n-ary nodes of the same operator are spliced
//! in, literal operands equal to the operator's identity are dropped, and a
//! single surviving operand short-circuits the node entirely.

use std::rc::Rc;

use smallvec::SmallVec;
use symtrace_core::eval::identity;
use symtrace_core::op::Op;
use symtrace_core::types::{ElementType, ScalarLit, ScalarType};

use crate::event::EventRef;

pub type InstrRef = Rc<ReadInstr>;

/// A node of the read-instruction DAG.
#[derive(Debug)]
pub enum ReadInstr {
    /// A concrete scalar value.
    Literal {
        value: ScalarLit,
        guard: Option<InstrRef>,
    },
    /// An array with every element equal to `elem`; used to initialise
    /// freshly declared arrays.
    LiteralArray {
        elem: ScalarLit,
        len: u32,
        guard: Option<InstrRef>,
    },
    /// An owning handle to a read event.
    Basic { event: EventRef },
    Unary { op: Op, operand: InstrRef },
    Binary {
        op: Op,
        lhs: InstrRef,
        rhs: InstrRef,
    },
    /// Flattened operand list of a commutative-monoid operator. Never holds
    /// fewer than two operands.
    Nary {
        op: Op,
        operands: SmallVec<[InstrRef; 4]>,
    },
    /// One array element load: an array sub-instruction plus an index.
    Deref { array: InstrRef, index: InstrRef },
}

/// `true` when both guards are the same shared node (or both absent).
fn same_guard(a: &Option<InstrRef>, b: &Option<InstrRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

impl ReadInstr {
    pub fn literal(value: ScalarLit, guard: Option<InstrRef>) -> InstrRef {
        Rc::new(ReadInstr::Literal { value, guard })
    }

    pub fn literal_array(elem: ScalarLit, len: u32, guard: Option<InstrRef>) -> InstrRef {
        assert!(len > 0, "array length must be positive");
        Rc::new(ReadInstr::LiteralArray { elem, len, guard })
    }

    pub fn basic(event: EventRef) -> InstrRef {
        assert!(event.is_read(), "basic instruction requires a read event");
        Rc::new(ReadInstr::Basic { event })
    }

    pub fn unary(op: Op, operand: InstrRef) -> InstrRef {
        assert!(op.is_unary(), "{:?} is not a unary operator", op);
        Rc::new(ReadInstr::Unary { op, operand })
    }

    /// Builds a binary node.
    ///
    /// The guards of the two children must be the same shared node; mixing
    /// operands lifted under different path conditions is a usage fault.
    pub fn binary(op: Op, lhs: InstrRef, rhs: InstrRef) -> InstrRef {
        assert!(!op.is_unary(), "{:?} is not a binary operator", op);
        assert!(
            same_guard(&lhs.guard(), &rhs.guard()),
            "binary operands must share one guard node"
        );
        Rc::new(ReadInstr::Binary { op, lhs, rhs })
    }

    /// Builds a flattened n-ary node for a commutative-monoid operator.
    ///
    /// Returns the single surviving operand when splicing and identity
    /// dropping leave just one, and the first operand when every operand was
    /// an identity literal.
    pub fn nary(op: Op, operands: Vec<InstrRef>) -> InstrRef {
        assert!(
            op.is_commutative_monoid(),
            "{:?} is not a commutative monoid",
            op
        );
        assert!(!operands.is_empty(), "n-ary node requires operands");

        let fallback = operands[0].clone();
        let mut flattened: SmallVec<[InstrRef; 4]> = SmallVec::new();
        for operand in operands {
            push_flattened(op, &mut flattened, operand);
        }

        match flattened.len() {
            0 => fallback,
            1 => flattened.into_iter().next().unwrap(),
            _ => Rc::new(ReadInstr::Nary {
                op,
                operands: flattened,
            }),
        }
    }

    pub fn deref(array: InstrRef, index: InstrRef) -> InstrRef {
        assert!(
            array.element_type().is_array(),
            "dereference requires an array operand"
        );
        Rc::new(ReadInstr::Deref { array, index })
    }

    /// Guard of the instruction, inherited per node kind: literals carry
    /// their own, basics delegate to their event, operators to their first
    /// (left-most) child.
    pub fn guard(&self) -> Option<InstrRef> {
        match self {
            ReadInstr::Literal { guard, .. } | ReadInstr::LiteralArray { guard, .. } => {
                guard.clone()
            }
            ReadInstr::Basic { event } => event.guard().cloned(),
            ReadInstr::Unary { operand, .. } => operand.guard(),
            ReadInstr::Binary { lhs, .. } => lhs.guard(),
            ReadInstr::Nary { operands, .. } => operands[0].guard(),
            ReadInstr::Deref { array, .. } => array.guard(),
        }
    }

    /// Collects every read event reachable through the instruction in
    /// left-to-right postorder, each exactly once.
    pub fn filter(&self, events: &mut Vec<EventRef>) {
        match self {
            ReadInstr::Literal { .. } | ReadInstr::LiteralArray { .. } => {}
            ReadInstr::Basic { event } => {
                if !events.iter().any(|seen| seen.id() == event.id()) {
                    events.push(event.clone());
                }
            }
            ReadInstr::Unary { operand, .. } => operand.filter(events),
            ReadInstr::Binary { lhs, rhs, .. } => {
                lhs.filter(events);
                rhs.filter(events);
            }
            ReadInstr::Nary { operands, .. } => {
                for operand in operands {
                    operand.filter(events);
                }
            }
            ReadInstr::Deref { array, index } => {
                array.filter(events);
                index.filter(events);
            }
        }
    }

    /// Element type of the value this instruction produces.
    pub fn element_type(&self) -> ElementType {
        match self {
            ReadInstr::Literal { value, .. } => ElementType::Scalar(value.scalar_type()),
            ReadInstr::LiteralArray { elem, len, .. } => ElementType::Array {
                elem: elem.scalar_type(),
                len: *len,
            },
            ReadInstr::Basic { event } => event.element_type(),
            ReadInstr::Unary { op, operand } => {
                if op.is_predicate() {
                    ElementType::Scalar(ScalarType::Bool)
                } else {
                    operand.element_type()
                }
            }
            ReadInstr::Binary { op, lhs, rhs } => {
                if op.is_predicate() {
                    ElementType::Scalar(ScalarType::Bool)
                } else {
                    ElementType::Scalar(
                        lhs.element_type()
                            .scalar()
                            .promote(rhs.element_type().scalar()),
                    )
                }
            }
            ReadInstr::Nary { op, operands } => {
                if op.is_predicate() {
                    ElementType::Scalar(ScalarType::Bool)
                } else {
                    ElementType::Scalar(
                        operands
                            .iter()
                            .map(|operand| operand.element_type().scalar())
                            .reduce(ScalarType::promote)
                            .unwrap(),
                    )
                }
            }
            ReadInstr::Deref { array, .. } => {
                ElementType::Scalar(array.element_type().scalar())
            }
        }
    }
}

/// Appends `operand` to a flattened operand list: n-ary nodes of the same
/// operator are spliced, identity literals dropped.
pub(crate) fn push_flattened(op: Op, into: &mut SmallVec<[InstrRef; 4]>, operand: InstrRef) {
    match &*operand {
        // Splice nested nodes of the same operator.
        ReadInstr::Nary {
            op: inner_op,
            operands,
        } if *inner_op == op => {
            for inner in operands {
                into.push(inner.clone());
            }
        }
        // Drop identity literals.
        ReadInstr::Literal { value, .. }
            if identity(op, value.scalar_type()) == Some(*value) => {}
        _ => into.push(operand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtrace_core::id::{EventId, ThreadId};
    use symtrace_core::types::ScalarType;

    use crate::event::Event;
    use crate::zone::Zone;

    fn read_event(id: u32) -> EventRef {
        Event::read(
            EventId(id),
            ThreadId(1),
            Zone::from_atoms([id]),
            ElementType::Scalar(ScalarType::Int),
            None,
        )
    }

    fn basic(id: u32) -> InstrRef {
        ReadInstr::basic(read_event(id))
    }

    fn int_lit(value: i32) -> InstrRef {
        ReadInstr::literal(ScalarLit::Int(value), None)
    }

    #[test]
    fn nary_splices_same_operator_children() {
        let inner = ReadInstr::nary(Op::Add, vec![basic(0), basic(1)]);
        let outer = ReadInstr::nary(Op::Add, vec![inner, basic(2)]);
        match &*outer {
            ReadInstr::Nary { op, operands } => {
                assert_eq!(*op, Op::Add);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    fn nary_drops_identity_literals() {
        let node = ReadInstr::nary(Op::Add, vec![basic(0), int_lit(0), basic(1)]);
        match &*node {
            ReadInstr::Nary { operands, .. } => assert_eq!(operands.len(), 2),
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    fn nary_degenerates_to_single_operand() {
        let operand = basic(0);
        let node = ReadInstr::nary(Op::Add, vec![operand.clone(), int_lit(0)]);
        assert!(Rc::ptr_eq(&node, &operand));
    }

    #[test]
    fn nary_of_only_identities_keeps_a_literal() {
        let node = ReadInstr::nary(Op::Add, vec![int_lit(0), int_lit(0)]);
        match &*node {
            ReadInstr::Literal { value, .. } => assert_eq!(*value, ScalarLit::Int(0)),
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn nary_keeps_non_identity_literals() {
        let node = ReadInstr::nary(Op::Add, vec![basic(0), int_lit(5)]);
        match &*node {
            ReadInstr::Nary { operands, .. } => assert_eq!(operands.len(), 2),
            other => panic!("expected n-ary node, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "commutative monoid")]
    fn nary_rejects_non_monoid_operators() {
        ReadInstr::nary(Op::Sub, vec![basic(0), basic(1)]);
    }

    #[test]
    fn binary_accepts_shared_guard_node() {
        let guard = ReadInstr::literal(ScalarLit::Bool(true), None);
        let lhs = ReadInstr::literal(ScalarLit::Int(1), Some(guard.clone()));
        let rhs = ReadInstr::literal(ScalarLit::Int(2), Some(guard));
        let node = ReadInstr::binary(Op::Lss, lhs, rhs);
        assert_eq!(
            node.element_type(),
            ElementType::Scalar(ScalarType::Bool)
        );
    }

    #[test]
    #[should_panic(expected = "share one guard node")]
    fn binary_rejects_structurally_equal_but_distinct_guards() {
        let lhs = ReadInstr::literal(
            ScalarLit::Int(1),
            Some(ReadInstr::literal(ScalarLit::Bool(true), None)),
        );
        let rhs = ReadInstr::literal(
            ScalarLit::Int(2),
            Some(ReadInstr::literal(ScalarLit::Bool(true), None)),
        );
        ReadInstr::binary(Op::Lss, lhs, rhs);
    }

    #[test]
    fn filter_lists_events_left_to_right() {
        let node = ReadInstr::binary(
            Op::Lss,
            ReadInstr::nary(Op::Add, vec![basic(2), basic(0)]),
            basic(1),
        );
        let mut events = Vec::new();
        node.filter(&mut events);
        let ids: Vec<u32> = events.iter().map(|event| event.id().0).collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn filter_deduplicates_shared_events() {
        let event = read_event(0);
        let node = ReadInstr::binary(
            Op::Eql,
            ReadInstr::basic(event.clone()),
            ReadInstr::basic(event),
        );
        let mut events = Vec::new();
        node.filter(&mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn deref_produces_element_type() {
        let array = ReadInstr::basic(Event::read(
            EventId(9),
            ThreadId(1),
            Zone::from_atoms([3]),
            ElementType::Array {
                elem: ScalarType::Char,
                len: 3,
            },
            None,
        ));
        let node = ReadInstr::deref(array, ReadInstr::literal(ScalarLit::Size(2), None));
        assert_eq!(
            node.element_type(),
            ElementType::Scalar(ScalarType::Char)
        );
    }

    #[test]
    #[should_panic(expected = "array operand")]
    fn deref_rejects_scalar_operand() {
        ReadInstr::deref(basic(0), ReadInstr::literal(ScalarLit::Size(0), None));
    }

    #[test]
    fn binary_promotes_operand_types() {
        let guard: Option<InstrRef> = None;
        let lhs = ReadInstr::literal(ScalarLit::Char(1), guard.clone());
        let rhs = ReadInstr::literal(ScalarLit::Int(2), guard);
        let node = ReadInstr::binary(Op::Add, lhs, rhs);
        assert_eq!(node.element_type(), ElementType::Scalar(ScalarType::Int));
    }
}
