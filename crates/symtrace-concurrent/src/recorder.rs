//! Per-thread recorder: builds the series-parallel block graph.
//!
//! The instrumented program calls the conditional primitives at each control
//! flow point: `begin_then` exactly once per branch, `begin_else` at most
//! once afterwards, and `end_branch` exactly once at the immediate
//! post-dominator. Loops are unwound through a bounded [`LoopPolicy`]:
//!
//! ```text
//! while (c) { body }
//! ```
//!
//! turns into
//!
//! ```text
//! while recorder.unwind_loop(c, POLICY) { body }
//! ```
//!
//! which opens one nested conditional per unwinding and closes all of them
//! when the bound is exhausted.

use std::collections::HashMap;

use crate::block::{BlockGraph, BlockId};
use crate::event::EventRef;
use crate::instr::{InstrRef, ReadInstr};
use symtrace_core::op::Op;

/// Bounded loop unwinding policy.
///
/// Two policies with the same identifier must declare identical unwinding
/// bounds; the recorder checks this contract by assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    id: u32,
    bound: u32,
}

impl LoopPolicy {
    pub const fn new(id: u32, bound: u32) -> LoopPolicy {
        assert!(bound > 0, "loop unwinding bound must be positive");
        LoopPolicy { id, bound }
    }

    pub const fn id(self) -> u32 {
        self.id
    }

    pub const fn unwinding_bound(self) -> u32 {
        self.bound
    }
}

/// One structurally nested loop being unwound. An inner loop is fully
/// unwound before the loop containing it.
#[derive(Debug)]
struct Loop {
    policy: LoopPolicy,
    counter: u32,
}

/// Outcome of one `unwind_loop` step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoopStep {
    /// Unwind once more; the caller enters the loop body.
    Unwind,
    /// Bound exhausted; the given number of conditional frames was opened
    /// and must now be closed.
    Close(u32),
}

/// Records events and control structure of one symbolic thread.
#[derive(Debug)]
pub struct Recorder {
    graph: BlockGraph,
    current: BlockId,
    /// Cached conjunction of the guards along the current outer chain.
    /// Invalidated by every block transition.
    condition_cache: Option<Option<InstrRef>>,
    loop_stack: Vec<Loop>,
    policy_bounds: HashMap<u32, u32>,
}

impl Recorder {
    pub fn new() -> Recorder {
        let mut graph = BlockGraph::new();
        let root = graph.root();
        let current = graph.add_inner(root, None);
        Recorder {
            graph,
            current,
            condition_cache: None,
            loop_stack: Vec::new(),
            policy_bounds: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    /// Root of the series-parallel graph. The root has an empty body, at
    /// least one inner block, and never an else block.
    pub fn most_outer_block(&self) -> BlockId {
        let root = self.graph.root();
        debug_assert!(self.graph.body(root).is_empty());
        debug_assert!(!self.graph.inner_blocks(root).is_empty());
        debug_assert!(self.graph.else_block(root).is_none());
        root
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Body of the current block; the thread registry snapshots this for the
    /// initialisation events of the main thread.
    pub(crate) fn current_block_body(&self) -> Vec<EventRef> {
        self.graph.body(self.current).to_vec()
    }

    fn set_current(&mut self, block: BlockId) {
        self.current = block;
        self.condition_cache = None;
    }

    /// Conjunction of all guards from the current block up through (but not
    /// including) the root, outermost first. Rebuilt lazily; any block
    /// transition invalidates the cache.
    pub fn block_condition(&mut self) -> Option<InstrRef> {
        if let Some(cached) = &self.condition_cache {
            return cached.clone();
        }

        let mut guards = Vec::new();
        let mut block = Some(self.current);
        while let Some(id) = block {
            if id == self.graph.root() {
                break;
            }
            if let Some(guard) = self.graph.guard(id) {
                guards.push(guard);
            }
            block = self.graph.outer(id);
        }
        guards.reverse();

        let condition = match guards.len() {
            0 => None,
            1 => Some(guards.pop().unwrap()),
            _ => Some(ReadInstr::nary(Op::Land, guards)),
        };
        self.condition_cache = Some(condition.clone());
        condition
    }

    /// Inserts into the current body all read events reachable through the
    /// given instruction.
    pub(crate) fn insert_reads(&mut self, instr: &InstrRef) {
        let mut events = Vec::new();
        instr.filter(&mut events);
        for event in events {
            self.graph.push_event(self.current, event);
        }
    }

    /// Appends an event to the current block body.
    pub(crate) fn record_event(&mut self, event: EventRef) {
        self.graph.push_event(self.current, event);
    }

    /// Opens the conditional block of a then branch.
    ///
    /// The reads feeding the condition are inserted first so they are
    /// ordered before the branch. A freshly opened empty unconditional block
    /// is reused in place; otherwise a sibling or nested block is created
    /// depending on whether the current block is already conditional.
    pub(crate) fn begin_then(&mut self, condition: InstrRef) {
        self.insert_reads(&condition);

        if self.graph.guard(self.current).is_some() {
            // Nested branch inside the current conditional block.
            let then_block = self.graph.add_inner(self.current, Some(condition));
            self.set_current(then_block);
        } else {
            // Unconditional blocks cannot have inner blocks.
            assert!(self.graph.inner_blocks(self.current).is_empty());

            if self.graph.body(self.current).is_empty() {
                // Reuse the current unconditional, empty block.
                self.graph.set_guard(self.current, condition);
                self.condition_cache = None;
            } else {
                // Sibling branch after an unconditional block.
                let outer = self
                    .graph
                    .outer(self.current)
                    .expect("current block has no outer block");
                let then_block = self.graph.add_inner(outer, Some(condition));
                self.set_current(then_block);
            }
        }
    }

    /// Closes the then branch and opens the else branch, whose guard is the
    /// negation of the then guard. Must be called at most once after a
    /// matching `begin_then`. Returns the negated guard.
    pub(crate) fn begin_else(&mut self) -> InstrRef {
        if self.graph.guard(self.current).is_none() {
            // Unconditional blocks cannot have inner blocks.
            assert!(self.graph.inner_blocks(self.current).is_empty());

            let trailing = self.current;
            let outer = self
                .graph
                .outer(trailing)
                .expect("begin_else without matching begin_then");
            self.set_current(outer);
            if self.graph.body(trailing).is_empty() {
                // Discard the empty trailing inner block of the then branch.
                self.graph.pop_last_inner(outer);
            }
        }

        // The current block is now the conditional then block.
        assert!(
            self.graph.outer(self.current).is_some(),
            "begin_else without matching begin_then"
        );
        let guard = self
            .graph
            .guard(self.current)
            .expect("begin_else without matching begin_then");
        let negated = ReadInstr::unary(Op::Not, guard);
        let else_block = self.graph.add_else(self.current, negated.clone());
        self.set_current(else_block);
        negated
    }

    /// Closes the conditional and opens a fresh unconditional block for the
    /// code after the branch. Its call site must be the immediate
    /// post-dominator of the branch it annotates.
    pub(crate) fn end_branch(&mut self) {
        let mut outer = self
            .graph
            .outer(self.current)
            .expect("unbalanced end_branch");

        if self.graph.guard(self.current).is_none() {
            // Unconditional blocks cannot have inner blocks.
            assert!(self.graph.inner_blocks(self.current).is_empty());

            if self.graph.body(self.current).is_empty() {
                // Discard the empty trailing inner block.
                self.graph.pop_last_inner(outer);
            }
            outer = self.graph.outer(outer).expect("unbalanced end_branch");
        }

        let next = self.graph.add_inner(outer, None);
        self.set_current(next);
    }

    /// Advances the unwinding state for the loop identified by `policy`.
    ///
    /// While the counter is positive the caller must enter a then branch for
    /// the loop condition; once exhausted the caller closes the opened
    /// frames and the loop is popped.
    pub(crate) fn prepare_unwind(&mut self, policy: LoopPolicy) -> LoopStep {
        if let Some(bound) = self.policy_bounds.insert(policy.id(), policy.unwinding_bound()) {
            assert_eq!(
                bound,
                policy.unwinding_bound(),
                "loop policy {} redeclared with a different bound",
                policy.id()
            );
        }

        if self.loop_stack.last().map(|l| l.policy.id()) != Some(policy.id()) {
            self.loop_stack.push(Loop {
                policy,
                counter: policy.unwinding_bound(),
            });
        }

        let current = self.loop_stack.last_mut().unwrap();
        assert_eq!(current.policy.unwinding_bound(), policy.unwinding_bound());

        if current.counter > 0 {
            current.counter -= 1;
            LoopStep::Unwind
        } else {
            let bound = current.policy.unwinding_bound();
            self.loop_stack.pop();
            LoopStep::Close(bound)
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Recorder::new()
    }
}
