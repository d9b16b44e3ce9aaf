//! Branch-selection driver enumerating branch valuations.
//!
//! The slicer renders a concurrent program as a set of series-parallel
//! graphs, one slice at a time. The instrumented program calls the branch
//! primitives at each static branch site, identified by an embedder-supplied
//! [`Location`]:
//!
//! ```text
//! if (c) { a } else { b }
//! ```
//!
//! turns into
//!
//! ```text
//! if slicer.begin_then_branch(loc, c) { a }
//! if slicer.begin_else_branch(loc) { b }
//! slicer.end_branch(loc);
//! ```
//!
//! A slice frequency of zero disables enumeration entirely: every branch is
//! taken (both sides are recorded, guarded) and `next_slice` is false after
//! the single pass. Any positive frequency enumerates all `2^k` valuations
//! of the `k` branch sites visited, by treating the decision table as a
//! big-endian counter over the locations.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use symtrace_core::id::Location;

use crate::expr::Expr;
use crate::threads::Threads;

/// Upper bound on the slice frequency parameter.
pub const MAX_SLICE_FREQ: u32 = 1 << 10;

#[derive(Debug, Default)]
struct Branch {
    execute: bool,
    flip: bool,
}

/// Enumerates branch valuations and steers the per-thread recorders.
#[derive(Debug)]
pub struct Slicer {
    slice_freq: u32,
    branches: BTreeMap<Location, Branch>,
    slice_count: u32,
    execute_stack: Vec<bool>,
}

impl Slicer {
    /// A frequency of zero leaves the series-parallel graphs unsliced.
    pub fn new(slice_freq: u32) -> Slicer {
        assert!(slice_freq <= MAX_SLICE_FREQ);
        Slicer {
            slice_freq,
            branches: BTreeMap::new(),
            slice_count: 1,
            execute_stack: Vec::new(),
        }
    }

    /// Number of slices recorded so far, counting the first pass.
    pub fn slice_count(&self) -> u32 {
        self.slice_count
    }

    /// Call once before entering the `loop { ... next_slice() }` loop, after
    /// all shared variables have been initialised in the main thread.
    pub fn begin_slice_loop(&self) {
        Threads::begin_slice_loop();
    }

    /// Begins a conditional block at branch site `loc`.
    ///
    /// Must be called exactly once prior to `end_branch` for this site. The
    /// then block is executed if and only if the return value is true.
    pub fn begin_then_branch(&mut self, loc: Location, condition: Expr<bool>) -> bool {
        Threads::begin_then(condition.into_instr());

        if self.slice_freq == 0 {
            return true;
        }

        let execute = match self.branches.entry(loc) {
            Entry::Vacant(entry) => {
                entry.insert(Branch::default());
                false
            }
            Entry::Occupied(entry) => entry.get().execute,
        };

        self.execute_stack.push(execute);
        execute
    }

    /// Begins the optional else block of the branch opened at `loc`.
    ///
    /// Demarcates the end of the then block; may be called at most once
    /// after the matching `begin_then_branch`. The else block is executed if
    /// and only if the return value is true.
    pub fn begin_else_branch(&mut self, _loc: Location) -> bool {
        Threads::begin_else();

        if self.slice_freq == 0 {
            return true;
        }

        !*self
            .execute_stack
            .last()
            .expect("begin_else_branch without begin_then_branch")
    }

    /// Ends the branch opened at `loc`. Its call site must be the immediate
    /// post-dominator of the branch.
    pub fn end_branch(&mut self, _loc: Location) {
        Threads::end_branch();

        if self.slice_freq > 0 {
            self.execute_stack
                .pop()
                .expect("unbalanced end_branch");
        }
    }

    /// Looks for another branch valuation to analyse, restarting the
    /// recording pass when one exists.
    ///
    /// The decision table acts as a big-endian counter: the deepest
    /// not-yet-flipped decision is toggled and every decision below it is
    /// cleared, so all `2^k` valuations are visited exactly once.
    pub fn next_slice(&mut self) -> bool {
        if self.branches.is_empty() {
            return false;
        }

        let mut flipped = None;
        for (loc, branch) in self.branches.iter_mut().rev() {
            if branch.flip {
                // Flipping a branch higher up revisits both directions of
                // every branch below it.
                branch.flip = false;
            } else {
                branch.flip = true;
                branch.execute = !branch.execute;
                flipped = Some(*loc);
                break;
            }
        }

        match flipped {
            Some(loc) => {
                self.slice_count += 1;
                tracing::debug!(slice = self.slice_count, flipped = %loc, "next slice");
                Threads::restart_pass();
                true
            }
            None => false,
        }
    }
}
