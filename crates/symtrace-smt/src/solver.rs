//! The solver collaborator interface.
//!
//! The library never links a solver. The embedder supplies any
//! implementation of [`Solver`] (typically bindings to a solver accepting
//! quantifier-free bit-vectors or integers with arrays); the bundled
//! [`ScriptSolver`] records the assertions into a [`Script`] and leaves the
//! verdict to an external process fed the rendered SMT-LIB text.

use serde::{Deserialize, Serialize};

use crate::script::Script;
use crate::term::TermRef;

/// Outcome of a satisfiability check.
///
/// `Sat` on the error obligation is the expected success mode of bug
/// finding, not a failure. `Unknown` covers solver timeouts and
/// incompleteness; the library does not retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckResult {
    Sat,
    Unsat,
    Unknown,
}

/// A backend accepting ground, quantifier-free assertions.
pub trait Solver {
    fn assert_term(&mut self, term: TermRef);

    fn check(&mut self) -> CheckResult;

    /// Drops all assertions. Called at the start of each slicer pass.
    fn reset(&mut self);
}

/// Solver stand-in that accumulates assertions into a [`Script`].
///
/// `check` always reports [`CheckResult::Unknown`]; the embedder renders the
/// script and dispatches it to a real solver out of process.
#[derive(Debug, Default)]
pub struct ScriptSolver {
    script: Script,
}

impl ScriptSolver {
    pub fn new() -> Self {
        ScriptSolver::default()
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn into_script(self) -> Script {
        self.script
    }
}

impl Solver for ScriptSolver {
    fn assert_term(&mut self, term: TermRef) {
        self.script.assert_term(term);
    }

    fn check(&mut self) -> CheckResult {
        CheckResult::Unknown
    }

    fn reset(&mut self) {
        self.script.clear();
    }
}
