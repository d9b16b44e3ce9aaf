//! Symbolic execution of concurrent imperative programs.
//!
//! Instrumented code records, at run time, a first-order representation of
//! every instruction executed along one control path together with the
//! memory events it performed: per-thread series-parallel block graphs of
//! read, write, and synchronisation events over a lattice of memory-sharing
//! zones. The recording is compiled into a ground SMT formula (bit-vectors
//! or integers, with arrays) whose models are exactly the admissible
//! interleavings under sequential consistency, using clock-based
//! sequenced-before ordering plus the read-from, write-serialisation, and
//! from-read candidate-execution axioms. A satisfiable error obligation is
//! a concrete schedule witness for an assertion violation.
//!
//! ```
//! use symtrace_concurrent::{Encoders, SharedVar, Thread, Threads};
//!
//! Threads::reset();
//! Threads::begin_main_thread();
//!
//! let mut x = SharedVar::new(0);
//! let t = Thread::spawn(|| {
//!     // records into the spawned thread
//! });
//! t.join();
//! x.set(x.get() + 1);
//!
//! let mut encoders = Encoders::new();
//! Threads::error(x.get().eq(1), &mut encoders).unwrap();
//! let has_obligation = Threads::end_main_thread(&mut encoders).unwrap();
//! assert!(has_obligation);
//! // encoders.script().render() is SMT-LIB 2 text for any external solver.
//! ```

pub mod block;
pub mod encoder;
pub mod event;
pub mod expr;
pub mod instr;
pub mod mutex;
pub mod recorder;
pub mod relation;
pub mod slice;
pub mod slicer;
pub mod threads;
pub mod var;
pub mod zone;

// Re-export the embedder-facing surface
pub use symtrace_core::id::{EventId, Location, ThreadId};
pub use symtrace_smt::{CheckResult, DataModel};

pub use encoder::Encoders;
pub use expr::{any, Expr, IntoExpr};
pub use mutex::Mutex;
pub use recorder::{LoopPolicy, Recorder};
pub use slice::Slice;
pub use slicer::{Slicer, MAX_SLICE_FREQ};
pub use threads::{Thread, Threads};
pub use var::{LocalArray, LocalVar, SharedArray, SharedVar};
pub use zone::Zone;
