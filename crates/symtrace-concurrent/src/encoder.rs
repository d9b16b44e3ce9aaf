//! Translation of recorded threads into a ground SMT formula.
//!
//! Three encoders cooperate, all driven from [`encode_session`]:
//!
//! - the *read* encoder turns instruction DAGs into data terms;
//! - the *value* encoder emits each write event's defining equation
//!   (`constant == instruction`, with `store` for indirect writes and
//!   constant arrays for array initialisation);
//! - the *order* encoder walks each thread's block graph to produce the
//!   sequenced-before clock chain, then adds the candidate-execution axioms
//!   over the zone relation: read-from (RF), write-serialisation (WS), and
//!   from-read (FR).
//!
//! Every event contributes a data constant `e<id>` and, when it can race, a
//! clock constant `c<id> > 0`. Conditional branches join through fresh
//! `join<n>` clocks greater than both branch clocks.

use std::collections::HashSet;

use indexmap::IndexMap;
use symtrace_core::id::{EventId, ThreadId};
use symtrace_core::op::Op;
use symtrace_smt::sort::Sort;
use symtrace_smt::term::{Term, TermRef};
use symtrace_smt::{CheckResult, DataModel, EncodeError, Script, ScriptSolver, Solver};

use crate::block::{BlockGraph, BlockId};
use crate::event::{Event, EventKind};
use crate::instr::ReadInstr;
use crate::recorder::Recorder;
use crate::relation::ZoneRelation;

/// Encoder state shared by one analysis pass: the data model, the solver
/// collaborator, and the counters for generated symbols.
#[derive(Debug)]
pub struct Encoders<S: Solver = ScriptSolver> {
    model: DataModel,
    solver: S,
    join_count: u32,
    clocks_defined: HashSet<EventId>,
}

impl Encoders<ScriptSolver> {
    /// Script-recording encoders over bit-vector data sorts.
    pub fn new() -> Encoders<ScriptSolver> {
        Encoders::with_solver(ScriptSolver::new(), DataModel::BitVec)
    }

    /// Script-recording encoders over the given data model.
    pub fn with_data_model(model: DataModel) -> Encoders<ScriptSolver> {
        Encoders::with_solver(ScriptSolver::new(), model)
    }

    /// The accumulated assertion script.
    pub fn script(&self) -> &Script {
        self.solver.script()
    }
}

impl Default for Encoders<ScriptSolver> {
    fn default() -> Self {
        Encoders::new()
    }
}

impl<S: Solver> Encoders<S> {
    pub fn with_solver(solver: S, model: DataModel) -> Encoders<S> {
        Encoders {
            model,
            solver,
            join_count: 0,
            clocks_defined: HashSet::new(),
        }
    }

    pub fn data_model(&self) -> DataModel {
        self.model
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    /// Drops all assertions and generated-symbol state. Call at the start
    /// of each slicer pass.
    pub fn reset(&mut self) {
        self.solver.reset();
        self.join_count = 0;
        self.clocks_defined.clear();
    }

    pub fn assert_term(&mut self, term: TermRef) {
        self.solver.assert_term(term);
    }

    pub fn check(&mut self) -> CheckResult {
        self.solver.check()
    }

    /// The event's data constant, named from its unique id.
    pub fn constant(&self, event: &Event) -> TermRef {
        Term::constant(
            format!("e{}", event.id()),
            self.model.element_sort(event.element_type()),
        )
    }

    /// The event's clock constant, constrained positive on first use.
    pub fn clock(&mut self, event: &Event) -> TermRef {
        let clock = Term::constant(format!("c{}", event.id()), Sort::Int);
        if self.clocks_defined.insert(event.id()) {
            self.assert_term(Term::lt(Term::int_lit(0), clock.clone(), true));
        }
        clock
    }

    /// Selector predicate for "`read` reads from `write`".
    pub fn rf_selector(&self, write: &Event, read: &Event) -> TermRef {
        debug_assert!(write.is_write() && read.is_read());
        Term::constant(format!("rf{}_{}", write.id(), read.id()), Sort::Bool)
    }

    /// A fresh join clock greater than zero and both branch clocks.
    pub fn join_clocks(&mut self, clock_x: TermRef, clock_y: TermRef) -> TermRef {
        let join = Term::constant(format!("join{}", self.join_count), Sort::Int);
        self.join_count += 1;
        self.assert_term(Term::lt(Term::int_lit(0), join.clone(), true));
        self.assert_term(Term::lt(clock_x, join.clone(), true));
        self.assert_term(Term::lt(clock_y, join.clone(), true));
        join
    }

    /// Shared initial clock that every thread's chain starts from.
    pub fn epoch(&self) -> TermRef {
        Term::constant("epoch", Sort::Int)
    }
}

/// Encodes a read instruction as a data term.
pub(crate) fn encode_instr<S: Solver>(
    instr: &ReadInstr,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    match instr {
        ReadInstr::Literal { value, .. } => Ok(encoders.model.literal(*value)),
        // In term position a literal array denotes its element; the value
        // encoder wraps it into a constant array where one is needed.
        ReadInstr::LiteralArray { elem, .. } => Ok(encoders.model.literal(*elem)),
        ReadInstr::Basic { event } => Ok(encoders.constant(event)),
        ReadInstr::Unary { op: Op::Not, operand } => {
            Ok(Term::not(encode_instr(operand, encoders)?))
        }
        ReadInstr::Unary { op, .. } => Err(EncodeError::UnsupportedOperator {
            op: *op,
            position: "unary",
        }),
        ReadInstr::Binary { op, lhs, rhs } => {
            let signed = lhs.element_type().scalar().is_signed();
            let lhs_term = encode_instr(lhs, encoders)?;
            let rhs_term = encode_instr(rhs, encoders)?;
            binary_term(*op, signed, lhs_term, rhs_term)
        }
        ReadInstr::Nary { op, operands } => {
            let mut terms = Vec::with_capacity(operands.len());
            for operand in operands {
                terms.push(encode_instr(operand, encoders)?);
            }
            match op {
                Op::Add => Ok(Term::add(terms)),
                Op::Land => Ok(Term::and(terms)),
                Op::Lor => Ok(Term::or(terms)),
                other => Err(EncodeError::MissingIdentity {
                    op: *other,
                    ty: instr.element_type().scalar(),
                }),
            }
        }
        ReadInstr::Deref { array, index } => {
            if !array.element_type().is_array() {
                return Err(EncodeError::ArrayTypeExpected {
                    ty: array.element_type(),
                });
            }
            Ok(Term::select(
                encode_instr(array, encoders)?,
                encode_instr(index, encoders)?,
            ))
        }
    }
}

fn binary_term(
    op: Op,
    signed: bool,
    lhs: TermRef,
    rhs: TermRef,
) -> Result<TermRef, EncodeError> {
    match op {
        Op::Add => Ok(Term::add(vec![lhs, rhs])),
        Op::Sub => Ok(Term::sub(lhs, rhs)),
        Op::Land => Ok(Term::and2(lhs, rhs)),
        Op::Lor => Ok(Term::or2(lhs, rhs)),
        Op::Eql => Ok(Term::eq(lhs, rhs)),
        Op::Lss => Ok(Term::lt(lhs, rhs, signed)),
        Op::Not => Err(EncodeError::UnsupportedOperator {
            op,
            position: "binary",
        }),
    }
}

/// Encodes an event's defining equation.
///
/// Reads have none (their value comes from RF), sync events are trivially
/// defined, direct writes equate their constant with the value instruction
/// (lifted to a constant array for array types), and indirect writes equate
/// it with a `store` on the dereferenced array.
pub(crate) fn encode_eq<S: Solver>(
    event: &Event,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    match event.kind() {
        EventKind::Read => Ok(Term::bool_lit(false)),
        EventKind::Send | EventKind::Receive => Ok(Term::bool_lit(true)),
        EventKind::DirectWrite(instr) => {
            let lhs = encoders.constant(event);
            let rhs = encode_instr(instr, encoders)?;
            let rhs = if event.element_type().is_array() {
                Term::const_array(encoders.model.index_sort(), rhs)
            } else {
                rhs
            };
            Ok(Term::eq(lhs, rhs))
        }
        EventKind::IndirectWrite { deref, value } => {
            let ReadInstr::Deref { array, index } = &**deref else {
                unreachable!("indirect writes hold dereference instructions");
            };
            let lhs = encoders.constant(event);
            let rhs = Term::store(
                encode_instr(array, encoders)?,
                encode_instr(index, encoders)?,
                encode_instr(value, encoders)?,
            );
            Ok(Term::eq(lhs, rhs))
        }
    }
}

/// Guard term of an event; unconditional events are guarded by `true`.
fn event_condition<S: Solver>(
    event: &Event,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    match event.guard() {
        Some(guard) => encode_instr(guard, encoders),
        None => Ok(Term::bool_lit(true)),
    }
}

/// Sequenced-before encoding of one block subtree.
///
/// Walks the body in recording order: write events contribute their defining
/// equations, and every non-bottom-zone event extends the clock chain and
/// enters the zone relation. Conditionals recurse into the then branch and,
/// when present, the else branch, joining through a fresh clock that the
/// following events start from.
fn encode_spo_block<S: Solver>(
    graph: &BlockGraph,
    block: BlockId,
    earlier_clock: TermRef,
    relation: &mut ZoneRelation,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    let mut clock = earlier_clock;

    for event in graph.body(block).to_vec() {
        if event.is_write() {
            let equality = encode_eq(&event, encoders)?;
            encoders.assert_term(equality);
        }

        // Thread-local events keep their equations but no clocks.
        if event.zone().is_bottom() {
            continue;
        }

        relation.relate(&event);
        let next_clock = encoders.clock(&event);
        encoders.assert_term(Term::lt(clock, next_clock.clone(), true));
        clock = next_clock;
    }

    for inner in graph.inner_blocks(block) {
        let then_clock = encode_spo_block(graph, inner, clock.clone(), relation, encoders)?;
        clock = match graph.else_block(inner) {
            Some(else_block) => {
                let else_clock =
                    encode_spo_block(graph, else_block, clock.clone(), relation, encoders)?;
                encoders.join_clocks(then_clock, else_clock)
            }
            None => then_clock,
        };
    }

    Ok(clock)
}

/// Read-from: every guarded read must read from some interfering write, and
/// a selected write happens before the read, shares its value, and both
/// guards hold.
fn encode_rf<S: Solver>(
    relation: &ZoneRelation,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    let mut rf_axiom = Term::bool_lit(true);

    for read in relation.events().to_vec() {
        if read.is_write() {
            continue;
        }
        let read_condition = event_condition(&read, encoders)?;

        let mut schedules = Term::bool_lit(false);
        for write in relation.events().to_vec() {
            if write.is_read() {
                continue;
            }
            if read.zone().meet(write.zone()).is_bottom() {
                continue;
            }

            let order = Term::lt(encoders.clock(&write), encoders.clock(&read), true);
            let schedule = encoders.rf_selector(&write, &read);
            let equality = Term::eq(encoders.constant(&write), encoders.constant(&read));
            let write_condition = event_condition(&write, encoders)?;

            schedules = Term::or2(schedules, schedule.clone());
            rf_axiom = Term::and2(
                rf_axiom,
                Term::implies(
                    schedule,
                    Term::and(vec![order, write_condition, read_condition.clone(), equality]),
                ),
            );
        }

        rf_axiom = Term::and2(rf_axiom, Term::implies(read_condition, schedules));
    }

    Ok(rf_axiom)
}

/// Write-serialisation: two guarded writes on a common zone atom are clock
/// ordered one way or the other. Emitted once per unordered pair.
fn encode_ws<S: Solver>(
    relation: &ZoneRelation,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    let mut ws_axiom = Term::bool_lit(true);

    for atom in relation.atoms().collect::<Vec<_>>() {
        let writes = relation.writes(atom);
        for x in &writes {
            for y in &writes {
                if x.id() >= y.id() {
                    continue;
                }

                let xy_order = Term::lt(encoders.clock(x), encoders.clock(y), true);
                let yx_order = Term::lt(encoders.clock(y), encoders.clock(x), true);
                let x_condition = event_condition(x, encoders)?;
                let y_condition = event_condition(y, encoders)?;

                ws_axiom = Term::and2(
                    ws_axiom,
                    Term::implies(
                        Term::and2(x_condition, y_condition),
                        Term::or2(xy_order, yx_order),
                    ),
                );
            }
        }
    }

    Ok(ws_axiom)
}

/// From-read: a read taking its value from write `x` happens before any
/// guarded write `y` serialised after `x` on the same zone atom.
fn encode_fr<S: Solver>(
    relation: &ZoneRelation,
    encoders: &mut Encoders<S>,
) -> Result<TermRef, EncodeError> {
    let mut fr_axiom = Term::bool_lit(true);

    for atom in relation.atoms().collect::<Vec<_>>() {
        let (reads, writes) = relation.partition(atom);
        for x in &writes {
            for y in &writes {
                if x.id() == y.id() {
                    continue;
                }

                for read in &reads {
                    let x_schedule = encoders.rf_selector(x, read);
                    let xy_order = Term::lt(encoders.clock(x), encoders.clock(y), true);
                    let ry_order = Term::lt(encoders.clock(read), encoders.clock(y), true);
                    let y_condition = event_condition(y, encoders)?;

                    fr_axiom = Term::and2(
                        fr_axiom,
                        Term::implies(
                            Term::and(vec![x_schedule, xy_order, y_condition]),
                            ry_order,
                        ),
                    );
                }
            }
        }
    }

    Ok(fr_axiom)
}

/// Encodes all recorded threads plus the error obligation.
///
/// Returns `true` when at least one error condition was recorded; with no
/// errors there is nothing to check and no obligation is asserted.
pub(crate) fn encode_session<S: Solver>(
    recorders: &IndexMap<ThreadId, Recorder>,
    errors: &[TermRef],
    encoders: &mut Encoders<S>,
) -> Result<bool, EncodeError> {
    let mut relation = ZoneRelation::new();

    let epoch = encoders.epoch();
    for recorder in recorders.values() {
        encode_spo_block(
            recorder.graph(),
            recorder.most_outer_block(),
            epoch.clone(),
            &mut relation,
            encoders,
        )?;
    }

    let rf_axiom = encode_rf(&relation, encoders)?;
    encoders.assert_term(rf_axiom);
    let fr_axiom = encode_fr(&relation, encoders)?;
    encoders.assert_term(fr_axiom);
    let ws_axiom = encode_ws(&relation, encoders)?;
    encoders.assert_term(ws_axiom);

    let has_errors = !errors.is_empty();
    if has_errors {
        encoders.assert_term(Term::or(errors.to_vec()));
    }

    tracing::debug!(
        threads = recorders.len(),
        related_events = relation.len(),
        errors = errors.len(),
        "session encoded"
    );
    Ok(has_errors)
}
