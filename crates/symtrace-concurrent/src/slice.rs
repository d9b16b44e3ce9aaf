//! Per-thread slices: linearisations of the block graph.
//!
//! A slice lists one thread's events in recording order, obtained by walking
//! the block graph body-first and then through the inner blocks in order
//! (else branches directly after their then branch). Events on the bottom
//! zone are skipped: thread-local reads cannot participate in inter-thread
//! ordering, though they remain in the block graph for the value equations.
//!
//! The registry snapshots the main thread's initialisation events together
//! with the session counters before the slicing loop starts; restoring the
//! snapshot between passes replays the initialiser writes without
//! re-emitting them.

use symtrace_core::id::{EventId, ThreadId};

use crate::block::{BlockGraph, BlockId};
use crate::event::EventRef;
use crate::recorder::Recorder;

/// One thread's event sequence for the current branch valuation.
#[derive(Debug, Default)]
pub struct Slice {
    events: Vec<EventRef>,
}

impl Slice {
    /// Linearises the recorder's block graph.
    pub fn from_recorder(recorder: &Recorder) -> Slice {
        let mut events = Vec::new();
        flatten(recorder.graph(), recorder.most_outer_block(), &mut events);
        Slice { events }
    }

    pub fn events(&self) -> &[EventRef] {
        &self.events
    }

    pub fn event_ids(&self) -> Vec<EventId> {
        self.events.iter().map(|event| event.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn flatten(graph: &BlockGraph, block: BlockId, out: &mut Vec<EventRef>) {
    for event in graph.body(block) {
        if !event.zone().is_bottom() {
            out.push(event.clone());
        }
    }
    for inner in graph.inner_blocks(block) {
        flatten(graph, inner, out);
        if let Some(else_block) = graph.else_block(inner) {
            flatten(graph, else_block, out);
        }
    }
}

/// State captured by `begin_slice_loop`: the main thread's initialisation
/// events plus the counter values to restore at every pass start, so a
/// replayed slice is byte-identical in ids and zones.
#[derive(Debug, Clone)]
pub(crate) struct InitSnapshot {
    pub main_thread: ThreadId,
    pub events: Vec<EventRef>,
    pub next_event_id: u32,
    pub next_zone_atom: u32,
    pub next_thread_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtrace_core::id::ThreadId;
    use symtrace_core::types::{ElementType, ScalarLit, ScalarType};

    use crate::event::Event;
    use crate::instr::ReadInstr;
    use crate::zone::Zone;

    fn shared_write(id: u32, atom: u32) -> EventRef {
        Event::direct_write(
            EventId(id),
            ThreadId(1),
            Zone::from_atoms([atom]),
            ElementType::Scalar(ScalarType::Int),
            ReadInstr::literal(ScalarLit::Int(0), None),
            None,
        )
    }

    fn local_write(id: u32) -> EventRef {
        Event::direct_write(
            EventId(id),
            ThreadId(1),
            Zone::bottom(),
            ElementType::Scalar(ScalarType::Int),
            ReadInstr::literal(ScalarLit::Int(0), None),
            None,
        )
    }

    #[test]
    fn flattening_is_body_first_then_inner_blocks() {
        let mut recorder = Recorder::new();
        recorder.record_event(shared_write(0, 0));
        recorder.begin_then(ReadInstr::literal(ScalarLit::Bool(true), None));
        recorder.record_event(shared_write(1, 1));
        recorder.begin_else();
        recorder.record_event(shared_write(2, 2));
        recorder.end_branch();
        recorder.record_event(shared_write(3, 3));

        let slice = Slice::from_recorder(&recorder);
        let ids: Vec<u32> = slice.event_ids().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn bottom_zone_events_are_skipped() {
        let mut recorder = Recorder::new();
        recorder.record_event(shared_write(0, 0));
        recorder.record_event(local_write(1));
        recorder.record_event(shared_write(2, 1));

        let slice = Slice::from_recorder(&recorder);
        let ids: Vec<u32> = slice.event_ids().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(slice.len(), 2);
    }

    #[test]
    fn empty_recorder_yields_empty_slice() {
        let recorder = Recorder::new();
        assert!(Slice::from_recorder(&recorder).is_empty());
    }
}
