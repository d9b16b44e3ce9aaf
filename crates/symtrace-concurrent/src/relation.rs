//! Zone relation: indexes the related events by their zone atoms.
//!
//! The order encoders ask two questions: which events share a zone atom
//! (candidates for write-serialisation and from-read), and which pairs of
//! events interfere at all (candidates for read-from). Events are related
//! while the sequenced-before encoding walks the block graphs; bottom-zone
//! events never enter the relation.

use indexmap::IndexMap;
use std::collections::HashSet;
use symtrace_core::id::EventId;

use crate::event::EventRef;

/// Events indexed by the atoms of their zones, in first-relate order.
#[derive(Debug, Default)]
pub struct ZoneRelation {
    events: Vec<EventRef>,
    seen: HashSet<EventId>,
    by_atom: IndexMap<u32, Vec<EventRef>>,
}

impl ZoneRelation {
    pub fn new() -> ZoneRelation {
        ZoneRelation::default()
    }

    /// Adds an event to the relation. Idempotent per event id.
    pub fn relate(&mut self, event: &EventRef) {
        assert!(!event.zone().is_bottom(), "bottom-zone events do not race");
        if !self.seen.insert(event.id()) {
            return;
        }
        self.events.push(event.clone());
        for atom in event.zone().atoms() {
            self.by_atom.entry(atom).or_default().push(event.clone());
        }
    }

    /// All related events in relate order.
    pub fn events(&self) -> &[EventRef] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The zone atoms that occurred, in first-use order.
    pub fn atoms(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_atom.keys().copied()
    }

    /// Events sharing the given atom, partitioned into (reads, writes).
    pub fn partition(&self, atom: u32) -> (Vec<EventRef>, Vec<EventRef>) {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        if let Some(events) = self.by_atom.get(&atom) {
            for event in events {
                if event.is_read() {
                    reads.push(event.clone());
                } else {
                    writes.push(event.clone());
                }
            }
        }
        (reads, writes)
    }

    /// Write events sharing the given atom.
    pub fn writes(&self, atom: u32) -> Vec<EventRef> {
        self.partition(atom).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symtrace_core::id::ThreadId;
    use symtrace_core::types::{ElementType, ScalarLit, ScalarType};

    use crate::event::Event;
    use crate::instr::ReadInstr;
    use crate::zone::Zone;

    fn read(id: u32, atoms: &[u32]) -> EventRef {
        Event::read(
            EventId(id),
            ThreadId(1),
            Zone::from_atoms(atoms.iter().copied()),
            ElementType::Scalar(ScalarType::Int),
            None,
        )
    }

    fn write(id: u32, atoms: &[u32]) -> EventRef {
        Event::direct_write(
            EventId(id),
            ThreadId(1),
            Zone::from_atoms(atoms.iter().copied()),
            ElementType::Scalar(ScalarType::Int),
            ReadInstr::literal(ScalarLit::Int(0), None),
            None,
        )
    }

    #[test]
    fn partition_splits_reads_and_writes() {
        let mut relation = ZoneRelation::new();
        relation.relate(&write(0, &[1]));
        relation.relate(&read(1, &[1]));
        relation.relate(&write(2, &[1]));
        relation.relate(&read(3, &[2]));

        let (reads, writes) = relation.partition(1);
        assert_eq!(reads.len(), 1);
        assert_eq!(writes.len(), 2);
        assert_eq!(relation.writes(2).len(), 0);
    }

    #[test]
    fn relate_is_idempotent_per_event() {
        let mut relation = ZoneRelation::new();
        let event = write(0, &[1]);
        relation.relate(&event);
        relation.relate(&event);
        assert_eq!(relation.len(), 1);
        assert_eq!(relation.writes(1).len(), 1);
    }

    #[test]
    fn multi_atom_events_appear_under_each_atom() {
        let mut relation = ZoneRelation::new();
        relation.relate(&write(0, &[1, 2]));
        assert_eq!(relation.writes(1).len(), 1);
        assert_eq!(relation.writes(2).len(), 1);
        assert_eq!(relation.len(), 1);
    }

    #[test]
    fn atoms_iterate_in_first_use_order() {
        let mut relation = ZoneRelation::new();
        relation.relate(&write(0, &[5]));
        relation.relate(&write(1, &[2]));
        relation.relate(&write(2, &[5]));
        let atoms: Vec<u32> = relation.atoms().collect();
        assert_eq!(atoms, vec![5, 2]);
    }

    #[test]
    #[should_panic(expected = "bottom-zone")]
    fn bottom_zone_events_are_rejected() {
        let mut relation = ZoneRelation::new();
        relation.relate(&read(0, &[]));
    }
}
