//! Memory and synchronisation events.
//!
//! An event is one observable memory action of the recorded program: a read,
//! a direct or indirect write, or a synthetic send/receive marking a thread
//! boundary. Events are shared through [`EventRef`] handles because the
//! analysis constantly puts them in relation to each other; two events are
//! equal if and only if their identifiers coincide, and identifiers are
//! allocated by a monotonically increasing session counter.
//!
//! An event guarded by a condition is *conditional*: the guard must hold for
//! the event to occur on the recorded path.

use std::rc::Rc;

use symtrace_core::id::{EventId, ThreadId};
use symtrace_core::types::{ElementType, ScalarType};

use crate::instr::{InstrRef, ReadInstr};
use crate::zone::Zone;

pub type EventRef = Rc<Event>;

/// Payload distinguishing the event variants.
#[derive(Debug)]
pub enum EventKind {
    /// Memory read; its value is determined by the read-from axioms.
    Read,
    /// Write of a computed value to the whole variable. For array types the
    /// instruction initialises every element.
    DirectWrite(InstrRef),
    /// Write through an array dereference: `deref` says where, `value` what.
    IndirectWrite { deref: InstrRef, value: InstrRef },
    /// Synchronisation write on a freshly allocated zone atom.
    Send,
    /// Synchronisation read from a send's zone.
    Receive,
}

/// A read, write, or synchronisation event.
#[derive(Debug)]
pub struct Event {
    id: EventId,
    thread_id: ThreadId,
    zone: Zone,
    ty: ElementType,
    guard: Option<InstrRef>,
    kind: EventKind,
}

impl Event {
    pub(crate) fn read(
        id: EventId,
        thread_id: ThreadId,
        zone: Zone,
        ty: ElementType,
        guard: Option<InstrRef>,
    ) -> EventRef {
        Rc::new(Event {
            id,
            thread_id,
            zone,
            ty,
            guard,
            kind: EventKind::Read,
        })
    }

    pub(crate) fn direct_write(
        id: EventId,
        thread_id: ThreadId,
        zone: Zone,
        ty: ElementType,
        instr: InstrRef,
        guard: Option<InstrRef>,
    ) -> EventRef {
        Rc::new(Event {
            id,
            thread_id,
            zone,
            ty,
            guard,
            kind: EventKind::DirectWrite(instr),
        })
    }

    pub(crate) fn indirect_write(
        id: EventId,
        thread_id: ThreadId,
        zone: Zone,
        ty: ElementType,
        deref: InstrRef,
        value: InstrRef,
        guard: Option<InstrRef>,
    ) -> EventRef {
        assert!(
            matches!(&*deref, ReadInstr::Deref { .. }),
            "indirect write requires a dereference instruction"
        );
        Rc::new(Event {
            id,
            thread_id,
            zone,
            ty,
            guard,
            kind: EventKind::IndirectWrite { deref, value },
        })
    }

    /// Synchronisation write. The zone must be a freshly allocated atom so
    /// the matching receive is its only reader.
    pub(crate) fn send(
        id: EventId,
        thread_id: ThreadId,
        zone: Zone,
        guard: Option<InstrRef>,
    ) -> EventRef {
        assert!(!zone.is_bottom());
        Rc::new(Event {
            id,
            thread_id,
            zone,
            ty: ElementType::Scalar(ScalarType::Bool),
            guard,
            kind: EventKind::Send,
        })
    }

    /// Synchronisation read from the given zone, preferably a send's.
    pub(crate) fn receive(
        id: EventId,
        thread_id: ThreadId,
        zone: Zone,
        guard: Option<InstrRef>,
    ) -> EventRef {
        Rc::new(Event {
            id,
            thread_id,
            zone,
            ty: ElementType::Scalar(ScalarType::Bool),
            guard,
            kind: EventKind::Receive,
        })
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    pub fn is_read(&self) -> bool {
        matches!(self.kind, EventKind::Read | EventKind::Receive)
    }

    pub fn is_write(&self) -> bool {
        !self.is_read()
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.kind, EventKind::Send | EventKind::Receive)
    }

    /// Condition that guards the event; `None` means unconditional.
    pub fn guard(&self) -> Option<&InstrRef> {
        self.guard.as_ref()
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}
