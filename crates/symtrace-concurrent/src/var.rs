//! Symbolic variables: the memory surface of the instrumented program.
//!
//! Declaring a variable emits a direct write initialising it (to zero unless
//! a value is given). Thread-local variables live on the bottom zone and
//! track the read event standing for their current value, so a read after a
//! write observes exactly that write. Shared variables carry a unique zone
//! atom and mint a fresh read event on every evaluation; which write such a
//! read observes is decided by the read-from axioms, which is precisely
//! where the modelled races come from.
//!
//! Fixed-size arrays additionally remember their most recent indirect write
//! so later element reads go through the updated array value.

use std::marker::PhantomData;

use symtrace_core::types::{ElementType, Scalar, ScalarLit};

use crate::event::EventRef;
use crate::expr::{Expr, IntoExpr};
use crate::instr::{InstrRef, ReadInstr};
use crate::threads;
use crate::zone::Zone;

/// Thread-local scalar variable.
#[derive(Debug)]
pub struct LocalVar<T: Scalar> {
    write: EventRef,
    read: EventRef,
    _marker: PhantomData<T>,
}

impl<T: Scalar> LocalVar<T> {
    fn init(instr: InstrRef) -> LocalVar<T> {
        let ty = ElementType::Scalar(T::TYPE);
        let write = threads::instr_direct(Zone::bottom(), ty, instr);
        let read = threads::make_read_event_with_id(write.id(), Zone::bottom(), ty);
        LocalVar { write, read, _marker: PhantomData }
    }

    pub fn new(value: T) -> LocalVar<T> {
        LocalVar::from_expr(Expr::lit(value))
    }

    /// Declares the variable with an arbitrary initialiser: a value, an
    /// expression, or another variable.
    pub fn from_expr(value: impl IntoExpr<T>) -> LocalVar<T> {
        LocalVar::init(value.into_expr().into_instr())
    }

    /// Assigns a new value, emitting a direct write guarded by the current
    /// effective guard. The paired read event shares the write's id so a
    /// subsequent read denotes the same SMT constant.
    pub fn set(&mut self, value: impl IntoExpr<T>) {
        let ty = ElementType::Scalar(T::TYPE);
        let write = threads::instr_direct(Zone::bottom(), ty, value.into_expr().into_instr());
        self.read = threads::make_read_event_with_id(write.id(), Zone::bottom(), ty);
        self.write = write;
    }

    /// Current value as an expression. Reads share one event until the next
    /// write.
    pub fn get(&self) -> Expr<T> {
        Expr::from_instr(ReadInstr::basic(self.read.clone()))
    }

    pub fn last_write(&self) -> &EventRef {
        &self.write
    }
}

impl<T: Scalar> Default for LocalVar<T> {
    /// Declares the variable initialised to zero.
    fn default() -> LocalVar<T> {
        LocalVar::init(ReadInstr::literal(
            ScalarLit::zero(T::TYPE),
            threads::try_path_condition(),
        ))
    }
}

/// Scalar variable shared between threads.
#[derive(Debug)]
pub struct SharedVar<T: Scalar> {
    zone: Zone,
    write: EventRef,
    _marker: PhantomData<T>,
}

impl<T: Scalar> SharedVar<T> {
    fn init(instr: InstrRef) -> SharedVar<T> {
        let zone = Zone::unique_atom();
        let write = threads::instr_direct(zone.clone(), ElementType::Scalar(T::TYPE), instr);
        SharedVar { zone, write, _marker: PhantomData }
    }

    pub fn new(value: T) -> SharedVar<T> {
        SharedVar::init(Expr::lit(value).into_instr())
    }

    pub fn from_expr(value: impl IntoExpr<T>) -> SharedVar<T> {
        SharedVar::init(value.into_expr().into_instr())
    }

    pub fn set(&mut self, value: impl IntoExpr<T>) {
        self.write = threads::instr_direct(
            self.zone.clone(),
            ElementType::Scalar(T::TYPE),
            value.into_expr().into_instr(),
        );
    }

    /// Current value as an expression. Every evaluation emits a fresh read
    /// event on the variable's zone; the write it observes is chosen by the
    /// read-from axioms.
    pub fn get(&self) -> Expr<T> {
        Expr::from_instr(ReadInstr::basic(threads::make_read_event(
            self.zone.clone(),
            ElementType::Scalar(T::TYPE),
        )))
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn last_write(&self) -> &EventRef {
        &self.write
    }
}

impl<T: Scalar> Default for SharedVar<T> {
    /// Declares the variable initialised to zero.
    fn default() -> SharedVar<T> {
        SharedVar::init(ReadInstr::literal(
            ScalarLit::zero(T::TYPE),
            threads::try_path_condition(),
        ))
    }
}

impl<T: Scalar> IntoExpr<T> for &LocalVar<T> {
    fn into_expr(self) -> Expr<T> {
        self.get()
    }
}

impl<T: Scalar> IntoExpr<T> for &SharedVar<T> {
    fn into_expr(self) -> Expr<T> {
        self.get()
    }
}

/// Thread-local fixed-size array.
#[derive(Debug)]
pub struct LocalArray<T: Scalar, const N: usize> {
    read: EventRef,
    last_indirect: Option<EventRef>,
    _marker: PhantomData<T>,
}

impl<T: Scalar, const N: usize> LocalArray<T, N> {
    const fn element_type() -> ElementType {
        ElementType::Array {
            elem: T::TYPE,
            len: N as u32,
        }
    }

    /// Declares the array with every element initialised to zero.
    pub fn new() -> LocalArray<T, N> {
        let init = threads::instr_direct(
            Zone::bottom(),
            Self::element_type(),
            ReadInstr::literal_array(
                ScalarLit::zero(T::TYPE),
                N as u32,
                threads::try_path_condition(),
            ),
        );
        let read = threads::make_read_event_with_id(init.id(), Zone::bottom(), Self::element_type());
        LocalArray {
            read,
            last_indirect: None,
            _marker: PhantomData,
        }
    }

    /// Writes one element. The paired array read event shares the indirect
    /// write's id so later element reads observe the updated array.
    pub fn set_at(&mut self, index: impl IntoExpr<u64>, value: impl IntoExpr<T>) {
        let deref = ReadInstr::deref(
            ReadInstr::basic(self.read.clone()),
            index.into_expr().into_instr(),
        );
        let write = threads::instr_indirect(
            Zone::bottom(),
            Self::element_type(),
            deref,
            value.into_expr().into_instr(),
        );
        self.read =
            threads::make_read_event_with_id(write.id(), Zone::bottom(), Self::element_type());
        self.last_indirect = Some(write);
    }

    /// Reads one element. Loads are not bounds-checked; an out-of-bounds
    /// index yields an unconstrained value through the array theory.
    pub fn get(&self, index: impl IntoExpr<u64>) -> Expr<T> {
        Expr::from_instr(ReadInstr::deref(
            ReadInstr::basic(self.read.clone()),
            index.into_expr().into_instr(),
        ))
    }

    pub fn last_indirect_write(&self) -> Option<&EventRef> {
        self.last_indirect.as_ref()
    }
}

impl<T: Scalar, const N: usize> Default for LocalArray<T, N> {
    fn default() -> Self {
        LocalArray::new()
    }
}

/// Fixed-size array shared between threads.
#[derive(Debug)]
pub struct SharedArray<T: Scalar, const N: usize> {
    zone: Zone,
    init: EventRef,
    last_indirect: Option<EventRef>,
    _marker: PhantomData<T>,
}

impl<T: Scalar, const N: usize> SharedArray<T, N> {
    const fn element_type() -> ElementType {
        ElementType::Array {
            elem: T::TYPE,
            len: N as u32,
        }
    }

    /// Declares the array with every element initialised to zero.
    pub fn new() -> SharedArray<T, N> {
        let zone = Zone::unique_atom();
        let init = threads::instr_direct(
            zone.clone(),
            Self::element_type(),
            ReadInstr::literal_array(
                ScalarLit::zero(T::TYPE),
                N as u32,
                threads::try_path_condition(),
            ),
        );
        SharedArray {
            zone,
            init,
            last_indirect: None,
            _marker: PhantomData,
        }
    }

    fn array_read(&self) -> InstrRef {
        ReadInstr::basic(threads::make_read_event(
            self.zone.clone(),
            Self::element_type(),
        ))
    }

    /// Writes one element through a dereference of the current array value.
    /// Index and value may both be symbolic.
    pub fn set_at(&mut self, index: impl IntoExpr<u64>, value: impl IntoExpr<T>) {
        let deref = ReadInstr::deref(self.array_read(), index.into_expr().into_instr());
        let write = threads::instr_indirect(
            self.zone.clone(),
            Self::element_type(),
            deref,
            value.into_expr().into_instr(),
        );
        self.last_indirect = Some(write);
    }

    /// Reads one element. Loads are not bounds-checked; an out-of-bounds
    /// index yields an unconstrained value through the array theory.
    pub fn get(&self, index: impl IntoExpr<u64>) -> Expr<T> {
        Expr::from_instr(ReadInstr::deref(
            self.array_read(),
            index.into_expr().into_instr(),
        ))
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn init_write(&self) -> &EventRef {
        &self.init
    }

    pub fn last_indirect_write(&self) -> Option<&EventRef> {
        self.last_indirect.as_ref()
    }
}

impl<T: Scalar, const N: usize> Default for SharedArray<T, N> {
    fn default() -> Self {
        SharedArray::new()
    }
}
