//! Symbolic spinlock.
//!
//! The mutex is modelled as a shared variable holding the id of the thread
//! that last acquired it. `lock` records the acquisition as a symbolic
//! write; `unlock` asserts through the solver that the recorded owner still
//! is the unlocking thread. Because the owner variable lives on a shared
//! zone, the write-serialisation and from-read axioms serialise the critical
//! sections of every shared zone touched between lock and unlock.

use symtrace_core::id::ThreadId;
use symtrace_smt::{EncodeError, Solver};

use crate::encoder::Encoders;
use crate::threads::Threads;
use crate::var::SharedVar;

/// A spinlock protecting shared data from simultaneous access.
#[derive(Debug)]
pub struct Mutex {
    /// Concrete owner bookkeeping for the unlock contract check.
    owner: Option<ThreadId>,
    /// Symbolic owner: the thread id written by the latest `lock`.
    thread_id: SharedVar<u64>,
}

impl Mutex {
    pub fn new() -> Mutex {
        Mutex {
            owner: None,
            thread_id: SharedVar::default(),
        }
    }

    /// Acquires the lock: records the current thread as owner.
    pub fn lock(&mut self) {
        let me = Threads::current_thread();
        self.owner = Some(me);
        self.thread_id.set(me.0 as u64);
    }

    /// Releases the lock.
    ///
    /// The calling thread must be the one that called `lock`; unlocking
    /// from another thread is a usage fault. The symbolic counterpart is
    /// asserted via `expect`: on the recorded path the owner variable still
    /// holds the unlocking thread's id.
    pub fn unlock<S: Solver>(&mut self, encoders: &mut Encoders<S>) -> Result<(), EncodeError> {
        let me = Threads::current_thread();
        assert_eq!(
            self.owner,
            Some(me),
            "mutex unlocked by a thread that does not hold it"
        );
        self.owner = None;
        Threads::expect(self.thread_id.get().eq(me.0 as u64), encoders)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Mutex::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::Threads;

    #[test]
    fn lock_records_the_owning_thread() {
        Threads::reset();
        Threads::begin_main_thread();
        let mut encoders = Encoders::new();
        let mut mutex = Mutex::new();
        mutex.lock();
        mutex.unlock(&mut encoders).unwrap();
        // Owner write, fresh read in unlock, and the expect assertion.
        assert!(!encoders.script().is_empty());
    }

    #[test]
    fn relocking_after_unlock_is_allowed() {
        Threads::reset();
        Threads::begin_main_thread();
        let mut encoders = Encoders::new();
        let mut mutex = Mutex::new();
        mutex.lock();
        mutex.unlock(&mut encoders).unwrap();
        mutex.lock();
        mutex.unlock(&mut encoders).unwrap();
    }

    #[test]
    #[should_panic(expected = "does not hold it")]
    fn unlock_without_lock_panics() {
        Threads::reset();
        Threads::begin_main_thread();
        let mut encoders = Encoders::new();
        let mut mutex = Mutex::new();
        let _ = mutex.unlock(&mut encoders);
    }
}
