//! Stable ID newtypes shared across the workspace.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that an `EventId` cannot be accidentally used where a `ThreadId` is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique event identifier, assigned by a monotonically increasing session
/// counter. Two events are equal if and only if their identifiers coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u32);

/// Identifier of a recorded symbolic thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

/// Program location of a static branch site, supplied by the embedder.
///
/// Locations key the slicer's branch-decision table; they must be assigned
/// monotonically per branch site and reused for the same site across passes.
/// Two distinct branch sites sharing a location collapse in the enumeration;
/// the library does not detect this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
