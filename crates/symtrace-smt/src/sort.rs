//! SMT sorts.
//!
//! The formula language is ground and quantifier-free over two kinds of
//! sorts: a *data* sort per element type (fixed-width bit-vectors or
//! unbounded integers, see [`crate::data::DataModel`]) and the integer
//! *clock* sort used for event ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An SMT sort. `Display` renders the SMT-LIB 2 spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sort {
    Bool,
    /// Unbounded mathematical integer. Also the clock sort.
    Int,
    /// Fixed-width bit-vector.
    BitVec(u32),
    /// Array from an index sort to an element sort.
    Array(Box<Sort>, Box<Sort>),
}

impl Sort {
    pub fn array(index: Sort, elem: Sort) -> Sort {
        Sort::Array(Box::new(index), Box::new(elem))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Sort::Array(_, _))
    }

    /// Element sort of an array sort.
    ///
    /// Panics on non-array sorts; the encoder checks array-ness before
    /// entering `select`/`store` positions.
    pub fn array_range(&self) -> &Sort {
        match self {
            Sort::Array(_, range) => range,
            other => panic!("expected array sort, got {}", other),
        }
    }

    /// `true` if this sort or any component of it is a bit-vector.
    pub fn uses_bitvec(&self) -> bool {
        match self {
            Sort::BitVec(_) => true,
            Sort::Array(index, range) => index.uses_bitvec() || range.uses_bitvec(),
            _ => false,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::BitVec(width) => write!(f, "(_ BitVec {})", width),
            Sort::Array(index, range) => write!(f, "(Array {} {})", index, range),
        }
    }
}
