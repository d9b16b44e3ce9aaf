//! Encoder error types.
//!
//! Uses `thiserror` for structured, matchable variants. These are *solver
//! capability* faults: the encoder was asked to translate something the
//! formula language cannot express. They abort the current slicer pass; the
//! embedder may still proceed to the next slice. Contract violations in the
//! recording API are not errors -- they are assertion failures.

use symtrace_core::op::Op;
use symtrace_core::types::{ElementType, ScalarType};
use thiserror::Error;

/// Errors produced while translating a recording into a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// An operator appeared in a position the encoder does not implement.
    #[error("unsupported operator {op:?} in {position} position")]
    UnsupportedOperator { op: Op, position: &'static str },

    /// An n-ary node requires an identity element its operator lacks.
    #[error("operator {op:?} has no identity element over {ty}")]
    MissingIdentity { op: Op, ty: ScalarType },

    /// An array operation was applied to a non-array element type.
    #[error("expected an array element type, got {ty}")]
    ArrayTypeExpected { ty: ElementType },
}
