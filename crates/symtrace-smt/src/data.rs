//! Data-model selection: bit-vectors or unbounded integers.
//!
//! The formula's data sort is selectable per [`crate::script::Script`]-
//! producing session: under [`DataModel::BitVec`] every element type maps to
//! a bit-vector of its width and arithmetic wraps in two's-complement; under
//! [`DataModel::Int`] element types map to mathematical integers and
//! arithmetic is exact. Booleans map to `Bool` in both models. The clock
//! sort is always `Int` and is unaffected by this choice.

use serde::{Deserialize, Serialize};
use symtrace_core::types::{ElementType, ScalarLit, ScalarType};

use crate::sort::Sort;
use crate::term::{Term, TermRef};

/// Interpretation of the data sorts in the generated formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataModel {
    /// Fixed-width bit-vectors; overflow wraps.
    BitVec,
    /// Unbounded integers; overflow is mathematical.
    Int,
}

impl DataModel {
    /// Sort of a scalar element type under this model.
    pub fn scalar_sort(self, ty: ScalarType) -> Sort {
        match (self, ty) {
            (_, ScalarType::Bool) => Sort::Bool,
            (DataModel::BitVec, ty) => Sort::BitVec(ty.bit_width()),
            (DataModel::Int, _) => Sort::Int,
        }
    }

    /// Sort of an element type under this model; arrays become SMT arrays
    /// from the index sort to the element sort.
    pub fn element_sort(self, ty: ElementType) -> Sort {
        match ty {
            ElementType::Scalar(scalar) => self.scalar_sort(scalar),
            ElementType::Array { elem, .. } => {
                Sort::array(self.index_sort(), self.scalar_sort(elem))
            }
        }
    }

    /// Sort of array indices: the data sort of the `size` type.
    pub fn index_sort(self) -> Sort {
        self.scalar_sort(ScalarType::Size)
    }

    /// A literal term denoting `lit` under this model.
    pub fn literal(self, lit: ScalarLit) -> TermRef {
        match (self, lit) {
            (_, ScalarLit::Bool(b)) => Term::bool_lit(b),
            (DataModel::BitVec, lit) => {
                Term::bv_lit(lit.as_bits(), lit.scalar_type().bit_width())
            }
            (DataModel::Int, lit) => Term::int_lit(lit.as_signed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_maps_to_bool_in_both_models() {
        assert_eq!(DataModel::BitVec.scalar_sort(ScalarType::Bool), Sort::Bool);
        assert_eq!(DataModel::Int.scalar_sort(ScalarType::Bool), Sort::Bool);
    }

    #[test]
    fn bitvec_model_uses_type_widths() {
        assert_eq!(
            DataModel::BitVec.scalar_sort(ScalarType::Char),
            Sort::BitVec(8)
        );
        assert_eq!(
            DataModel::BitVec.scalar_sort(ScalarType::Int),
            Sort::BitVec(32)
        );
        assert_eq!(DataModel::BitVec.index_sort(), Sort::BitVec(64));
    }

    #[test]
    fn int_model_collapses_widths() {
        assert_eq!(DataModel::Int.scalar_sort(ScalarType::Char), Sort::Int);
        assert_eq!(DataModel::Int.scalar_sort(ScalarType::Long), Sort::Int);
        assert_eq!(DataModel::Int.index_sort(), Sort::Int);
    }

    #[test]
    fn array_sorts() {
        let ty = ElementType::Array {
            elem: ScalarType::Char,
            len: 3,
        };
        assert_eq!(
            DataModel::BitVec.element_sort(ty),
            Sort::array(Sort::BitVec(64), Sort::BitVec(8))
        );
        assert_eq!(
            DataModel::Int.element_sort(ty),
            Sort::array(Sort::Int, Sort::Int)
        );
    }

    #[test]
    fn literals_follow_the_model() {
        // -1 as a 32-bit vector keeps its bit pattern; as an integer it
        // stays mathematical.
        assert_eq!(
            *DataModel::BitVec.literal(ScalarLit::Int(-1)),
            Term::BvLit {
                bits: 0xFFFF_FFFF,
                width: 32
            }
        );
        assert_eq!(*DataModel::Int.literal(ScalarLit::Int(-1)), Term::IntLit(-1));
        assert_eq!(
            *DataModel::Int.literal(ScalarLit::Bool(true)),
            Term::BoolLit(true)
        );
    }
}
