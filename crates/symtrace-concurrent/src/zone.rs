//! Memory-sharing labels: an atomistic lattice over a growing atom set.
//!
//! Every event carries a [`Zone`] linking it to the memory it touches. Two
//! events can participate in a race only if the meet of their zones is
//! non-bottom. Shared variables are labelled with a unique atom; thread-local
//! storage keeps the bottom (empty) zone and is invisible to the inter-thread
//! ordering axioms.

use smallvec::SmallVec;

use crate::threads;

/// An element of the free atomistic lattice.
///
/// Atoms are allocated from the session's zone counter; the atom set of a
/// zone is kept sorted and deduplicated, so equality and hashing are
/// structural. Nearly every zone holds zero or one atoms; joins only arise
/// when the embedder aliases regions explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Zone {
    atoms: SmallVec<[u32; 2]>,
}

impl Zone {
    /// The bottom element: thread-local, races with nothing.
    pub fn bottom() -> Zone {
        Zone::default()
    }

    /// A zone holding one freshly allocated atom.
    pub fn unique_atom() -> Zone {
        Zone::atom(threads::alloc_zone_atom())
    }

    /// A zone holding exactly the given atom.
    pub(crate) fn atom(atom: u32) -> Zone {
        Zone {
            atoms: SmallVec::from_slice(&[atom]),
        }
    }

    /// A zone over an explicit atom set.
    pub fn from_atoms(atoms: impl IntoIterator<Item = u32>) -> Zone {
        let mut atoms: SmallVec<[u32; 2]> = atoms.into_iter().collect();
        atoms.sort_unstable();
        atoms.dedup();
        Zone { atoms }
    }

    pub fn is_bottom(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> impl Iterator<Item = u32> + '_ {
        self.atoms.iter().copied()
    }

    /// Greatest lower bound: intersection of the atom sets.
    pub fn meet(&self, other: &Zone) -> Zone {
        Zone {
            atoms: self
                .atoms
                .iter()
                .copied()
                .filter(|atom| other.atoms.binary_search(atom).is_ok())
                .collect(),
        }
    }

    /// Least upper bound: union of the atom sets.
    pub fn join(&self, other: &Zone) -> Zone {
        Zone::from_atoms(self.atoms().chain(other.atoms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn zone(atoms: &[u32]) -> Zone {
        Zone::from_atoms(atoms.iter().copied())
    }

    #[test]
    fn bottom_is_empty() {
        assert!(Zone::bottom().is_bottom());
        assert!(!zone(&[0]).is_bottom());
    }

    #[test]
    fn meet_is_intersection() {
        assert_eq!(zone(&[1, 2, 3]).meet(&zone(&[2, 3, 4])), zone(&[2, 3]));
        assert!(zone(&[1]).meet(&zone(&[2])).is_bottom());
    }

    #[test]
    fn join_is_union() {
        assert_eq!(zone(&[1, 2]).join(&zone(&[2, 3])), zone(&[1, 2, 3]));
    }

    #[test]
    fn equality_is_by_atom_set() {
        assert_eq!(Zone::from_atoms([3, 1, 1, 2]), zone(&[1, 2, 3]));
        assert_ne!(zone(&[1]), zone(&[2]));
    }

    proptest! {
        #[test]
        fn meet_commutes(a in proptest::collection::vec(0u32..64, 0..8),
                         b in proptest::collection::vec(0u32..64, 0..8)) {
            let (x, y) = (Zone::from_atoms(a), Zone::from_atoms(b));
            prop_assert_eq!(x.meet(&y), y.meet(&x));
        }

        #[test]
        fn meet_associates(a in proptest::collection::vec(0u32..64, 0..8),
                           b in proptest::collection::vec(0u32..64, 0..8),
                           c in proptest::collection::vec(0u32..64, 0..8)) {
            let (x, y, z) = (Zone::from_atoms(a), Zone::from_atoms(b), Zone::from_atoms(c));
            prop_assert_eq!(x.meet(&y).meet(&z), x.meet(&y.meet(&z)));
        }

        #[test]
        fn meet_is_idempotent(a in proptest::collection::vec(0u32..64, 0..8)) {
            let x = Zone::from_atoms(a);
            prop_assert_eq!(x.meet(&x), x);
        }

        #[test]
        fn bottom_absorbs_meet_and_is_join_identity(
            a in proptest::collection::vec(0u32..64, 0..8)
        ) {
            let x = Zone::from_atoms(a);
            prop_assert!(x.meet(&Zone::bottom()).is_bottom());
            prop_assert_eq!(x.join(&Zone::bottom()), x);
        }
    }
}
