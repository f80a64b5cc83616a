//! Purity lattice over builder values
//!
//! Three-point lattice: `Clean` (guaranteed immutable), `Polluted`
//! (unsafe to reuse), and `Depends(P)` (purity rides on a set of
//! parameters). Inference assigns a lattice value to an expression;
//! validation checks a declared-pure function against its contract. A
//! pure function may legally return `Depends(p)` — the caller's argument
//! then decides — while an immutable-return declaration is the stronger
//! claim of `Clean`.

mod infer;
mod validate;

pub use infer::PurityInference;
pub use validate::{validate, validate_immutable_return};

use im::OrdSet;

use crate::ssa::ValueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purity {
    /// Guaranteed immutable
    Clean,
    /// Tainted; unsafe to reuse
    Polluted,
    /// Immutable iff every parameter in the set is
    Depends(OrdSet<ValueId>),
}

impl Purity {
    pub fn depends_on(param: ValueId) -> Self {
        Purity::Depends(OrdSet::unit(param))
    }

    /// Lattice join: `Polluted` absorbs, `Clean` is the identity,
    /// dependency sets union.
    pub fn join(self, other: Purity) -> Purity {
        match (self, other) {
            (Purity::Polluted, _) | (_, Purity::Polluted) => Purity::Polluted,
            (Purity::Clean, x) | (x, Purity::Clean) => x,
            (Purity::Depends(p), Purity::Depends(q)) => Purity::Depends(p.union(q)),
        }
    }

    pub fn is_polluted(&self) -> bool {
        matches!(self, Purity::Polluted)
    }

    /// Valid as the return of a declared-pure function
    pub fn valid_for_pure_return(&self) -> bool {
        !self.is_polluted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn purity_strategy() -> impl Strategy<Value = Purity> {
        prop_oneof![
            Just(Purity::Clean),
            Just(Purity::Polluted),
            proptest::collection::btree_set(0u32..8, 0..4).prop_map(|params| {
                Purity::Depends(params.into_iter().map(ValueId).collect())
            }),
        ]
    }

    proptest! {
        #[test]
        fn join_is_commutative(a in purity_strategy(), b in purity_strategy()) {
            prop_assert_eq!(a.clone().join(b.clone()), b.join(a));
        }

        #[test]
        fn join_is_idempotent(a in purity_strategy()) {
            prop_assert_eq!(a.clone().join(a.clone()), a);
        }

        #[test]
        fn join_is_associative(
            a in purity_strategy(),
            b in purity_strategy(),
            c in purity_strategy(),
        ) {
            prop_assert_eq!(
                a.clone().join(b.clone()).join(c.clone()),
                a.join(b.join(c))
            );
        }

        #[test]
        fn polluted_absorbs(a in purity_strategy()) {
            prop_assert_eq!(a.join(Purity::Polluted), Purity::Polluted);
        }

        #[test]
        fn clean_is_identity(a in purity_strategy()) {
            prop_assert_eq!(a.clone().join(Purity::Clean), a);
        }
    }

    #[test]
    fn dependency_sets_union_without_duplicates() {
        let a = Purity::depends_on(ValueId(1));
        let b = Purity::depends_on(ValueId(2)).join(Purity::depends_on(ValueId(1)));
        match a.join(b) {
            Purity::Depends(set) => assert_eq!(set.len(), 2),
            other => panic!("expected Depends, got {:?}", other),
        }
    }
}
