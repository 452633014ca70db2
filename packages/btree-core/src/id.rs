use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque 128-bit identifier used for both node and item identity.
///
/// `Id::NIL` is the reserved "absent" value: a `children_ids` entry set to
/// `Id::NIL` denotes a nil-child (a logically empty subtree), and an
/// uninitialized `parent_id` on the root is also `Id::NIL`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Id(pub u128);

impl Id {
    /// The reserved "absent" identifier. Never returned by a generator.
    pub const NIL: Id = Id(u128::MAX);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else {
            write!(f, "{:032x}", self.0)
        }
    }
}

/// Negligible-collision-probability identifier source.
///
/// The core never generates identifiers itself; minting them is an external
/// collaborator's concern. This trait exists so `btree-test-support`'s
/// in-memory repository, and any real backend, has a common shape to
/// implement.
pub trait IdGenerator {
    fn generate(&mut self) -> Id;
}

/// Monotonically-increasing generator; adequate for tests and for
/// single-writer embeddings where global uniqueness is guaranteed upstream.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: u128,
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&mut self) -> Id {
        let id = Id(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_distinguished() {
        assert!(Id::NIL.is_nil());
        assert!(!Id::new(0).is_nil());
    }

    #[test]
    fn sequential_generator_never_emits_nil() {
        let mut gen = SequentialIdGenerator::default();
        for _ in 0..1000 {
            assert!(!gen.generate().is_nil());
        }
    }
}
