use crate::id::Id;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The logical unit stored by the tree: a stable identity, a key, an
/// optional owned value, and a version counter that advances on update.
///
/// `id` is assigned at construction and never mutated afterwards. `value`
/// is optional so a node can represent "key known, value not yet fetched"
/// when `is_value_data_in_node_segment` is false and an external
/// collaborator fetches values lazily; `value_needs_fetch` flags that state
/// explicitly rather than overloading `None`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Item<K, V> {
    id: Id,
    pub key: K,
    pub value: Option<V>,
    pub version: u64,
    pub value_needs_fetch: bool,
}

impl<K, V> Item<K, V> {
    pub fn new(id: Id, key: K, value: Option<V>) -> Self {
        Self {
            id,
            key,
            value,
            version: 0,
            value_needs_fetch: false,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Replace the value in place, advancing `version`. Never touches `key`
    /// or `id`: an in-place value update never reorders a slot.
    pub fn set_value(&mut self, value: Option<V>) {
        self.value = value;
        self.version += 1;
        self.value_needs_fetch = false;
    }
}
