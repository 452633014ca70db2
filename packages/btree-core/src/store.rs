use crate::error::{Error, Result};
use crate::id::Id;

/// Immutable tree configuration.
///
/// Constructed once via [`StoreDescriptor::new`], which validates and
/// normalizes `slot_length`; there is no setter afterwards; a tree that
/// needs a different shape builds a new descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreDescriptor {
    slot_length: usize,
    is_unique: bool,
    leaf_load_balancing: bool,
    is_value_data_in_node_segment: bool,
    root_node_id: Id,
    count: u64,
}

/// Smallest slot length the engine accepts; inputs below this round up
/// (`spec.md` §4.1: "must be ≥ 4 and even; ... small inputs round up").
pub const MIN_SLOT_LENGTH: usize = 4;

impl StoreDescriptor {
    /// Validate and normalize `slot_length`: odd inputs round down to the
    /// nearest even number, inputs below [`MIN_SLOT_LENGTH`] round up to it.
    pub fn new(slot_length: usize, is_unique: bool, leaf_load_balancing: bool, is_value_data_in_node_segment: bool) -> Result<Self> {
        if slot_length == 0 {
            return Err(Error::InvalidConfig("slot_length must be positive".into()));
        }
        let mut normalized = slot_length & !1;
        if normalized < MIN_SLOT_LENGTH {
            normalized = MIN_SLOT_LENGTH;
        }
        Ok(Self {
            slot_length: normalized,
            is_unique,
            leaf_load_balancing,
            is_value_data_in_node_segment,
            root_node_id: Id::NIL,
            count: 0,
        })
    }

    pub fn slot_length(&self) -> usize {
        self.slot_length
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique
    }

    pub fn leaf_load_balancing(&self) -> bool {
        self.leaf_load_balancing
    }

    pub fn is_value_data_in_node_segment(&self) -> bool {
        self.is_value_data_in_node_segment
    }

    pub fn root_node_id(&self) -> Id {
        self.root_node_id
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn set_root_node_id(&mut self, id: Id) {
        self.root_node_id = id;
    }

    pub(crate) fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    pub(crate) fn adjust_count(&mut self, delta: i64) {
        self.count = (self.count as i64 + delta).max(0) as u64;
    }
}
