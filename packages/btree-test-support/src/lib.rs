//! In-memory collaborator implementations for `btree-core`'s own test suite
//! and for anyone building a concrete backend against the engine: a
//! `HashMap`-backed `NodeRepository`, a recording `ItemActionTracker`, and a
//! minimal `TransactionGate`. None of these are meant for production use —
//! they exist to exercise the engine's contracts without pulling in a real
//! storage layer.

use std::collections::HashMap;

use btree_core::{
    Error, Id, IdGenerator, Item, Node, NodeRepository, Result, SequentialIdGenerator,
    TransactionGate, TransactionMode,
};

/// `HashMap`-backed `NodeRepository<K, V>` plus a bundled [`SequentialIdGenerator`].
///
/// Tracks `fetched` calls in `fetch_order` (most-recently-fetched last) so
/// tests can assert on the MRU-accounting hook without a real cache behind
/// it.
#[derive(Default)]
pub struct MemoryNodeRepository<K, V> {
    nodes: HashMap<Id, Node<K, V>>,
    pub id_gen: SequentialIdGenerator,
    pub fetch_order: Vec<Id>,
}

impl<K, V> MemoryNodeRepository<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            id_gen: SequentialIdGenerator::default(),
            fetch_order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }
}

impl<K: Clone, V: Clone> NodeRepository<K, V> for MemoryNodeRepository<K, V> {
    fn get(&mut self, id: Id) -> Result<Option<Node<K, V>>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn add(&mut self, node: &Node<K, V>) -> Result<()> {
        self.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn update(&mut self, node: &Node<K, V>) -> Result<()> {
        if !self.nodes.contains_key(&node.id()) {
            return Err(Error::repository(format!(
                "update of unknown node {}",
                node.id()
            )));
        }
        self.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn remove(&mut self, id: Id) -> Result<()> {
        self.nodes.remove(&id);
        Ok(())
    }

    fn fetched(&mut self, id: Id) -> Result<()> {
        self.fetch_order.push(id);
        Ok(())
    }
}

/// One recorded call into an [`btree_core::ItemActionTracker`].
#[derive(Clone, Debug)]
pub enum TrackedAction<K, V> {
    Add(Item<K, V>),
    Get(Item<K, V>),
    Update(Item<K, V>),
    Remove(Item<K, V>),
}

/// Records every `add`/`get`/`update`/`remove` call in order, for asserting
/// on the tracker-call ordering guarantees in `spec.md` §5.
#[derive(Default)]
pub struct RecordingItemActionTracker<K, V> {
    pub actions: Vec<TrackedAction<K, V>>,
}

impl<K, V> RecordingItemActionTracker<K, V> {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }
}

impl<K: Clone, V: Clone> btree_core::ItemActionTracker<K, V> for RecordingItemActionTracker<K, V> {
    fn add(&mut self, item: &Item<K, V>) -> Result<()> {
        self.actions.push(TrackedAction::Add(item.clone()));
        Ok(())
    }

    fn get(&mut self, item: &Item<K, V>) -> Result<()> {
        self.actions.push(TrackedAction::Get(item.clone()));
        Ok(())
    }

    fn update(&mut self, item: &Item<K, V>) -> Result<()> {
        self.actions.push(TrackedAction::Update(item.clone()));
        Ok(())
    }

    fn remove(&mut self, item: &Item<K, V>) -> Result<()> {
        self.actions.push(TrackedAction::Remove(item.clone()));
        Ok(())
    }
}

/// Minimal in-memory transaction gate (`spec.md` §4.6, §6): tracks whether
/// a transaction has begun, its mode, and records the cause of the last
/// rollback.
pub struct SimpleTransaction {
    begun: bool,
    mode: TransactionMode,
    pub rollbacks: Vec<String>,
}

impl Default for SimpleTransaction {
    fn default() -> Self {
        Self {
            begun: false,
            mode: TransactionMode::ForReading,
            rollbacks: Vec::new(),
        }
    }
}

impl SimpleTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, mode: TransactionMode) {
        self.begun = true;
        self.mode = mode;
    }

    pub fn end(&mut self) {
        self.begun = false;
    }
}

impl TransactionGate for SimpleTransaction {
    fn has_begun(&self) -> bool {
        self.begun
    }

    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn rollback(&mut self, cause: &Error) {
        self.rollbacks.push(cause.to_string());
    }
}
