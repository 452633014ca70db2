//! Transaction wrapper collaborator contract (`spec.md` §4.6, §6).
//!
//! The core tree itself has no notion of transactions; [`GatedTree`] is a
//! thin decorator that routes every `Tree` operation through a
//! [`TransactionGate`], gating on "has a transaction begun" and, for
//! mutating operations, "is it open for writing" — rolling back on any
//! error from the delegated call.

use crate::error::{Error, Result};
use crate::id::{Id, IdGenerator};
use crate::item::Item;
use crate::node::KeyComparator;
use crate::store::StoreDescriptor;
use crate::traits::{ItemActionTracker, NodeRepository};
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionMode {
    ForReading,
    ForWriting,
}

/// `spec.md` §6 transaction collaborator: `has_begun`, `mode`, `rollback`.
pub trait TransactionGate {
    fn has_begun(&self) -> bool;
    fn mode(&self) -> TransactionMode;
    fn rollback(&mut self, cause: &Error);
}

/// Gates every `Tree` operation behind a [`TransactionGate`] (`spec.md`
/// §4.6): "not begun" and "not for writing" are returned without touching
/// the inner tree; any error from a delegated call triggers `rollback`
/// before it's returned to the caller.
pub struct GatedTree<K, V, R, T, G, C, X> {
    inner: Tree<K, V, R, T, G, C>,
    gate: X,
}

impl<K, V, R, T, G, C, X> GatedTree<K, V, R, T, G, C, X>
where
    K: Clone,
    V: Clone,
    R: NodeRepository<K, V>,
    T: ItemActionTracker<K, V>,
    G: IdGenerator,
    C: KeyComparator<K>,
    X: TransactionGate,
{
    pub fn new(inner: Tree<K, V, R, T, G, C>, gate: X) -> Self {
        Self { inner, gate }
    }

    pub fn into_inner(self) -> (Tree<K, V, R, T, G, C>, X) {
        (self.inner, self.gate)
    }

    pub fn gate(&self) -> &X {
        &self.gate
    }

    fn run_read<Out>(&mut self, f: impl FnOnce(&mut Tree<K, V, R, T, G, C>) -> Result<Out>) -> Result<Out> {
        if !self.gate.has_begun() {
            return Err(Error::TransactionNotBegun);
        }
        match f(&mut self.inner) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.gate.rollback(&e);
                Err(e)
            }
        }
    }

    fn run_write<Out>(&mut self, f: impl FnOnce(&mut Tree<K, V, R, T, G, C>) -> Result<Out>) -> Result<Out> {
        if !self.gate.has_begun() {
            return Err(Error::TransactionNotBegun);
        }
        if self.gate.mode() != TransactionMode::ForWriting {
            let err = Error::TransactionNotForWriting;
            self.gate.rollback(&err);
            return Err(err);
        }
        match f(&mut self.inner) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.gate.rollback(&e);
                Err(e)
            }
        }
    }

    pub fn add(&mut self, key: K, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.add(key, value))
    }

    pub fn add_if_not_exist(&mut self, key: K, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.add_if_not_exist(key, value))
    }

    pub fn add_item(&mut self, item: Item<K, V>) -> Result<bool> {
        self.run_write(|t| t.add_item(item))
    }

    pub fn upsert(&mut self, key: K, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.upsert(key, value))
    }

    pub fn update(&mut self, key: K, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.update(key, value))
    }

    pub fn update_current_item(&mut self, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.update_current_item(value))
    }

    pub fn update_current_key(&mut self, key: K) -> Result<bool> {
        self.run_write(|t| t.update_current_key(key))
    }

    pub fn update_current_node_item(&mut self, key: K, value: Option<V>) -> Result<bool> {
        self.run_write(|t| t.update_current_node_item(key, value))
    }

    pub fn remove(&mut self, key: K) -> Result<bool> {
        self.run_write(|t| t.remove(key))
    }

    pub fn remove_current_item(&mut self) -> Result<bool> {
        self.run_write(|t| t.remove_current_item())
    }

    pub fn find(&mut self, key: K, first_item_with_key: bool) -> Result<bool> {
        self.run_read(|t| t.find(key, first_item_with_key))
    }

    pub fn find_with_id(&mut self, key: K, id: Id) -> Result<bool> {
        self.run_read(|t| t.find_with_id(key, id))
    }

    pub fn first(&mut self) -> Result<bool> {
        self.run_read(|t| t.first())
    }

    pub fn last(&mut self) -> Result<bool> {
        self.run_read(|t| t.last())
    }

    pub fn next(&mut self) -> Result<bool> {
        self.run_read(|t| t.next())
    }

    pub fn previous(&mut self) -> Result<bool> {
        self.run_read(|t| t.previous())
    }

    /// Per `spec.md` §4.6: "read-only getters of cursor key return the zero
    /// value ... when the transaction has not begun" — unlike every other
    /// operation here, this does not error on an unbegun transaction.
    pub fn get_current_key(&mut self) -> Result<Option<K>> {
        if !self.gate.has_begun() {
            return Ok(None);
        }
        match self.inner.get_current_key() {
            Ok(v) => Ok(v),
            Err(e) => {
                self.gate.rollback(&e);
                Err(e)
            }
        }
    }

    pub fn get_current_value(&mut self) -> Result<Option<V>> {
        if !self.gate.has_begun() {
            return Ok(None);
        }
        match self.inner.get_current_value() {
            Ok(v) => Ok(v),
            Err(e) => {
                self.gate.rollback(&e);
                Err(e)
            }
        }
    }

    pub fn get_current_item(&mut self) -> Result<Option<Item<K, V>>> {
        if !self.gate.has_begun() {
            return Ok(None);
        }
        match self.inner.get_current_item() {
            Ok(v) => Ok(v),
            Err(e) => {
                self.gate.rollback(&e);
                Err(e)
            }
        }
    }

    pub fn count(&mut self) -> Result<u64> {
        self.run_read(|t| Ok(t.count()))
    }

    pub fn is_unique(&mut self) -> Result<bool> {
        self.run_read(|t| Ok(t.is_unique()))
    }

    pub fn is_value_data_in_node_segment(&mut self) -> Result<bool> {
        self.run_read(|t| Ok(t.is_value_data_in_node_segment()))
    }

    pub fn get_store_info(&mut self) -> Result<StoreDescriptor> {
        self.run_read(|t| Ok(*t.get_store_info()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use crate::node::{NaturalOrder, Node};
    use crate::store::StoreDescriptor;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemRepo {
        nodes: HashMap<Id, Node<u32, u32>>,
    }
    impl NodeRepository<u32, u32> for MemRepo {
        fn get(&mut self, id: Id) -> Result<Option<Node<u32, u32>>> {
            Ok(self.nodes.get(&id).cloned())
        }
        fn add(&mut self, node: &Node<u32, u32>) -> Result<()> {
            self.nodes.insert(node.id(), node.clone());
            Ok(())
        }
        fn update(&mut self, node: &Node<u32, u32>) -> Result<()> {
            self.nodes.insert(node.id(), node.clone());
            Ok(())
        }
        fn remove(&mut self, id: Id) -> Result<()> {
            self.nodes.remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopTracker;
    impl ItemActionTracker<u32, u32> for NoopTracker {
        fn add(&mut self, _item: &Item<u32, u32>) -> Result<()> {
            Ok(())
        }
        fn get(&mut self, _item: &Item<u32, u32>) -> Result<()> {
            Ok(())
        }
        fn update(&mut self, _item: &Item<u32, u32>) -> Result<()> {
            Ok(())
        }
        fn remove(&mut self, _item: &Item<u32, u32>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeGate {
        begun: bool,
        mode: Option<TransactionMode>,
        rollbacks: usize,
    }
    impl TransactionGate for FakeGate {
        fn has_begun(&self) -> bool {
            self.begun
        }
        fn mode(&self) -> TransactionMode {
            self.mode.unwrap_or(TransactionMode::ForReading)
        }
        fn rollback(&mut self, _cause: &Error) {
            self.rollbacks += 1;
        }
    }

    fn gated() -> GatedTree<u32, u32, MemRepo, NoopTracker, SequentialIdGenerator, NaturalOrder, FakeGate> {
        let descriptor = StoreDescriptor::new(4, true, false, true).unwrap();
        let tree = Tree::new(descriptor, MemRepo::default(), NoopTracker, SequentialIdGenerator::default(), NaturalOrder).unwrap();
        GatedTree::new(tree, FakeGate::default())
    }

    #[test]
    fn mutation_before_begin_errors_without_touching_tree() {
        let mut g = gated();
        assert!(matches!(g.add(1, Some(1)).unwrap_err(), Error::TransactionNotBegun));
    }

    #[test]
    fn get_current_key_returns_none_without_erroring_when_not_begun() {
        let mut g = gated();
        assert_eq!(g.get_current_key().unwrap(), None);
    }

    #[test]
    fn writing_in_read_mode_rolls_back() {
        let mut g = gated();
        g.gate.begun = true;
        g.gate.mode = Some(TransactionMode::ForReading);
        assert!(matches!(g.add(1, Some(1)).unwrap_err(), Error::TransactionNotForWriting));
        assert_eq!(g.gate.rollbacks, 1);
    }

    #[test]
    fn writing_in_write_mode_succeeds() {
        let mut g = gated();
        g.gate.begun = true;
        g.gate.mode = Some(TransactionMode::ForWriting);
        assert!(g.add(1, Some(1)).unwrap());
        assert!(g.find(1, false).unwrap());
    }
}
