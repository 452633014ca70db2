//! Successor swap, nil-child compaction, single-child promotion, root
//! collapse, and unlink (`spec.md` §4.3, §4.4).

use std::marker::PhantomData;

use crate::cursor::{self, CursorPosition};
use crate::error::{Error, Result};
use crate::id::{Id, IdGenerator};
use crate::item::Item;
use crate::node::Node;
use crate::traits::NodeRepository;

/// Drives one `RemoveCurrentItem` call. Unlike [`crate::insert::InsertionEngine`]
/// there is no reshape queue to drain afterwards: every deletion path below
/// is already iterative (root-collapse and single-child promotion terminate
/// in one hop, since a parent can only ever have one item fewer than before).
pub struct DeletionEngine<'a, K, V, R> {
    repo: &'a mut R,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V, R> DeletionEngine<'a, K, V, R>
where
    K: Clone,
    V: Clone,
    R: NodeRepository<K, V>,
{
    pub fn new(repo: &'a mut R) -> Self {
        Self { repo, _marker: PhantomData }
    }

    fn fetch(&mut self, id: Id) -> Result<Node<K, V>> {
        self.repo
            .get(id)?
            .ok_or_else(|| Error::invariant(format!("node {id} referenced but missing from repository")))
    }

    /// `spec.md` §4.3 `RemoveCurrentItem`. Returns the item that was
    /// actually removed from a slot — for the internal-node case this is
    /// either the original slot's item (nil-child path) or the successor
    /// leaf item that was moved up (successor-swap path), per the tracker
    /// announcement contract in §4.3. `None` means the guard failed: no
    /// current selection, or the slot was already empty.
    pub fn remove_current_item(&mut self, pos: CursorPosition) -> Result<Option<Item<K, V>>> {
        let node = self.fetch(pos.node_id)?;
        if node.slot(pos.index).is_none() {
            return Ok(None);
        }
        if node.has_children() {
            return self.remove_from_internal(pos.node_id, pos.index);
        }
        self.fix_vacated_slot(pos.node_id, pos.index)
    }

    fn remove_from_internal(&mut self, node_id: Id, index: usize) -> Result<Option<Item<K, V>>> {
        let node = self.fetch(node_id)?;
        let original = node.slot(index).cloned();

        if self.remove_item_on_node_with_nil_child(node_id, index)? {
            return Ok(original);
        }

        let next = cursor::move_to_next(self.repo, CursorPosition::new(node_id, index))?
            .ok_or_else(|| Error::invariant("internal delete: no in-order successor found"))?;
        let leaf = self.fetch(next.node_id)?;
        let successor = leaf
            .slot(next.index)
            .cloned()
            .ok_or_else(|| Error::invariant("successor slot is empty"))?;

        let mut internal = self.fetch(node_id)?;
        internal.put_slot(index, successor.clone());
        self.repo.update(&internal)?;

        self.fix_vacated_slot(next.node_id, next.index)?;
        Ok(Some(successor))
    }

    /// `spec.md` §4.4 `removeItemOnNodeWithNilChild`. Returns `false` when
    /// both adjacent children are non-nil — the caller must fall back to
    /// the successor-swap path.
    fn remove_item_on_node_with_nil_child(&mut self, node_id: Id, index: usize) -> Result<bool> {
        let mut node = self.fetch(node_id)?;
        let left_nil = node.is_child_nil(index);
        let right_nil = node.is_child_nil(index + 1);
        if !left_nil && !right_nil {
            return Ok(false);
        }

        node.remove_slot_shifting(index);
        if left_nil {
            node.remove_child_shifting(index);
        } else {
            node.remove_child_shifting(index + 1);
        }
        node.set_count(node.count() - 1);
        self.repo.update(&node)?;

        if node.count() > 0 {
            return Ok(true);
        }
        if !self.try_collapse_empty_node(node_id)? {
            self.unlink(node_id)?;
        }
        Ok(true)
    }

    /// `spec.md` §4.3 `fixVacatedSlot` — always operates on a true leaf
    /// (`remove_current_item` only reaches here when `!node.has_children()`).
    fn fix_vacated_slot(&mut self, node_id: Id, index: usize) -> Result<Option<Item<K, V>>> {
        let mut node = self.fetch(node_id)?;
        let removed = node.slot(index).cloned();

        if node.count() > 1 {
            node.remove_slot_shifting(index);
            node.set_count(node.count() - 1);
            self.repo.update(&node)?;
            return Ok(removed);
        }

        if node.is_root() {
            node.take_slot(index);
            node.set_count(0);
            self.repo.update(&node)?;
            return Ok(removed);
        }

        node.take_slot(index);
        node.set_count(0);
        self.repo.update(&node)?;
        // `unlinkNodeWithNilChild`: a true leaf never has children, so this
        // always reports false here and we fall through to `unlink`, per
        // `spec.md` §4.3's "attempt unlinkNodeWithNilChild ... or no children
        // at all, fall through to unlink".
        if !self.try_collapse_empty_node(node_id)? {
            self.unlink(node_id)?;
        }
        Ok(removed)
    }

    /// Shared tail of both `removeItemOnNodeWithNilChild` (§4.4) and
    /// `fixVacatedSlot` (§4.3) once a node's `count` has reached zero:
    /// absorb the sole remaining non-nil child into the root, or promote it
    /// to take this node's place in its parent. Returns `false` (taking no
    /// action) when the node has no children, or none of its children are
    /// non-nil — the caller is then responsible for `unlink`.
    fn try_collapse_empty_node(&mut self, node_id: Id) -> Result<bool> {
        let mut node = self.fetch(node_id)?;
        if !node.has_children() {
            return Ok(false);
        }
        let Some(child_index) = node.children_ids().iter().position(|c| !c.is_nil()) else {
            return Ok(false);
        };
        let child_id = node.child_id(child_index);

        if node.is_root() {
            let child = self.fetch(child_id)?;
            self.absorb_child_into_root(&mut node, &child)?;
            self.repo.update(&node)?;
            self.repo.remove(child_id)?;
            return Ok(true);
        }

        self.promote_single_child_as_parent_child(node, child_id)?;
        Ok(true)
    }

    /// Root-collapse case: copy the lone child's slots/count/children into
    /// `root` in place, reparenting any adopted grandchildren (`spec.md`
    /// §4.4).
    fn absorb_child_into_root(&mut self, root: &mut Node<K, V>, child: &Node<K, V>) -> Result<()> {
        for i in 0..root.slot_length() {
            root.take_slot(i);
        }
        for i in 0..child.count() {
            root.put_slot(i, child.slot(i).cloned().expect("occupied slot"));
        }
        root.set_count(child.count());

        if child.has_children() {
            root.set_children(child.children_ids().to_vec());
            for i in 0..root.children_ids().len() {
                let grandchild_id = root.child_id(i);
                if grandchild_id.is_nil() {
                    continue;
                }
                let mut grandchild = self.fetch(grandchild_id)?;
                grandchild.parent_id = root.id();
                grandchild.index_of_node = i as i64;
                self.repo.update(&grandchild)?;
            }
        } else {
            root.clear_children();
        }
        Ok(())
    }

    /// `promoteSingleChildAsParentChild` (`spec.md` §4.4): replace `node`
    /// with its only non-nil child in the parent's `children_ids`, and
    /// remove `node` from the repository.
    fn promote_single_child_as_parent_child(&mut self, node: Node<K, V>, child_id: Id) -> Result<()> {
        let parent_id = node.parent_id;
        let mut parent = self.fetch(parent_id)?;
        let my_index = parent
            .index_of_child(node.id(), node.index_of_node)
            .ok_or_else(|| Error::invariant("empty node missing from its parent's children"))?;
        parent.set_child_id(my_index, child_id);
        self.repo.update(&parent)?;

        let mut child = self.fetch(child_id)?;
        child.parent_id = parent_id;
        child.index_of_node = my_index as i64;
        self.repo.update(&child)?;

        self.repo.remove(node.id())?;
        Ok(())
    }

    /// `unlink` (`spec.md` §4.3): replace `node`'s child-slot in its parent
    /// with the nil-child sentinel, collapsing the parent's `children_ids`
    /// to empty if every entry is now nil, then remove `node`.
    fn unlink(&mut self, node_id: Id) -> Result<()> {
        let node = self.fetch(node_id)?;
        let parent_id = node.parent_id;
        if parent_id.is_nil() {
            // Root going empty with no children: nothing to unlink from.
            return Ok(());
        }
        let mut parent = self.fetch(parent_id)?;
        let my_index = parent
            .index_of_child(node.id(), node.index_of_node)
            .ok_or_else(|| Error::invariant("node missing from its parent's children"))?;
        parent.set_child_id(my_index, Id::NIL);
        if parent.children_ids().iter().all(|c| c.is_nil()) {
            parent.clear_children();
        }
        self.repo.update(&parent)?;
        self.repo.remove(node_id)?;
        Ok(())
    }

    /// `spec.md` §4.4 `addItemOnNodeWithNilChild`: if `children_ids[index]`
    /// is nil, create a new one-slot child there containing `item`.
    pub fn add_item_on_node_with_nil_child(
        &mut self,
        node_id: Id,
        index: usize,
        id_gen: &mut impl IdGenerator,
        item: Item<K, V>,
    ) -> Result<bool> {
        let mut node = self.fetch(node_id)?;
        if !node.is_child_nil(index) {
            return Ok(false);
        }
        let new_id = id_gen.generate();
        let mut child = Node::new_leaf(new_id, node.id(), node.slot_length());
        child.put_slot(0, item);
        child.set_count(1);
        self.repo.add(&child)?;
        node.set_child_id(index, new_id);
        self.repo.update(&node)?;
        Ok(true)
    }

    /// `spec.md` §4.4 `distributeItemOnNodeWithNilChild`: scan for the
    /// first nil child in `children_ids[0..count]`; if found, create a
    /// one-slot child there; else report `false`.
    pub fn distribute_item_on_node_with_nil_child(
        &mut self,
        node_id: Id,
        id_gen: &mut impl IdGenerator,
        item: Item<K, V>,
    ) -> Result<bool> {
        let node = self.fetch(node_id)?;
        let Some(index) = node.first_nil_child() else {
            return Ok(false);
        };
        self.add_item_on_node_with_nil_child(node_id, index, id_gen, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIdGenerator;
    use crate::node::NaturalOrder;
    use crate::store::StoreDescriptor;
    use crate::tree::Tree;
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
    impl crate::traits::ItemActionTracker<u32, u32> for NoopTracker {
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

    fn fresh_tree() -> Tree<u32, u32, MemRepo, NoopTracker, SequentialIdGenerator, NaturalOrder> {
        let descriptor = StoreDescriptor::new(4, true, false, true).unwrap();
        Tree::new(descriptor, MemRepo::default(), NoopTracker, SequentialIdGenerator::default(), NaturalOrder).unwrap()
    }

    #[test]
    fn root_collapse_after_single_item_removal() {
        let mut tree = fresh_tree();
        // Force a split so the root gets two children, then remove enough
        // to collapse back to a single-leaf root.
        for k in [1, 2, 3, 4, 5] {
            tree.add(k, Some(k)).unwrap();
        }
        assert_eq!(tree.count(), 5);
        for k in [1, 2, 3, 4, 5] {
            assert!(tree.remove(k).unwrap());
        }
        assert_eq!(tree.count(), 0);
        assert!(!tree.first().unwrap());
    }

    #[test]
    fn add_item_on_nil_child_creates_new_leaf() {
        let mut repo = MemRepo::default();
        let mut parent: Node<u32, u32> = Node::new_internal(Id::new(1), Id::NIL, 4);
        parent.put_slot(0, Item::new(Id::new(100), 10u32, Some(10u32)));
        parent.set_count(1);
        repo.add(&parent).unwrap();

        let mut id_gen = SequentialIdGenerator::default();
        let item = Item::new(Id::new(200), 5u32, Some(5u32));
        let mut engine = DeletionEngine::new(&mut repo);
        let created = engine
            .add_item_on_node_with_nil_child(Id::new(1), 0, &mut id_gen, item)
            .unwrap();
        assert!(created);

        let updated_parent = repo.get(Id::new(1)).unwrap().unwrap();
        assert!(!updated_parent.is_child_nil(0));
        let child = repo.get(updated_parent.child_id(0)).unwrap().unwrap();
        assert_eq!(child.slot(0).unwrap().key, 5);
    }

    #[test]
    fn distribute_skips_when_no_nil_child() {
        let mut repo = MemRepo::default();
        let mut parent: Node<u32, u32> = Node::new_internal(Id::new(1), Id::NIL, 4);
        parent.put_slot(0, Item::new(Id::new(100), 10u32, Some(10u32)));
        parent.set_count(1);
        for i in 0..=4 {
            parent.set_child_id(i, Id::new(900 + i as u128));
        }
        repo.add(&parent).unwrap();

        let mut id_gen = SequentialIdGenerator::default();
        let item = Item::new(Id::new(200), 5u32, Some(5u32));
        let mut engine = DeletionEngine::new(&mut repo);
        let created = engine
            .distribute_item_on_node_with_nil_child(Id::new(1), &mut id_gen, item)
            .unwrap();
        assert!(!created);
    }
}
