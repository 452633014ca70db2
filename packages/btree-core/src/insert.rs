//! Descent, leaf insert, leaf load-balancing, full-node split, and the
//! non-recursive promote/distribute controllers (`spec.md` §4.2).

use crate::cursor::CursorPosition;
use crate::error::{Error, Result};
use crate::id::{Id, IdGenerator};
use crate::item::Item;
use crate::node::{KeyComparator, Node};
use crate::store::StoreDescriptor;
use crate::traits::NodeRepository;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Queued continuation of a sibling-rotation chain (`spec.md` §9's
/// `distribute_action`, single-slot). Hop one of a chain always runs
/// synchronously inline; only overflow beyond the immediate sibling is
/// queued here.
struct DistributeAction<K, V> {
    parent_id: Id,
    separator_index: usize,
    side: Side,
    overflow: Item<K, V>,
}

/// Queued continuation of a split/promote chain (`spec.md` §9's
/// `promote_action`).
struct PromoteAction<K, V> {
    target_node_id: Id,
    child_index: usize,
    median: Item<K, V>,
    left_child: Id,
    right_child: Id,
}

/// Drives one `Add`/`AddItem` call: descent, leaf insert, and both
/// reshape controllers. Owns the two single-slot work queues for the
/// duration of the call; neither queue survives past it (`spec.md` §5:
/// "per-tree instance and single-slot", rendered here as per-call and
/// stack-local since a `Tree` has no long-lived engine state to leak).
pub struct InsertionEngine<'a, K, V, R, G, C> {
    pub repo: &'a mut R,
    pub id_gen: &'a mut G,
    pub cmp: &'a C,
    pub descriptor: &'a StoreDescriptor,
    distribute_action: Option<DistributeAction<K, V>>,
    promote_action: Option<PromoteAction<K, V>>,
}

impl<'a, K, V, R, G, C> InsertionEngine<'a, K, V, R, G, C>
where
    K: Clone,
    V: Clone,
    R: NodeRepository<K, V>,
    G: IdGenerator,
    C: KeyComparator<K>,
{
    pub fn new(repo: &'a mut R, id_gen: &'a mut G, cmp: &'a C, descriptor: &'a StoreDescriptor) -> Self {
        Self {
            repo,
            id_gen,
            cmp,
            descriptor,
            distribute_action: None,
            promote_action: None,
        }
    }

    fn fetch(&mut self, id: Id) -> Result<Node<K, V>> {
        self.repo
            .get(id)?
            .ok_or_else(|| Error::invariant(format!("node {id} referenced but missing from repository")))
    }

    /// Descend from `root_id` and insert `item`. On a unique-keyed tree hit,
    /// returns `(false, cursor-on-duplicate)` without mutating anything.
    /// Otherwise inserts and returns `(true, cursor-on-new-item)`, having
    /// populated the reshape queues as needed — callers must follow with
    /// [`Self::drain_distribute`] then [`Self::drain_promote`], in that
    /// order (`spec.md` §9).
    pub fn insert(&mut self, root_id: Id, is_unique: bool, item: Item<K, V>) -> Result<(bool, Option<CursorPosition>)> {
        let mut current = self.fetch(root_id)?;
        loop {
            let found = if is_unique { current.search(&item.key, self.cmp) } else { Err(current.upper_bound(&item.key, self.cmp)) };
            match found {
                Ok(index) => return Ok((false, Some(CursorPosition::new(current.id(), index)))),
                Err(index) => {
                    if current.has_children() {
                        if current.is_child_nil(index) {
                            return self.create_nil_child(current, index, item).map(|pos| (true, Some(pos)));
                        }
                        current = self.fetch(current.child_id(index))?;
                        continue;
                    }
                    return self.insert_into_leaf(current, index, item);
                }
            }
        }
    }

    fn create_nil_child(&mut self, mut parent: Node<K, V>, index: usize, item: Item<K, V>) -> Result<CursorPosition> {
        let new_id = self.id_gen.generate();
        let mut child = Node::new_leaf(new_id, parent.id(), parent.slot_length());
        child.put_slot(0, item);
        child.set_count(1);
        self.repo.add(&child)?;
        parent.set_child_id(index, new_id);
        self.repo.update(&parent)?;
        Ok(CursorPosition::new(new_id, 0))
    }

    fn insert_into_leaf(&mut self, mut node: Node<K, V>, index: usize, item: Item<K, V>) -> Result<(bool, Option<CursorPosition>)> {
        if !node.is_full() {
            node.insert_slot_shifting(index, item);
            node.set_count(node.count() + 1);
            self.repo.update(&node)?;
            return Ok((true, Some(CursorPosition::new(node.id(), index))));
        }
        self.insert_into_full_leaf(node, index, item).map(|pos| (true, Some(pos)))
    }

    fn insert_into_full_leaf(&mut self, node: Node<K, V>, index: usize, item: Item<K, V>) -> Result<CursorPosition> {
        if node.parent_id.is_nil() {
            return self.burst_into_two_children(node, index, item);
        }
        let parent = self.fetch(node.parent_id)?;
        let my_index = parent
            .index_of_child(node.id(), node.index_of_node)
            .ok_or_else(|| Error::invariant("leaf not found among its parent's children"))?;

        if self.descriptor.leaf_load_balancing() {
            match self.scan_for_rebalance(&parent, my_index)? {
                ScanOutcome::Vacancy(Side::Left) => {
                    let sep_index = my_index - 1;
                    return self.push_overflow(parent.id(), sep_index, Side::Left, item);
                }
                ScanOutcome::Vacancy(Side::Right) => {
                    let sep_index = my_index;
                    return self.push_overflow(parent.id(), sep_index, Side::Right, item);
                }
                ScanOutcome::Unbalanced => return self.burst_into_two_children(node, index, item),
                ScanOutcome::NoSiblings => {}
            }
        }
        self.split_leaf_with_promote(node, index, item, parent, my_index)
    }

    /// Scan both directions for a usable sibling vacancy, classifying the
    /// first disqualifying event per side (`spec.md` §4.2 bullet 1).
    fn scan_for_rebalance(&mut self, parent: &Node<K, V>, my_index: usize) -> Result<ScanOutcome> {
        let mut saw_unbalanced = false;
        match self.scan_side(parent, my_index, Side::Left)? {
            SideScan::Vacancy => return Ok(ScanOutcome::Vacancy(Side::Left)),
            SideScan::Unbalanced => saw_unbalanced = true,
            SideScan::Exhausted => {}
        }
        match self.scan_side(parent, my_index, Side::Right)? {
            SideScan::Vacancy => return Ok(ScanOutcome::Vacancy(Side::Right)),
            SideScan::Unbalanced => saw_unbalanced = true,
            SideScan::Exhausted => {}
        }
        Ok(if saw_unbalanced { ScanOutcome::Unbalanced } else { ScanOutcome::NoSiblings })
    }

    fn scan_side(&mut self, parent: &Node<K, V>, my_index: usize, side: Side) -> Result<SideScan> {
        let mut idx = my_index as i64;
        loop {
            idx = match side {
                Side::Left => idx - 1,
                Side::Right => idx + 1,
            };
            if idx < 0 || idx as usize >= parent.children_ids().len() {
                return Ok(SideScan::Exhausted);
            }
            let child_id = parent.child_id(idx as usize);
            if child_id.is_nil() {
                return Ok(SideScan::Vacancy);
            }
            let child = self.fetch(child_id)?;
            if child.has_children() {
                return Ok(SideScan::Unbalanced);
            }
            if !child.is_full() {
                return Ok(SideScan::Vacancy);
            }
        }
    }

    /// Run (or continue) one hop of a sibling-rotation chain: merge
    /// `overflow` into the node at the giver position implied by
    /// `(separator_index, side)`, promote that combined set's boundary item
    /// into the parent separator, and push the old separator value into the
    /// receiver — chaining further if the receiver is itself full. Returns
    /// the resting position of `overflow` itself.
    fn push_overflow(&mut self, parent_id: Id, separator_index: usize, side: Side, overflow: Item<K, V>) -> Result<CursorPosition> {
        let mut parent = self.fetch(parent_id)?;
        let (giver_index, receiver_index) = match side {
            Side::Left => (separator_index + 1, separator_index),
            Side::Right => (separator_index, separator_index + 1),
        };
        let giver_id = parent.child_id(giver_index);
        let mut giver = self.fetch(giver_id)?;

        let mut combined: Vec<Item<K, V>> = giver.occupied().cloned().collect();
        let pos = combined.binary_search_by(|i| self.cmp.compare(&i.key, &overflow.key)).unwrap_or_else(|e| e);
        combined.insert(pos, overflow);

        let (promoted, overflow_rest_index) = match side {
            Side::Left => (combined.remove(0), pos.checked_sub(1)),
            Side::Right => {
                let last = combined.len() - 1;
                let promoted = combined.pop().expect("combined is non-empty");
                (promoted, if pos == last { None } else { Some(pos) })
            }
        };

        let slot_length = giver.slot_length();
        debug_assert_eq!(combined.len(), slot_length);
        let overflow_cursor = match overflow_rest_index {
            None => CursorPosition::new(parent.id(), separator_index),
            Some(local) => CursorPosition::new(giver.id(), local),
        };
        for (i, it) in combined.into_iter().enumerate() {
            giver.put_slot(i, it);
        }
        giver.set_count(slot_length);
        self.repo.update(&giver)?;

        let old_separator = parent.slot(separator_index).cloned().ok_or_else(|| Error::invariant("missing parent separator"))?;
        parent.put_slot(separator_index, promoted);

        let receiver_id = parent.child_id(receiver_index);
        if receiver_id.is_nil() {
            let new_id = self.id_gen.generate();
            let mut new_node = Node::new_leaf(new_id, parent.id(), parent.slot_length());
            new_node.put_slot(0, old_separator);
            new_node.set_count(1);
            self.repo.add(&new_node)?;
            parent.set_child_id(receiver_index, new_id);
            self.repo.update(&parent)?;
            return Ok(overflow_cursor);
        }

        let mut receiver = self.fetch(receiver_id)?;
        if !receiver.is_full() {
            match side {
                Side::Left => {
                    let at = receiver.count();
                    receiver.put_slot(at, old_separator);
                    receiver.set_count(at + 1);
                }
                Side::Right => {
                    receiver.insert_slot_shifting(0, old_separator);
                    receiver.set_count(receiver.count() + 1);
                }
            }
            self.repo.update(&receiver)?;
            self.repo.update(&parent)?;
            return Ok(overflow_cursor);
        }

        self.repo.update(&parent)?;
        let next_separator_index = match side {
            Side::Left => separator_index.checked_sub(1),
            Side::Right => Some(separator_index + 1),
        }
        .ok_or_else(|| Error::invariant("distribute chain ran past the parent's separators"))?;
        self.distribute_action = Some(DistributeAction {
            parent_id: parent.id(),
            separator_index: next_separator_index,
            side,
            overflow: old_separator,
        });
        Ok(overflow_cursor)
    }

    /// Root-or-no-siblings-available overflow: break `node` into two fresh
    /// leaf children of itself, with the median staying in `node` (`spec.md`
    /// §4.2 bullet 2). Used both for the explicitly "unbalanced" case and
    /// for a full root leaf with no parent to promote into.
    fn burst_into_two_children(&mut self, mut node: Node<K, V>, index: usize, item: Item<K, V>) -> Result<CursorPosition> {
        let slot_length = node.slot_length();
        let mut combined: Vec<Item<K, V>> = node.occupied().cloned().collect();
        combined.insert(index, item);
        let median_idx = slot_length / 2;

        let left_items: Vec<_> = combined[0..median_idx].to_vec();
        let median = combined[median_idx].clone();
        let right_items: Vec<_> = combined[median_idx + 1..].to_vec();

        let left_id = self.id_gen.generate();
        let right_id = self.id_gen.generate();
        let mut left = Node::new_leaf(left_id, node.id(), slot_length);
        for (i, it) in left_items.into_iter().enumerate() {
            left.put_slot(i, it);
        }
        left.set_count(median_idx);
        let mut right = Node::new_leaf(right_id, node.id(), slot_length);
        let right_len = right_items.len();
        for (i, it) in right_items.into_iter().enumerate() {
            right.put_slot(i, it);
        }
        right.set_count(right_len);
        self.repo.add(&left)?;
        self.repo.add(&right)?;

        for i in 0..slot_length {
            node.take_slot(i);
        }
        node.put_slot(0, median);
        node.set_count(1);
        node.set_children(vec![Id::NIL; slot_length + 1]);
        node.set_child_id(0, left_id);
        node.set_child_id(1, right_id);
        self.repo.update(&node)?;

        Ok(match index.cmp(&median_idx) {
            std::cmp::Ordering::Equal => CursorPosition::new(node.id(), 0),
            std::cmp::Ordering::Less => CursorPosition::new(left_id, index),
            std::cmp::Ordering::Greater => CursorPosition::new(right_id, index - median_idx - 1),
        })
    }

    /// No sibling vacancy, no unbalance: split `node` into itself (left
    /// half) and a new right sibling, and promote the median into the
    /// parent (`spec.md` §4.2 bullet 3).
    fn split_leaf_with_promote(&mut self, mut node: Node<K, V>, index: usize, item: Item<K, V>, parent: Node<K, V>, my_index: usize) -> Result<CursorPosition> {
        let slot_length = node.slot_length();
        let mut combined: Vec<Item<K, V>> = node.occupied().cloned().collect();
        combined.insert(index, item);
        let median_idx = slot_length / 2;

        let left_items: Vec<_> = combined[0..median_idx].to_vec();
        let median = combined[median_idx].clone();
        let right_items: Vec<_> = combined[median_idx + 1..].to_vec();

        let right_id = self.id_gen.generate();
        let mut right = Node::new_leaf(right_id, node.parent_id, slot_length);
        let right_len = right_items.len();
        for (i, it) in right_items.into_iter().enumerate() {
            right.put_slot(i, it);
        }
        right.set_count(right_len);
        self.repo.add(&right)?;

        for i in 0..slot_length {
            node.take_slot(i);
        }
        for (i, it) in left_items.into_iter().enumerate() {
            node.put_slot(i, it);
        }
        node.set_count(median_idx);
        self.repo.update(&node)?;

        let local_cursor = match index.cmp(&median_idx) {
            std::cmp::Ordering::Less => Some(CursorPosition::new(node.id(), index)),
            std::cmp::Ordering::Greater => Some(CursorPosition::new(right_id, index - median_idx - 1)),
            std::cmp::Ordering::Equal => None,
        };

        let promote_cursor = self.promote(parent.id(), my_index, median, node.id(), right_id)?;
        Ok(local_cursor.unwrap_or(promote_cursor))
    }

    /// Place `median` (with its two flanking children) into `target`.
    /// Returns where `median` itself settles; if `target` is full this may
    /// split `target` again and enqueue a further promote targeting its
    /// parent, in which case `median`'s own resting place is resolved here
    /// before the continuation is queued.
    fn promote(&mut self, target_id: Id, child_index: usize, median: Item<K, V>, left_child: Id, right_child: Id) -> Result<CursorPosition> {
        let mut target = self.fetch(target_id)?;
        if !target.is_full() {
            target.insert_slot_shifting(child_index, median);
            target.set_count(target.count() + 1);
            target.insert_child_shifting(child_index + 1, right_child);
            debug_assert_eq!(target.child_id(child_index), left_child);
            self.repo.update(&target)?;
            return Ok(CursorPosition::new(target.id(), child_index));
        }
        self.promote_into_full(target, child_index, median, left_child, right_child)
    }

    fn promote_into_full(&mut self, mut target: Node<K, V>, child_index: usize, median: Item<K, V>, left_child: Id, right_child: Id) -> Result<CursorPosition> {
        let slot_length = target.slot_length();
        let mut slots: Vec<Item<K, V>> = target.occupied().cloned().collect();
        slots.insert(child_index, median);
        let mut children: Vec<Id> = target.children_ids().to_vec();
        children.insert(child_index + 1, right_child);
        debug_assert_eq!(children[child_index], left_child);

        let median_idx = slot_length / 2;
        let promoted_median = slots[median_idx].clone();
        let left_slots: Vec<_> = slots[0..median_idx].to_vec();
        let right_slots: Vec<_> = slots[median_idx + 1..].to_vec();
        let left_children: Vec<_> = children[0..=median_idx].to_vec();
        let right_children: Vec<_> = children[median_idx + 1..].to_vec();

        let resting = match child_index.cmp(&median_idx) {
            std::cmp::Ordering::Less => Resting::Left(child_index),
            std::cmp::Ordering::Greater => Resting::Right(child_index - median_idx - 1),
            std::cmp::Ordering::Equal => Resting::IsMedian,
        };

        if target.is_root() {
            let new_left_id = self.id_gen.generate();
            let new_right_id = self.id_gen.generate();
            let mut new_left = Node::new_internal(new_left_id, target.id(), slot_length);
            let left_len = left_slots.len();
            for (i, it) in left_slots.into_iter().enumerate() {
                new_left.put_slot(i, it);
            }
            new_left.set_count(left_len);
            let mut padded = left_children;
            padded.resize(slot_length + 1, Id::NIL);
            new_left.set_children(padded);

            let mut new_right = Node::new_internal(new_right_id, target.id(), slot_length);
            let right_len = right_slots.len();
            for (i, it) in right_slots.into_iter().enumerate() {
                new_right.put_slot(i, it);
            }
            new_right.set_count(right_len);
            let mut padded = right_children;
            padded.resize(slot_length + 1, Id::NIL);
            new_right.set_children(padded);

            self.reparent_children(&new_left)?;
            self.reparent_children(&new_right)?;
            self.repo.add(&new_left)?;
            self.repo.add(&new_right)?;

            for i in 0..slot_length {
                target.take_slot(i);
            }
            target.put_slot(0, promoted_median);
            target.set_count(1);
            target.set_children(vec![Id::NIL; slot_length + 1]);
            target.set_child_id(0, new_left_id);
            target.set_child_id(1, new_right_id);
            self.repo.update(&target)?;

            return Ok(match resting {
                Resting::IsMedian => CursorPosition::new(target.id(), 0),
                Resting::Left(i) => CursorPosition::new(new_left_id, i),
                Resting::Right(i) => CursorPosition::new(new_right_id, i),
            });
        }

        let new_right_id = self.id_gen.generate();
        let mut new_right = Node::new_internal(new_right_id, target.parent_id, slot_length);
        let right_len = right_slots.len();
        for (i, it) in right_slots.into_iter().enumerate() {
            new_right.put_slot(i, it);
        }
        new_right.set_count(right_len);
        let mut padded = right_children;
        padded.resize(slot_length + 1, Id::NIL);
        new_right.set_children(padded);
        self.reparent_children(&new_right)?;
        self.repo.add(&new_right)?;

        for i in 0..slot_length {
            target.take_slot(i);
        }
        let left_len = left_slots.len();
        for (i, it) in left_slots.into_iter().enumerate() {
            target.put_slot(i, it);
        }
        target.set_count(left_len);
        let mut padded = left_children;
        padded.resize(slot_length + 1, Id::NIL);
        target.set_children(padded);
        self.repo.update(&target)?;

        let resting_cursor = match resting {
            Resting::Left(i) => CursorPosition::new(target.id(), i),
            Resting::Right(i) => CursorPosition::new(new_right_id, i),
            Resting::IsMedian => CursorPosition::new(target.id(), 0), // placeholder, overwritten below
        };

        let grandparent_id = target.parent_id;
        if grandparent_id.is_nil() {
            return Err(Error::invariant("non-root node has nil parent during promote"));
        }
        let grandparent = self.fetch(grandparent_id)?;
        let idx_in_grandparent = grandparent
            .index_of_child(target.id(), target.index_of_node)
            .ok_or_else(|| Error::invariant("split node missing from its parent's children"))?;

        if matches!(resting, Resting::IsMedian) {
            return self.promote(grandparent_id, idx_in_grandparent, promoted_median, target.id(), new_right_id);
        }
        self.promote_action = Some(PromoteAction {
            target_node_id: grandparent_id,
            child_index: idx_in_grandparent,
            median: promoted_median,
            left_child: target.id(),
            right_child: new_right_id,
        });
        Ok(resting_cursor)
    }

    fn reparent_children(&mut self, node: &Node<K, V>) -> Result<()> {
        if !node.has_children() {
            return Ok(());
        }
        for i in 0..=node.count() {
            let child_id = node.child_id(i);
            if child_id.is_nil() {
                continue;
            }
            let mut child = self.fetch(child_id)?;
            child.parent_id = node.id();
            child.index_of_node = i as i64;
            self.repo.update(&child)?;
        }
        Ok(())
    }

    /// Drain any queued sibling-rotation continuation. Must run before
    /// [`Self::drain_promote`] (`spec.md` §9: "Keep this order: distribute
    /// may alter parent separators that promote later reads").
    pub fn drain_distribute(&mut self) -> Result<()> {
        while let Some(action) = self.distribute_action.take() {
            self.push_overflow(action.parent_id, action.separator_index, action.side, action.overflow)?;
        }
        Ok(())
    }

    /// Drain any queued split/promote continuation.
    pub fn drain_promote(&mut self) -> Result<()> {
        while let Some(action) = self.promote_action.take() {
            self.promote(action.target_node_id, action.child_index, action.median, action.left_child, action.right_child)?;
        }
        Ok(())
    }
}

enum ScanOutcome {
    Vacancy(Side),
    Unbalanced,
    NoSiblings,
}

enum SideScan {
    Vacancy,
    Unbalanced,
    Exhausted,
}

enum Resting {
    Left(usize),
    Right(usize),
    IsMedian,
}
