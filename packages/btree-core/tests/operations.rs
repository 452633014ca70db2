//! Concrete scenarios exercising named reshape/traversal/deletion paths,
//! each built either through the public `Tree` facade or, where a specific
//! starting topology must be pinned down by hand, directly against `Node`
//! and the engine types (`InsertionEngine`, `DeletionEngine`, `cursor`).
//!
//! Scenarios 2, 4, 5 and 6 construct their own tree shape node-by-node
//! because `Tree`'s public surface has no way to seed a prebuilt root: any
//! mutating call first runs `ensure_root`, which would silently replace a
//! hand-built root with a fresh empty one.

use btree_core::cursor::{self, CursorPosition};
use btree_core::delete::DeletionEngine;
use btree_core::insert::InsertionEngine;
use btree_core::{Id, Item, NaturalOrder, Node, SequentialIdGenerator, StoreDescriptor, Tree};
use btree_test_support::{MemoryNodeRepository, RecordingItemActionTracker};

fn item(key: u32) -> Item<u32, u32> {
    Item::new(Id::new(key as u128), key, Some(key))
}

type TestTree = Tree<u32, u32, MemoryNodeRepository<u32, u32>, RecordingItemActionTracker<u32, u32>, SequentialIdGenerator, NaturalOrder>;

fn fresh_tree(slot_length: usize, leaf_load_balancing: bool) -> TestTree {
    let descriptor = StoreDescriptor::new(slot_length, true, leaf_load_balancing, true).unwrap();
    Tree::new(
        descriptor,
        MemoryNodeRepository::new(),
        RecordingItemActionTracker::new(),
        SequentialIdGenerator::default(),
        NaturalOrder,
    )
    .unwrap()
}

/// Scenario 1: load 25 keys (0, 5, .. 120) into a slot-length-4 tree, then
/// enumerate forward via `First`/`Next` and confirm all 25 come back in
/// ascending order.
#[test]
fn load_then_traversal_enumerates_ascending() {
    let mut tree = fresh_tree(4, true);
    let keys: Vec<u32> = (0..25).map(|i| i * 5).collect();
    for &k in &keys {
        assert!(tree.add(k, Some(k)).unwrap());
    }
    assert_eq!(tree.count(), 25);

    let mut seen = Vec::new();
    assert!(tree.first().unwrap());
    seen.push(tree.get_current_key().unwrap().unwrap());
    while tree.next().unwrap() {
        seen.push(tree.get_current_key().unwrap().unwrap());
    }
    assert_eq!(seen, keys);
}

/// Scenario 2: a parent with a full left leaf, a full middle leaf (the
/// insertion target), and an empty right leaf. With leaf-load-balancing on,
/// `scan_for_rebalance` finds the left sibling full (no vacancy, not
/// unbalanced) and the right sibling empty (a vacancy), so the overflow
/// rotates right through the parent separator: the new key settles into the
/// parent as its new second separator, and the displaced old separator
/// drops down into the right leaf. Neither full sibling's own contents
/// change — the middle leaf keeps its four original items.
#[test]
fn full_middle_leaf_distributes_overflow_through_right_vacancy() {
    let mut repo: MemoryNodeRepository<u32, u32> = MemoryNodeRepository::new();
    let mut id_gen = SequentialIdGenerator::default();
    let cmp = NaturalOrder;
    let descriptor = StoreDescriptor::new(4, true, true, true).unwrap();

    let parent_id = Id::new(1);
    let left_id = Id::new(2);
    let mid_id = Id::new(3);
    let right_id = Id::new(4);

    let mut parent: Node<u32, u32> = Node::new_internal(parent_id, Id::NIL, 4);
    parent.put_slot(0, item(15));
    parent.put_slot(1, item(35));
    parent.set_count(2);
    parent.set_child_id(0, left_id);
    parent.set_child_id(1, mid_id);
    parent.set_child_id(2, right_id);
    repo.add(&parent).unwrap();

    let mut left: Node<u32, u32> = Node::new_leaf(left_id, parent_id, 4);
    for (i, k) in [1, 2, 3, 4].into_iter().enumerate() {
        left.put_slot(i, item(k));
    }
    left.set_count(4);
    left.index_of_node = 0;
    repo.add(&left).unwrap();

    let mut mid: Node<u32, u32> = Node::new_leaf(mid_id, parent_id, 4);
    for (i, k) in [10, 11, 12, 13].into_iter().enumerate() {
        mid.put_slot(i, item(k));
    }
    mid.set_count(4);
    mid.index_of_node = 1;
    repo.add(&mid).unwrap();

    let right: Node<u32, u32> = Node::new_leaf(right_id, parent_id, 4);
    repo.add(&right).unwrap();

    let mut engine = InsertionEngine::new(&mut repo, &mut id_gen, &cmp, &descriptor);
    let (inserted, _) = engine.insert(parent_id, true, item(16)).unwrap();
    engine.drain_distribute().unwrap();
    engine.drain_promote().unwrap();
    assert!(inserted);

    let parent = repo.get(parent_id).unwrap().unwrap();
    let parent_keys: Vec<_> = parent.occupied().map(|i| i.key).collect();
    assert_eq!(parent_keys, vec![15, 16]);

    let mid = repo.get(mid_id).unwrap().unwrap();
    let mid_keys: Vec<_> = mid.occupied().map(|i| i.key).collect();
    assert_eq!(mid_keys, vec![10, 11, 12, 13]);

    let right = repo.get(right_id).unwrap().unwrap();
    let right_keys: Vec<_> = right.occupied().map(|i| i.key).collect();
    assert_eq!(right_keys, vec![35]);
}

/// Scenario 3: a full leaf with no usable sibling vacancy (load balancing
/// off) splits in place. The left half stays under the original id, a new
/// right sibling is created, and the median is promoted into the parent
/// separator array.
#[test]
fn full_leaf_with_no_balancing_splits_and_promotes_median() {
    let mut repo: MemoryNodeRepository<u32, u32> = MemoryNodeRepository::new();
    let mut id_gen = SequentialIdGenerator::default();
    let cmp = NaturalOrder;
    let descriptor = StoreDescriptor::new(4, true, false, true).unwrap();

    let parent_id = Id::new(1);
    let left_id = Id::new(2);
    let mid_id = Id::new(3);

    let mut parent: Node<u32, u32> = Node::new_internal(parent_id, Id::NIL, 4);
    parent.put_slot(0, item(9));
    parent.set_count(1);
    parent.set_child_id(0, left_id);
    parent.set_child_id(1, mid_id);
    repo.add(&parent).unwrap();

    let mut left: Node<u32, u32> = Node::new_leaf(left_id, parent_id, 4);
    for (i, k) in [1, 2].into_iter().enumerate() {
        left.put_slot(i, item(k));
    }
    left.set_count(2);
    left.index_of_node = 0;
    repo.add(&left).unwrap();

    let mut mid: Node<u32, u32> = Node::new_leaf(mid_id, parent_id, 4);
    for (i, k) in [10, 20, 30, 40].into_iter().enumerate() {
        mid.put_slot(i, item(k));
    }
    mid.set_count(4);
    mid.index_of_node = 1;
    repo.add(&mid).unwrap();

    let mut engine = InsertionEngine::new(&mut repo, &mut id_gen, &cmp, &descriptor);
    let (inserted, _) = engine.insert(parent_id, true, item(25)).unwrap();
    engine.drain_distribute().unwrap();
    engine.drain_promote().unwrap();
    assert!(inserted);

    let parent = repo.get(parent_id).unwrap().unwrap();
    let parent_keys: Vec<_> = parent.occupied().map(|i| i.key).collect();
    assert_eq!(parent_keys, vec![9, 25]);

    let mid = repo.get(mid_id).unwrap().unwrap();
    let mid_keys: Vec<_> = mid.occupied().map(|i| i.key).collect();
    assert_eq!(mid_keys, vec![10, 20]);

    // New right sibling lands at the parent's child index 2.
    let new_right_id = parent.child_id(2);
    assert!(!new_right_id.is_nil());
    let new_right = repo.get(new_right_id).unwrap().unwrap();
    let right_keys: Vec<_> = new_right.occupied().map(|i| i.key).collect();
    assert_eq!(right_keys, vec![30, 40]);
}

/// Scenario 4: a root with a nil middle child. `Next` from the first
/// separator ascends straight to the second separator without descending
/// anywhere — `is_child_nil` short-circuits the walk.
#[test]
fn next_ascends_past_a_nil_child_without_descending() {
    let mut repo: MemoryNodeRepository<u32, u32> = MemoryNodeRepository::new();
    let root_id = Id::new(1);
    let mut root: Node<u32, u32> = Node::new_internal(root_id, Id::NIL, 4);
    root.put_slot(0, item(10));
    root.put_slot(1, item(20));
    root.set_count(2);
    root.set_child_id(0, Id::new(2));
    root.set_child_id(2, Id::new(3));
    repo.add(&root).unwrap();

    let next = cursor::move_to_next(&mut repo, CursorPosition::new(root_id, 0)).unwrap().unwrap();
    assert_eq!(next.node_id, root_id);
    assert_eq!(next.index, 1);
}

/// Scenario 5: a root with one item and two children, the right of which is
/// nil. Removing the root's sole item collapses the left child's contents
/// up into the root and removes the child from the repository.
#[test]
fn removing_roots_sole_item_collapses_its_left_child_upward() {
    let mut repo: MemoryNodeRepository<u32, u32> = MemoryNodeRepository::new();
    let root_id = Id::new(1);
    let left_id = Id::new(2);

    let mut root: Node<u32, u32> = Node::new_internal(root_id, Id::NIL, 4);
    root.put_slot(0, item(10));
    root.set_count(1);
    root.set_child_id(0, left_id);
    repo.add(&root).unwrap();

    let mut left: Node<u32, u32> = Node::new_leaf(left_id, root_id, 4);
    left.put_slot(0, item(5));
    left.put_slot(1, item(15));
    left.set_count(2);
    left.index_of_node = 0;
    repo.add(&left).unwrap();

    let mut engine = DeletionEngine::new(&mut repo);
    let removed = engine.remove_current_item(CursorPosition::new(root_id, 0)).unwrap();
    assert_eq!(removed.map(|i| i.key), Some(10));

    let root = repo.get(root_id).unwrap().unwrap();
    let root_keys: Vec<_> = root.occupied().map(|i| i.key).collect();
    assert_eq!(root_keys, vec![5, 15]);
    assert!(!root.has_children());
    assert!(repo.get(left_id).unwrap().is_none());
}

/// Scenario 6: a root separator with two non-nil children on removal swaps
/// in its in-order successor (the leftmost item of the subtree immediately
/// to the separator's right) and compacts that leaf afterwards.
#[test]
fn removing_an_internal_separator_swaps_in_its_successor() {
    let mut repo: MemoryNodeRepository<u32, u32> = MemoryNodeRepository::new();
    let root_id = Id::new(1);
    let left_id = Id::new(2);
    let successor_leaf_id = Id::new(3);
    let right_id = Id::new(4);

    let mut root: Node<u32, u32> = Node::new_internal(root_id, Id::NIL, 4);
    root.put_slot(0, item(50));
    root.put_slot(1, item(100));
    root.set_count(2);
    root.set_child_id(0, left_id);
    root.set_child_id(1, successor_leaf_id);
    root.set_child_id(2, right_id);
    repo.add(&root).unwrap();

    let mut left: Node<u32, u32> = Node::new_leaf(left_id, root_id, 4);
    left.put_slot(0, item(10));
    left.put_slot(1, item(20));
    left.set_count(2);
    left.index_of_node = 0;
    repo.add(&left).unwrap();

    let mut successor_leaf: Node<u32, u32> = Node::new_leaf(successor_leaf_id, root_id, 4);
    successor_leaf.put_slot(0, item(60));
    successor_leaf.put_slot(1, item(70));
    successor_leaf.set_count(2);
    successor_leaf.index_of_node = 1;
    repo.add(&successor_leaf).unwrap();

    let mut right: Node<u32, u32> = Node::new_leaf(right_id, root_id, 4);
    right.put_slot(0, item(110));
    right.put_slot(1, item(120));
    right.set_count(2);
    right.index_of_node = 2;
    repo.add(&right).unwrap();

    let mut engine = DeletionEngine::new(&mut repo);
    let removed = engine.remove_current_item(CursorPosition::new(root_id, 0)).unwrap();
    // The item actually vacated from a slot is the successor (60), moved up
    // into the root — not the original root item (50).
    assert_eq!(removed.map(|i| i.key), Some(60));

    let root = repo.get(root_id).unwrap().unwrap();
    assert_eq!(root.slot(0).unwrap().key, 60);
    assert_eq!(root.slot(1).unwrap().key, 100);

    let successor_leaf = repo.get(successor_leaf_id).unwrap().unwrap();
    let successor_keys: Vec<_> = successor_leaf.occupied().map(|i| i.key).collect();
    assert_eq!(successor_keys, vec![70]);

    let left = repo.get(left_id).unwrap().unwrap();
    let left_keys: Vec<_> = left.occupied().map(|i| i.key).collect();
    assert_eq!(left_keys, vec![10, 20]);
}
