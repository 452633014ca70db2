use crate::error::{Error, Result};
use crate::id::Id;
use crate::node::Node;
use crate::traits::NodeRepository;

/// The "(node-id, slot-index) pair" maintained by the tree for iteration and
/// in-place mutation (`spec.md` glossary, "current item / cursor").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorPosition {
    pub node_id: Id,
    pub index: usize,
}

impl CursorPosition {
    pub fn new(node_id: Id, index: usize) -> Self {
        Self { node_id, index }
    }
}

fn fetch<K, V, R: NodeRepository<K, V>>(repo: &mut R, id: Id) -> Result<Node<K, V>> {
    repo.get(id)?.ok_or_else(|| Error::invariant(format!("node {id} referenced but missing from repository")))
}

/// Position of `child` within `parent.children_ids`, using `child`'s cached
/// `index_of_node` as a hint.
fn index_in_parent<K, V>(child: &Node<K, V>, parent: &Node<K, V>) -> Result<usize> {
    parent
        .index_of_child(child.id(), child.index_of_node)
        .ok_or_else(|| Error::invariant(format!("node {} not found among its parent's children", child.id())))
}

/// Descend via `children_ids[0]`, stopping at a node with no children or at
/// a nil child; select index 0 of the landing node (`spec.md` §4.5).
pub fn move_to_first<K, V, R: NodeRepository<K, V>>(repo: &mut R, root_id: Id) -> Result<Option<CursorPosition>> {
    if root_id.is_nil() {
        return Ok(None);
    }
    let mut node = fetch(repo, root_id)?;
    loop {
        if !node.has_children() || node.is_child_nil(0) {
            break;
        }
        node = fetch(repo, node.child_id(0))?;
    }
    if node.count() == 0 {
        return Ok(None);
    }
    Ok(Some(CursorPosition::new(node.id(), 0)))
}

/// Descend via `children_ids[count]`, stopping at a node with no children
/// or at a nil child; select index `count - 1` of the landing node
/// (`spec.md` §4.5).
pub fn move_to_last<K, V, R: NodeRepository<K, V>>(repo: &mut R, root_id: Id) -> Result<Option<CursorPosition>> {
    if root_id.is_nil() {
        return Ok(None);
    }
    let mut node = fetch(repo, root_id)?;
    loop {
        if !node.has_children() {
            break;
        }
        let rightmost = node.count();
        if node.is_child_nil(rightmost) {
            break;
        }
        node = fetch(repo, node.child_id(rightmost))?;
    }
    if node.count() == 0 {
        return Ok(None);
    }
    Ok(Some(CursorPosition::new(node.id(), node.count() - 1)))
}

/// Ascend while the right neighbor at `slot_index` doesn't exist yet;
/// selects it as soon as `slot_index < node.count()`, or clears the cursor
/// at the root (`goRightUpItemOnNodeWithNilChild`, `spec.md` §4.5).
fn ascend_right<K, V, R: NodeRepository<K, V>>(repo: &mut R, mut node: Node<K, V>, mut slot_index: usize) -> Result<Option<CursorPosition>> {
    loop {
        if slot_index < node.count() {
            return Ok(Some(CursorPosition::new(node.id(), slot_index)));
        }
        if node.is_root() {
            return Ok(None);
        }
        let parent = fetch(repo, node.parent_id)?;
        slot_index = index_in_parent(&node, &parent)?;
        node = parent;
    }
}

/// Symmetric counterpart of [`ascend_right`] (`goLeftUpItemOnNodeWithNilChild`).
fn ascend_left<K, V, R: NodeRepository<K, V>>(repo: &mut R, mut node: Node<K, V>, mut slot_index: usize) -> Result<Option<CursorPosition>> {
    loop {
        if slot_index >= 1 {
            return Ok(Some(CursorPosition::new(node.id(), slot_index - 1)));
        }
        if node.is_root() {
            return Ok(None);
        }
        let parent = fetch(repo, node.parent_id)?;
        slot_index = index_in_parent(&node, &parent)?;
        node = parent;
    }
}

/// `spec.md` §4.5 `moveToNext`.
pub fn move_to_next<K, V, R: NodeRepository<K, V>>(repo: &mut R, pos: CursorPosition) -> Result<Option<CursorPosition>> {
    let node = fetch(repo, pos.node_id)?;
    if !node.has_children() {
        return ascend_right(repo, node, pos.index + 1);
    }
    let mut node = node;
    let mut slot_index = pos.index + 1;
    loop {
        if node.is_child_nil(slot_index) {
            return ascend_right(repo, node, slot_index);
        }
        node = fetch(repo, node.child_id(slot_index))?;
        slot_index = 0;
        if !node.has_children() {
            return Ok(Some(CursorPosition::new(node.id(), 0)));
        }
    }
}

/// `spec.md` §4.5 `moveToPrevious`.
pub fn move_to_previous<K, V, R: NodeRepository<K, V>>(repo: &mut R, pos: CursorPosition) -> Result<Option<CursorPosition>> {
    let node = fetch(repo, pos.node_id)?;
    if !node.has_children() {
        return ascend_left(repo, node, pos.index);
    }
    let mut node = node;
    let mut slot_index = pos.index;
    loop {
        if node.is_child_nil(slot_index) {
            return ascend_left(repo, node, slot_index);
        }
        node = fetch(repo, node.child_id(slot_index))?;
        slot_index = node.count();
        if !node.has_children() {
            return Ok(Some(CursorPosition::new(node.id(), node.count() - 1)));
        }
    }
}

/// `spec.md` §4.5 `find`: binary-search for the first slot ≥ `key` at each
/// node, descending into the matching child subtree when `first_item_with_key`
/// requests the leftmost duplicate. On a final miss, leave the cursor near
/// the miss (greatest key less than `key`, or one `Next` past it) so callers
/// can scan outward.
pub fn find<K, V, R, C>(repo: &mut R, root_id: Id, key: &K, first_item_with_key: bool, cmp: &C) -> Result<Option<CursorPosition>>
where
    R: NodeRepository<K, V>,
    C: crate::node::KeyComparator<K>,
{
    if root_id.is_nil() {
        return Ok(None);
    }
    let mut node = fetch(repo, root_id)?;
    let mut best_miss: Option<CursorPosition> = None;
    loop {
        match node.search(key, cmp) {
            Ok(index) => {
                if !first_item_with_key {
                    return Ok(Some(CursorPosition::new(node.id(), index)));
                }
                if !node.has_children() || node.is_child_nil(index) {
                    return Ok(Some(CursorPosition::new(node.id(), index)));
                }
                node = fetch(repo, node.child_id(index))?;
                continue;
            }
            Err(index) => {
                if index > 0 {
                    best_miss = Some(CursorPosition::new(node.id(), index - 1));
                }
                if !node.has_children() || node.is_child_nil(index) {
                    break;
                }
                node = fetch(repo, node.child_id(index))?;
            }
        }
    }
    match best_miss {
        Some(pos) => Ok(Some(pos)),
        None => Ok(None),
    }
}
