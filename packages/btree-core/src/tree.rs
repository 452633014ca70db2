//! The public tree facade (`spec.md` §4.1): every operation enters here,
//! which fetches/creates the root then drives the insertion, deletion, and
//! cursor engines. Collaborator (repository/tracker) failures bubble up
//! unchanged; the tree's own state — `count` and the cursor — is mutated
//! only on success.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::cursor::{self, CursorPosition};
use crate::delete::DeletionEngine;
use crate::error::{Error, Result};
use crate::id::{Id, IdGenerator};
use crate::insert::InsertionEngine;
use crate::item::Item;
use crate::node::{KeyComparator, Node};
use crate::store::StoreDescriptor;
use crate::traits::{ItemActionTracker, NodeRepository};

/// The tree facade. `K`/`V` are the key/value types; `R`/`T`/`G`/`C` are the
/// injected `NodeRepository`, `ItemActionTracker`, identifier generator, and
/// key comparator collaborators (`spec.md` §2 items 4–6, §6).
pub struct Tree<K, V, R, T, G, C> {
    descriptor: StoreDescriptor,
    repo: R,
    tracker: T,
    id_gen: G,
    cmp: C,
    cursor: Option<CursorPosition>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, R, T, G, C> Tree<K, V, R, T, G, C>
where
    K: Clone,
    V: Clone,
    R: NodeRepository<K, V>,
    T: ItemActionTracker<K, V>,
    G: IdGenerator,
    C: KeyComparator<K>,
{
    /// Construct a tree over an already-validated [`StoreDescriptor`]
    /// (`spec.md` §4.1). Returns `Result` for parity with the spec's
    /// "validates the descriptor and collaborators are non-null up front" —
    /// there is currently no failure case once the descriptor is valid,
    /// since Rust's ownership rules mean the collaborators can't be null.
    pub fn new(descriptor: StoreDescriptor, repo: R, tracker: T, id_gen: G, cmp: C) -> Result<Self> {
        Ok(Self {
            descriptor,
            repo,
            tracker,
            id_gen,
            cmp,
            cursor: None,
            _marker: PhantomData,
        })
    }

    fn fetch(&mut self, id: Id) -> Result<Node<K, V>> {
        self.repo
            .get(id)?
            .ok_or_else(|| Error::invariant(format!("node {id} referenced but missing from repository")))
    }

    fn ensure_root(&mut self) -> Result<Id> {
        if self.descriptor.root_node_id().is_nil() {
            let id = self.id_gen.generate();
            let node: Node<K, V> = Node::new_leaf(id, Id::NIL, self.descriptor.slot_length());
            self.repo.add(&node)?;
            self.descriptor.set_root_node_id(id);
        }
        Ok(self.descriptor.root_node_id())
    }

    /// `spec.md` §4.1 `Add`.
    pub fn add(&mut self, key: K, value: Option<V>) -> Result<bool> {
        let id = self.id_gen.generate();
        self.add_item(Item::new(id, key, value))
    }

    /// `spec.md` §4.1 `AddIfNotExist`: forces uniqueness for this call only.
    pub fn add_if_not_exist(&mut self, key: K, value: Option<V>) -> Result<bool> {
        let id = self.id_gen.generate();
        self.insert_item(Item::new(id, key, value), true)
    }

    /// `spec.md` §4.1 `AddItem`: preserves the caller-supplied item's id.
    pub fn add_item(&mut self, item: Item<K, V>) -> Result<bool> {
        let is_unique = self.descriptor.is_unique();
        self.insert_item(item, is_unique)
    }

    fn insert_item(&mut self, item: Item<K, V>, is_unique: bool) -> Result<bool> {
        let root_id = self.ensure_root()?;
        let (inserted, cursor) = {
            let mut engine = InsertionEngine::new(&mut self.repo, &mut self.id_gen, &self.cmp, &self.descriptor);
            let outcome = engine.insert(root_id, is_unique, item.clone())?;
            engine.drain_distribute()?;
            engine.drain_promote()?;
            outcome
        };
        self.cursor = cursor;
        if inserted {
            self.tracker.add(&item)?;
            self.descriptor.adjust_count(1);
        }
        Ok(inserted)
    }

    /// `spec.md` §4.1 `Upsert`: if the key exists, behaves as `Update`;
    /// else as `Add`. Returns `true` when a new item was inserted, `false`
    /// when an existing one was updated in place.
    pub fn upsert(&mut self, key: K, value: Option<V>) -> Result<bool> {
        if self.find(key.clone(), false)? {
            self.update_current_item(value)?;
            Ok(false)
        } else {
            self.add(key, value)
        }
    }

    /// `spec.md` §4.1 `Update`.
    pub fn update(&mut self, key: K, value: Option<V>) -> Result<bool> {
        if !self.find(key, false)? {
            return Ok(false);
        }
        self.update_current_item(value)
    }

    /// `spec.md` §4.1 `UpdateCurrentItem`: replaces the value in place,
    /// never the key — this operation never reorders.
    pub fn update_current_item(&mut self, value: Option<V>) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let mut node = self.fetch(pos.node_id)?;
        if node.slot(pos.index).is_none() {
            return Ok(false);
        }
        node.slot_mut(pos.index).expect("checked above").set_value(value);
        let snapshot = node.slot(pos.index).expect("checked above").clone();
        self.repo.update(&node)?;
        self.tracker.update(&snapshot)?;
        Ok(true)
    }

    /// `spec.md` §4.1 `UpdateCurrentKey`: permitted only when the new key's
    /// position equals the current position under the comparator.
    pub fn update_current_key(&mut self, key: K) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let node = self.fetch(pos.node_id)?;
        if node.slot(pos.index).is_none() {
            return Ok(false);
        }
        if !self.key_position_holds(&node, pos.index, &key) {
            return Ok(false);
        }
        let mut node = node;
        node.slot_mut(pos.index).expect("checked above").key = key;
        let snapshot = node.slot(pos.index).expect("checked above").clone();
        self.repo.update(&node)?;
        self.tracker.update(&snapshot)?;
        Ok(true)
    }

    /// `spec.md` §4.1 `UpdateCurrentNodeItem`: same ordering-position
    /// guard as `UpdateCurrentKey`, but replaces both key and value.
    pub fn update_current_node_item(&mut self, key: K, value: Option<V>) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let node = self.fetch(pos.node_id)?;
        if node.slot(pos.index).is_none() {
            return Ok(false);
        }
        if !self.key_position_holds(&node, pos.index, &key) {
            return Ok(false);
        }
        let mut node = node;
        {
            let slot = node.slot_mut(pos.index).expect("checked above");
            slot.key = key;
            slot.set_value(value);
        }
        let snapshot = node.slot(pos.index).expect("checked above").clone();
        self.repo.update(&node)?;
        self.tracker.update(&snapshot)?;
        Ok(true)
    }

    /// A replacement key at `index` is only accepted if it keeps `node`'s
    /// slots ordered relative to their immediate neighbors (`spec.md` §4.1:
    /// "does not violate ordering" — resolved, per `DESIGN.md`, as a local
    /// neighbor check rather than a full subtree re-validation).
    fn key_position_holds(&self, node: &Node<K, V>, index: usize, key: &K) -> bool {
        if index > 0 {
            if let Some(prev) = node.slot(index - 1) {
                if self.cmp.compare(&prev.key, key) != Ordering::Less {
                    return false;
                }
            }
        }
        if let Some(next) = node.slot(index + 1) {
            if self.cmp.compare(key, &next.key) != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// `spec.md` §4.1 `Remove`.
    pub fn remove(&mut self, key: K) -> Result<bool> {
        if !self.find(key, false)? {
            return Ok(false);
        }
        self.remove_current_item()
    }

    /// `spec.md` §4.1 `RemoveCurrentItem`.
    pub fn remove_current_item(&mut self) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let node = self.fetch(pos.node_id)?;
        if node.slot(pos.index).is_none() {
            return Ok(false);
        }
        let removed = {
            let mut engine = DeletionEngine::new(&mut self.repo);
            engine.remove_current_item(pos)?
        };
        self.cursor = None;
        match removed {
            Some(item) => {
                self.tracker.remove(&item)?;
                self.descriptor.adjust_count(-1);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// `spec.md` §4.1 `Find`.
    pub fn find(&mut self, key: K, first_item_with_key: bool) -> Result<bool> {
        let root_id = self.descriptor.root_node_id();
        let pos = cursor::find(&mut self.repo, root_id, &key, first_item_with_key, &self.cmp)?;
        let hit = match pos {
            Some(p) => {
                let node = self.fetch(p.node_id)?;
                node.slot(p.index).map(|item| self.cmp.compare(&item.key, &key) == Ordering::Equal).unwrap_or(false)
            }
            None => false,
        };
        self.cursor = pos;
        Ok(hit)
    }

    /// `spec.md` §4.1 `FindWithID`.
    pub fn find_with_id(&mut self, key: K, id: Id) -> Result<bool> {
        if !self.find(key.clone(), true)? {
            return Ok(false);
        }
        loop {
            let pos = self.cursor.expect("find_with_id: find just succeeded");
            let node = self.fetch(pos.node_id)?;
            let item = node.slot(pos.index).ok_or_else(|| Error::invariant("cursor points at an empty slot"))?;
            if item.id() == id {
                return Ok(true);
            }
            if self.cmp.compare(&item.key, &key) != Ordering::Equal {
                return Ok(false);
            }
            if !self.next()? {
                return Ok(false);
            }
        }
    }

    /// `spec.md` §4.1 `First`.
    pub fn first(&mut self) -> Result<bool> {
        let root_id = self.descriptor.root_node_id();
        let pos = cursor::move_to_first(&mut self.repo, root_id)?;
        self.cursor = pos;
        Ok(pos.is_some())
    }

    /// `spec.md` §4.1 `Last`.
    pub fn last(&mut self) -> Result<bool> {
        let root_id = self.descriptor.root_node_id();
        let pos = cursor::move_to_last(&mut self.repo, root_id)?;
        self.cursor = pos;
        Ok(pos.is_some())
    }

    /// `spec.md` §4.5 `moveToNext`.
    pub fn next(&mut self) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let next = cursor::move_to_next(&mut self.repo, pos)?;
        self.cursor = next;
        Ok(next.is_some())
    }

    /// `spec.md` §4.5 `moveToPrevious`.
    pub fn previous(&mut self) -> Result<bool> {
        let Some(pos) = self.cursor else { return Ok(false) };
        let prev = cursor::move_to_previous(&mut self.repo, pos)?;
        self.cursor = prev;
        Ok(prev.is_some())
    }

    /// `spec.md` §4.1 `GetCurrentKey`: reads the key directly, without the
    /// `tracker.Get`/`repo.fetched` announcements that `GetCurrentValue`/
    /// `GetCurrentItem` make — §4.1 scopes those to the Value/Item variants.
    pub fn get_current_key(&mut self) -> Result<Option<K>> {
        let Some(pos) = self.cursor else { return Ok(None) };
        let node = self.fetch(pos.node_id)?;
        Ok(node.slot(pos.index).map(|item| item.key.clone()))
    }

    /// `spec.md` §4.1 `GetCurrentValue`.
    pub fn get_current_value(&mut self) -> Result<Option<V>> {
        Ok(self.get_current_item()?.and_then(|item| item.value))
    }

    /// `spec.md` §4.1 `GetCurrentItem`: announces `tracker.get` and informs
    /// the repository the node was fetched.
    pub fn get_current_item(&mut self) -> Result<Option<Item<K, V>>> {
        let Some(pos) = self.cursor else { return Ok(None) };
        let node = self.fetch(pos.node_id)?;
        let Some(item) = node.slot(pos.index) else { return Ok(None) };
        let snapshot = item.clone();
        self.tracker.get(&snapshot)?;
        self.repo.fetched(node.id())?;
        Ok(Some(snapshot))
    }

    /// `spec.md` §4.1 `Count`.
    pub fn count(&self) -> u64 {
        self.descriptor.count()
    }

    /// `spec.md` §4.1 `IsUnique`.
    pub fn is_unique(&self) -> bool {
        self.descriptor.is_unique()
    }

    /// `spec.md` §4.1 `IsValueDataInNodeSegment`.
    pub fn is_value_data_in_node_segment(&self) -> bool {
        self.descriptor.is_value_data_in_node_segment()
    }

    /// `spec.md` §4.1 `GetStoreInfo`.
    pub fn get_store_info(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    /// `spec.md` §4.1 `Lock`: a no-op hook. The engine is single-threaded
    /// cooperative per call (`spec.md` §5) and holds no internal mutex; this
    /// exists so an embedding host that wraps calls with its own
    /// synchronization has a named seam to call into.
    pub fn lock(&self) {}

    /// Current cursor position, if any (`spec.md` glossary: "current item /
    /// cursor").
    pub fn cursor(&self) -> Option<CursorPosition> {
        self.cursor
    }

    /// Access to the injected tracker, for hosts (and tests) that need to
    /// inspect what was recorded without threading a side channel through
    /// every call.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }
}
