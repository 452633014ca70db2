use crate::error::Result;
use crate::id::Id;
use crate::node::Node;

/// Identity-keyed lookup/upsert/remove of nodes, plus a fetch-observation
/// hook (`spec.md` §2 item 4, §6).
///
/// The core never reaches into a node store directly; every access to a
/// `Node<K, V>` goes through this trait, so persistence, caching, and wire
/// format are entirely the implementer's concern.
pub trait NodeRepository<K, V> {
    /// `None` when `id` is not present — absence is not an error.
    fn get(&mut self, id: Id) -> Result<Option<Node<K, V>>>;

    /// Cache a write intent for a new node.
    fn add(&mut self, node: &Node<K, V>) -> Result<()>;

    /// Cache a write intent for an existing node.
    fn update(&mut self, node: &Node<K, V>) -> Result<()>;

    /// Cache a delete intent.
    fn remove(&mut self, id: Id) -> Result<()>;

    /// Advisory hook for MRU accounting, called on successful current-item
    /// reads (`spec.md` §6). Default is a no-op so implementers that don't
    /// care about recency tracking need not override it.
    fn fetched(&mut self, _id: Id) -> Result<()> {
        Ok(())
    }
}

/// Records Add/Get/Update/Remove intents per item for later conflict
/// resolution (`spec.md` §2 item 5, §6).
///
/// Every call takes the affected item by reference; any call may fail and
/// the failure surfaces unchanged from the facade operation that triggered
/// it (`spec.md` §7).
pub trait ItemActionTracker<K, V> {
    fn add(&mut self, item: &crate::item::Item<K, V>) -> Result<()>;
    fn get(&mut self, item: &crate::item::Item<K, V>) -> Result<()>;
    fn update(&mut self, item: &crate::item::Item<K, V>) -> Result<()>;
    fn remove(&mut self, item: &crate::item::Item<K, V>) -> Result<()>;
}
