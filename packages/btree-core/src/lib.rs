#![forbid(unsafe_code)]
//! A generic, pluggable M-way B-tree storage engine: an ordered key/value
//! container whose nodes are fetched, mutated, and persisted through
//! injectable collaborators (a [`NodeRepository`], an [`ItemActionTracker`],
//! and a [`TransactionGate`]).
//!
//! This crate owns the on-node algorithms — insertion, split/promotion,
//! sibling load-balancing, deletion with successor replacement, and cursor
//! navigation — and nothing else: concrete persistence, caching, UUID
//! generation, and physical serialization are the embedding host's concern.

pub mod cursor;
pub mod delete;
pub mod error;
pub mod gated;
pub mod id;
pub mod insert;
pub mod item;
pub mod node;
pub mod store;
pub mod traits;
pub mod tree;

pub use cursor::CursorPosition;
pub use delete::DeletionEngine;
pub use error::{Error, Result};
pub use gated::{GatedTree, TransactionGate, TransactionMode};
pub use id::{Id, IdGenerator, SequentialIdGenerator};
pub use insert::InsertionEngine;
pub use item::Item;
pub use node::{KeyComparator, NaturalOrder, Node};
pub use store::{StoreDescriptor, MIN_SLOT_LENGTH};
pub use traits::{ItemActionTracker, NodeRepository};
pub use tree::Tree;
