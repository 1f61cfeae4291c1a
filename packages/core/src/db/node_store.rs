//! NodeStore Traits - Storage Abstraction Layer
//!
//! This module defines the traits that abstract durable storage of menu
//! nodes. Business logic in `NodeService` depends only on these traits, so
//! the libsql-backed `TursoStore` and the in-process `MemoryStore` are
//! interchangeable.
//!
//! # Architecture
//!
//! - **`NodeReader`**: Read operations, available on the store and inside a transaction
//! - **`NodeStore`**: Entry point; reads committed state and opens transactions
//! - **`NodeTransaction`**: Writes, visible only to the transaction until commit
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async to support embedded and network backends
//! 2. **Soft deletion is invisible**: No read ever returns a soft-deleted node
//! 3. **Explicit scope**: A transaction that is dropped without `commit()` is rolled back
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{MemoryStore, NodeReader, NodeStore};
//! use menutree_core::models::NewNode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!
//!     let tx = store.begin().await?;
//!     let home = tx.insert_node(&NewNode::new("Home")).await?;
//!     tx.commit().await?;
//!
//!     assert!(store.get_node(home.id).await?.is_some());
//!     Ok(())
//! }
//! ```

use crate::db::error::DatabaseError;
use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use async_trait::async_trait;

/// Read access to live (non-deleted) nodes
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts where
/// futures may be moved between threads.
#[async_trait]
pub trait NodeReader: Send + Sync {
    /// Get a node by id
    ///
    /// Returns `Ok(None)` if the node is absent or soft-deleted.
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DatabaseError>;

    /// Get the direct children of a parent (`None` = top level)
    ///
    /// Ordered by `(sort, id)`. Returns an empty vector if there are none.
    async fn get_children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, DatabaseError>;

    /// Get every live node, optionally only active ones
    ///
    /// Ordered by `(parent_id, sort, id)` with top-level nodes first.
    async fn get_all(&self, active_only: bool) -> Result<Vec<Node>, DatabaseError>;

    /// Count the non-deleted children of a node, active or not
    async fn count_active_children(&self, parent_id: NodeId) -> Result<u64, DatabaseError>;
}

/// Durable node storage
#[async_trait]
pub trait NodeStore: NodeReader {
    /// Open a transactional scope
    ///
    /// Writes made through the returned transaction are invisible to other
    /// readers until `commit()` succeeds. Transactions on the same store are
    /// serialized: a second `begin()` waits until the first one finishes.
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>, DatabaseError>;
}

/// An open transactional scope
///
/// Reads through the transaction observe its own uncommitted writes.
#[async_trait]
pub trait NodeTransaction: NodeReader {
    /// Insert a draft, assigning `id`, `created_at` and `updated_at`
    async fn insert_node(&self, draft: &NewNode) -> Result<Node, DatabaseError>;

    /// Modify only the supplied fields and refresh `updated_at`
    ///
    /// # Errors
    ///
    /// `DatabaseError::NodeNotFound` if the node is absent or soft-deleted.
    async fn update_fields(&self, id: NodeId, update: &NodeUpdate) -> Result<Node, DatabaseError>;

    /// Mark a node as deleted
    ///
    /// # Errors
    ///
    /// `DatabaseError::NodeNotFound` if the node is absent or already deleted.
    async fn soft_delete(&self, id: NodeId) -> Result<(), DatabaseError>;

    /// Publish every write made in this scope
    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    /// Discard every write made in this scope
    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}
