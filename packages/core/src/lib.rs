//! Menutree Core - Hierarchical Tree Engine
//!
//! This crate manages a tree of named, orderable nodes (e.g. a navigation
//! menu): it assembles flat parent-referencing records into ordered trees,
//! validates structural mutations, and applies them transactionally.
//!
//! # Architecture
//!
//! - **Flat storage**: Nodes reference parents by id; trees are derived views
//! - **Invariants**: No cycles, bounded depth, unique sibling names, no orphaning deletes
//! - **Transactions**: Each mutation validates and writes inside one store transaction
//! - **libsql/Turso**: Embedded SQLite-compatible storage, with an in-memory alternative
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NewNode, NodeUpdate, TreeNode)
//! - [`db`] - Store traits, libsql and in-memory stores, domain events
//! - [`services`] - Tree assembly, validation and the `NodeService`
//! - [`config`] - Structural limits

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::TreeConfig;
pub use db::{DatabaseError, DomainEvent, MemoryStore, NodeStore, TursoStore};
pub use models::*;
pub use services::*;
