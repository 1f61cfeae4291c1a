//! Database Layer
//!
//! This module handles all storage interactions:
//!
//! - Database initialization and connection management (libsql)
//! - Store traits consumed by the service layer
//! - The libsql-backed `TursoStore` and the in-process `MemoryStore`
//! - Domain events published after committed mutations

mod database;
mod error;
pub mod events;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::{DatabaseService, ROOT_PARENT};
pub use error::DatabaseError;
pub use events::DomainEvent;
pub use memory_store::{MemoryStore, MemoryTransaction};
pub use node_store::{NodeReader, NodeStore, NodeTransaction};
pub use turso_store::{TursoStore, TursoTransaction};
