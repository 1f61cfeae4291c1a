//! Business Services
//!
//! This module contains the tree engine's business logic:
//!
//! - `tree_builder` - Pure assembly of flat node lists into ordered forests
//! - `HierarchyValidator` - Cycle, depth, uniqueness and deletability checks
//! - `NodeService` - Reads and transactional, validated mutations
//!
//! Services coordinate between the store layer and callers, enforcing the
//! tree invariants on every mutation.

pub mod error;
pub mod hierarchy_validator;
pub mod node_service;
pub mod tree_builder;


pub use error::{ErrorKind, NodeServiceError};
pub use hierarchy_validator::HierarchyValidator;
pub use node_service::NodeService;
pub use tree_builder::{build_active_tree, build_tree};
