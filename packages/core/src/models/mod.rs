//! Data Models
//!
//! This module contains the core data structures of the menu tree:
//!
//! - `Node` - A single persisted entry of the hierarchy
//! - `NewNode` / `NodeUpdate` - Create and sparse-update request shapes
//! - `TreeNode` - Ephemeral nested view produced by tree assembly

mod node;
mod tree_node;

pub use node::{
    NewNode, Node, NodeId, NodeUpdate, ReorderItem, ValidationError, MAX_CODE_LEN, MAX_ICON_LEN,
    MAX_NAME_LEN, MAX_ROUTE_LEN,
};
pub(crate) use node::validate_sort;
pub use tree_node::TreeNode;
