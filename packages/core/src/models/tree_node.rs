//! Tree view over nodes
//!
//! `TreeNode` is the read-only, ephemeral shape produced by tree assembly.
//! It is never persisted and never retained across requests.

use crate::models::Node;
use serde::{Deserialize, Serialize};

/// A node together with its ordered children.
///
/// `children` is always present (empty when childless) and is sorted by
/// `(sort, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,

    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            count += 1;
            stack.extend(tree.children.iter());
        }
        count
    }

    /// Always false: a subtree contains at least its own root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ids of this subtree in pre-order (parent before children, siblings in order)
    pub fn ids_preorder(&self) -> Vec<crate::models::NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            ids.push(tree.node.id);
            stack.extend(tree.children.iter().rev());
        }
        ids
    }
}
