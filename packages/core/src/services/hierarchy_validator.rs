//! Structural Validation
//!
//! `HierarchyValidator` checks a proposed structural change against the tree
//! invariants before anything is written:
//!
//! - **No cycles**: a node can never become its own ancestor
//! - **Bounded depth**: a top-level node has depth 0; no node may sit deeper than `max_depth`
//! - **Unique sibling names**: compared case-insensitively among live siblings
//! - **No orphaning deletes**: a node with live children cannot be deleted
//!
//! Every check is a read. The checks take any [`NodeReader`], so the service
//! runs them on its open transaction and sees that transaction's writes.

use crate::db::NodeReader;
use crate::models::NodeId;
use crate::services::error::NodeServiceError;
use std::collections::HashSet;

/// Validator for proposed structural changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyValidator {
    max_depth: usize,
}

impl HierarchyValidator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Upper bound on ancestor-walk iterations
    ///
    /// A consistent tree never needs more than `max_depth` steps, so walks
    /// that get this far indicate corrupt ancestry.
    fn walk_limit(&self) -> usize {
        self.max_depth.saturating_mul(2).max(1)
    }

    /// Fail with `NodeNotFound` unless `parent_id` is the root or a live node
    pub async fn check_parent_exists<R>(
        &self,
        reader: &R,
        parent_id: Option<NodeId>,
    ) -> Result<(), NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        if let Some(parent_id) = parent_id {
            if reader.get_node(parent_id).await?.is_none() {
                return Err(NodeServiceError::node_not_found(parent_id));
            }
        }
        Ok(())
    }

    /// Reject moving `node_id` under `proposed_parent_id` if that would close a cycle
    ///
    /// Fails with `CircularReference` when the node would become its own
    /// parent, when the proposed parent's ancestor chain reaches `node_id`, or
    /// when the chain revisits an id (pre-existing corruption). Moving to the
    /// root always passes.
    pub async fn check_no_cycle<R>(
        &self,
        reader: &R,
        node_id: NodeId,
        proposed_parent_id: Option<NodeId>,
    ) -> Result<(), NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let Some(parent_id) = proposed_parent_id else {
            return Ok(());
        };

        if parent_id == node_id {
            return Err(NodeServiceError::circular_reference(format!(
                "node {} cannot be its own parent",
                node_id
            )));
        }

        let mut visited = HashSet::new();
        let mut current = Some(parent_id);

        while let Some(id) = current {
            if id == node_id {
                return Err(NodeServiceError::circular_reference(format!(
                    "node {} is an ancestor of proposed parent {}",
                    node_id, parent_id
                )));
            }
            if !visited.insert(id) {
                return Err(NodeServiceError::circular_reference(format!(
                    "ancestry of node {} revisits node {}",
                    parent_id, id
                )));
            }
            if visited.len() > self.walk_limit() {
                return Err(NodeServiceError::circular_reference(format!(
                    "ancestry of node {} exceeds {} levels",
                    parent_id,
                    self.walk_limit()
                )));
            }

            current = match reader.get_node(id).await? {
                Some(node) => node.parent_id,
                None if id == parent_id => return Err(NodeServiceError::node_not_found(id)),
                // Dangling ancestor: the chain ends here, as it does in tree assembly
                None => None,
            };
        }

        Ok(())
    }

    /// Depth of a live node: the number of ancestors above it
    ///
    /// Fails with `CircularReference` if the walk exceeds `2 × max_depth`.
    pub async fn depth_of<R>(&self, reader: &R, node_id: NodeId) -> Result<usize, NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let mut node = reader
            .get_node(node_id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(node_id))?;
        let mut depth = 0;

        while let Some(parent_id) = node.parent_id {
            depth += 1;
            if depth > self.walk_limit() {
                return Err(NodeServiceError::circular_reference(format!(
                    "ancestry of node {} exceeds {} levels",
                    node_id,
                    self.walk_limit()
                )));
            }
            node = match reader.get_node(parent_id).await? {
                Some(parent) => parent,
                None => break,
            };
        }

        Ok(depth)
    }

    /// Height of the subtree rooted at `node_id` (0 for a leaf)
    ///
    /// Stops counting once it passes `max_depth`, which is enough to reject
    /// any move of the subtree.
    pub async fn subtree_height<R>(
        &self,
        reader: &R,
        node_id: NodeId,
    ) -> Result<usize, NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let mut height = 0;
        let mut frontier = vec![node_id];

        while height <= self.max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                next.extend(reader.get_children(Some(*id)).await?.into_iter().map(|c| c.id));
            }
            if next.is_empty() {
                break;
            }
            height += 1;
            frontier = next;
        }

        Ok(height)
    }

    /// Reject placing a subtree of `subtree_height` under `parent_id` if any
    /// of its nodes would end up deeper than `max_depth`
    ///
    /// For a single new node pass `subtree_height = 0`.
    pub async fn check_depth<R>(
        &self,
        reader: &R,
        parent_id: NodeId,
        subtree_height: usize,
    ) -> Result<(), NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let depth = self.depth_of(reader, parent_id).await? + 1 + subtree_height;
        if depth > self.max_depth {
            return Err(NodeServiceError::max_depth_exceeded(depth, self.max_depth));
        }
        Ok(())
    }

    /// Reject `name` if a live sibling under `parent_id` already uses it
    /// (case-insensitive), ignoring `exclude_id`
    pub async fn check_unique_name<R>(
        &self,
        reader: &R,
        parent_id: Option<NodeId>,
        name: &str,
        exclude_id: Option<NodeId>,
    ) -> Result<(), NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let wanted = name.to_lowercase();
        let siblings = reader.get_children(parent_id).await?;

        let taken = siblings
            .iter()
            .filter(|s| Some(s.id) != exclude_id)
            .any(|s| s.name.to_lowercase() == wanted);

        if taken {
            return Err(NodeServiceError::duplicate_name(name, parent_id));
        }
        Ok(())
    }

    /// Reject deleting a node that still has live children
    pub async fn check_deletable<R>(&self, reader: &R, node_id: NodeId) -> Result<(), NodeServiceError>
    where
        R: NodeReader + ?Sized,
    {
        let count = reader.count_active_children(node_id).await?;
        if count > 0 {
            return Err(NodeServiceError::has_children(node_id, count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NodeStore};
    use crate::models::NewNode;

    /// Builds a chain `1 → 2 → ... → len` plus an unrelated root
    async fn chain(len: usize) -> (MemoryStore, Vec<NodeId>) {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();
        let mut ids = Vec::new();
        let mut parent = None;
        for i in 0..len {
            let mut draft = NewNode::new(format!("level-{}", i));
            draft.parent_id = parent;
            let node = tx.insert_node(&draft).await.unwrap();
            parent = Some(node.id);
            ids.push(node.id);
        }
        tx.insert_node(&NewNode::new("Other")).await.unwrap();
        tx.commit().await.unwrap();
        (store, ids)
    }

    #[tokio::test]
    async fn test_self_parent_is_cycle() {
        let (store, ids) = chain(1).await;
        let validator = HierarchyValidator::new(5);

        let err = validator
            .check_no_cycle(&store, ids[0], Some(ids[0]))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));
    }

    #[tokio::test]
    async fn test_move_under_descendant_is_cycle() {
        let (store, ids) = chain(4).await;
        let validator = HierarchyValidator::new(5);

        let err = validator
            .check_no_cycle(&store, ids[0], Some(ids[3]))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        // Moving a leaf under a sibling branch or to the root is fine
        assert!(validator.check_no_cycle(&store, ids[3], None).await.is_ok());
        assert!(validator
            .check_no_cycle(&store, ids[3], Some(ids[0]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let (store, ids) = chain(1).await;
        let validator = HierarchyValidator::new(5);

        let err = validator
            .check_no_cycle(&store, ids[0], Some(999))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::NodeNotFound { id: 999 }));

        let err = validator
            .check_parent_exists(&store, Some(999))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::NodeNotFound { id: 999 }));
        assert!(validator.check_parent_exists(&store, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_ancestry_is_reported_as_cycle() {
        // Write a cycle directly through the store, bypassing validation
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();
        let a = tx.insert_node(&NewNode::new("A")).await.unwrap();
        let b = tx.insert_node(&NewNode::new("B").with_parent(a.id)).await.unwrap();
        tx.update_fields(a.id, &crate::models::NodeUpdate::new().with_parent(Some(b.id)))
            .await
            .unwrap();
        let c = tx.insert_node(&NewNode::new("C")).await.unwrap();
        tx.commit().await.unwrap();

        let validator = HierarchyValidator::new(5);
        let err = validator
            .check_no_cycle(&store, c.id, Some(a.id))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let err = validator.check_depth(&store, a.id, 0).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));
    }

    #[tokio::test]
    async fn test_depth_counts_ancestors() {
        let (store, ids) = chain(6).await;
        let validator = HierarchyValidator::new(5);

        assert_eq!(validator.depth_of(&store, ids[0]).await.unwrap(), 0);
        assert_eq!(validator.depth_of(&store, ids[5]).await.unwrap(), 5);

        // A child of depth 4 lands at depth 5: allowed
        assert!(validator.check_depth(&store, ids[4], 0).await.is_ok());

        // A child of depth 5 would land at depth 6
        let err = validator.check_depth(&store, ids[5], 0).await.unwrap_err();
        assert!(matches!(
            err,
            NodeServiceError::MaxDepthExceeded {
                depth: 6,
                max_depth: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_depth_includes_moved_subtree() {
        let (store, ids) = chain(4).await;
        let validator = HierarchyValidator::new(5);

        assert_eq!(validator.subtree_height(&store, ids[0]).await.unwrap(), 3);
        assert_eq!(validator.subtree_height(&store, ids[3]).await.unwrap(), 0);

        // Subtree of height 3 under a depth-1 parent reaches depth 5
        assert!(validator.check_depth(&store, ids[1], 3).await.is_ok());
        assert!(validator.check_depth(&store, ids[2], 3).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_name_is_case_insensitive() {
        let (store, ids) = chain(2).await;
        let validator = HierarchyValidator::new(5);

        let err = validator
            .check_unique_name(&store, None, "OTHER", None)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::DuplicateName { parent_id: None, .. }));

        // Renaming a node to its own name (different case) is allowed
        assert!(validator
            .check_unique_name(&store, Some(ids[0]), "LEVEL-1", Some(ids[1]))
            .await
            .is_ok());

        // Same name under a different parent is allowed
        assert!(validator
            .check_unique_name(&store, Some(ids[1]), "Other", None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_deletable_only_without_children() {
        let (store, ids) = chain(2).await;
        let validator = HierarchyValidator::new(5);

        let err = validator.check_deletable(&store, ids[0]).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::HasChildren { count: 1, .. }));
        assert!(validator.check_deletable(&store, ids[1]).await.is_ok());
    }
}
