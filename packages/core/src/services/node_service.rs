//! Node Service - Tree Reads and Validated Mutations
//!
//! This module provides the business logic layer for the menu tree:
//!
//! - Tree reads (active view, full view, flat listing, get-by-id)
//! - Create, update (rename / move / attribute edit) and delete
//! - Bulk reorder and bulk status change
//!
//! # Transactions
//!
//! Every mutation opens one store transaction, runs its structural checks
//! through that transaction, writes, and commits. Any rejection or storage
//! failure rolls the whole mutation back, so a rejected request leaves no
//! trace. Dropping a mutation future mid-flight drops its transaction, which
//! also rolls back.
//!
//! Domain events are emitted only after a successful commit.

use crate::config::TreeConfig;
use crate::db::{DomainEvent, NodeStore, NodeTransaction};
use crate::models::{validate_sort, NewNode, Node, NodeId, NodeUpdate, ReorderItem, TreeNode};
use crate::services::error::NodeServiceError;
use crate::services::hierarchy_validator::HierarchyValidator;
use crate::services::tree_builder::{build_active_tree, build_tree};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel capacity for domain events.
///
/// Lagging subscribers lose the oldest events, never block mutations.
const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Core service for menu tree operations
///
/// # Examples
///
/// ```no_run
/// use menutree_core::db::{DatabaseService, NodeStore, TursoStore};
/// use menutree_core::models::NewNode;
/// use menutree_core::services::NodeService;
/// use menutree_core::TreeConfig;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menutree.db")).await?);
///     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
///     let service = NodeService::new(store, TreeConfig::default())?;
///
///     let system = service.create_node(NewNode::new("System")).await?;
///     service
///         .create_node(NewNode::new("Users").with_parent(system.id).with_route("/system/users"))
///         .await?;
///
///     let tree = service.get_tree().await?;
///     println!("{}", tree.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn NodeStore>,

    validator: HierarchyValidator,

    config: TreeConfig,

    /// Broadcast channel for domain events (128 capacity)
    event_tx: broadcast::Sender<DomainEvent>,
}

impl NodeService {
    /// Create a service over a store
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `config` fails validation.
    pub fn new(store: Arc<dyn NodeStore>, config: TreeConfig) -> Result<Self, NodeServiceError> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            store,
            validator: HierarchyValidator::new(config.max_depth),
            config,
            event_tx,
        })
    }

    /// The validated limits this service enforces
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Subscribe to domain events
    ///
    /// The receiver sees every mutation committed after this call.
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscribers is normal.
    fn emit_event(&self, event: DomainEvent) {
        let _ = self.event_tx.send(event);
    }

    //
    // READS
    //

    /// Active tree: inactive nodes are pruned together with their subtrees
    pub async fn get_tree(&self) -> Result<Vec<TreeNode>, NodeServiceError> {
        let nodes = self.store.get_all(false).await?;
        Ok(build_active_tree(&nodes))
    }

    /// Every live node, active or not
    pub async fn get_full_tree(&self) -> Result<Vec<TreeNode>, NodeServiceError> {
        let nodes = self.store.get_all(false).await?;
        Ok(build_tree(&nodes))
    }

    /// # Errors
    ///
    /// `NodeNotFound` if the node is absent or soft-deleted.
    pub async fn get_node(&self, id: NodeId) -> Result<Node, NodeServiceError> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))
    }

    /// Flat listing ordered by `(parent_id, sort, id)`, top level first
    pub async fn list_nodes(&self, active_only: bool) -> Result<Vec<Node>, NodeServiceError> {
        Ok(self.store.get_all(active_only).await?)
    }

    //
    // MUTATIONS
    //

    /// Create a node
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed draft
    /// - `NodeNotFound` if the parent is absent or deleted
    /// - `DuplicateName` if a sibling already uses the name
    /// - `MaxDepthExceeded` if the node would sit deeper than `max_depth`
    pub async fn create_node(&self, draft: NewNode) -> Result<Node, NodeServiceError> {
        draft.validate(self.config.max_sort)?;

        let tx = self.store.begin().await?;
        let result = self.create_in(tx.as_ref(), &draft).await;
        let node = finish(tx, result).await?;

        tracing::info!(id = node.id, parent_id = ?node.parent_id, "Node created");
        self.emit_event(DomainEvent::NodeCreated(node.clone()));
        Ok(node)
    }

    async fn create_in(
        &self,
        tx: &dyn NodeTransaction,
        draft: &NewNode,
    ) -> Result<Node, NodeServiceError> {
        self.validator
            .check_parent_exists(tx, draft.parent_id)
            .await?;
        self.validator
            .check_unique_name(tx, draft.parent_id, &draft.name, None)
            .await?;
        if let Some(parent_id) = draft.parent_id {
            self.validator.check_depth(tx, parent_id, 0).await?;
        }
        Ok(tx.insert_node(draft).await?)
    }

    /// Apply a sparse update: rename, move, reorder or attribute edit
    ///
    /// A move is checked for cycles and for the depth of the whole moved
    /// subtree, and re-checks name uniqueness under the new parent. A pure
    /// attribute edit skips the structural checks. An empty update returns
    /// the current node without writing.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed update
    /// - `NodeNotFound` if the node or the new parent is absent
    /// - `DuplicateName`, `CircularReference`, `MaxDepthExceeded`
    pub async fn update_node(
        &self,
        id: NodeId,
        update: NodeUpdate,
    ) -> Result<Node, NodeServiceError> {
        update.validate(self.config.max_sort)?;
        if update.is_empty() {
            return self.get_node(id).await;
        }

        let tx = self.store.begin().await?;
        let result = self.update_in(tx.as_ref(), id, &update).await;
        let node = finish(tx, result).await?;

        tracing::info!(id = node.id, parent_id = ?node.parent_id, "Node updated");
        self.emit_event(DomainEvent::NodeUpdated(node.clone()));
        Ok(node)
    }

    async fn update_in(
        &self,
        tx: &dyn NodeTransaction,
        id: NodeId,
        update: &NodeUpdate,
    ) -> Result<Node, NodeServiceError> {
        let current = tx
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))?;
        let next = current.apply_update(update);

        let parent_changed = next.parent_id != current.parent_id;
        let name_changed = next.name != current.name;

        if name_changed || parent_changed {
            self.validator
                .check_unique_name(tx, next.parent_id, &next.name, Some(id))
                .await?;
        }

        if parent_changed {
            self.validator
                .check_no_cycle(tx, id, next.parent_id)
                .await?;
            if let Some(parent_id) = next.parent_id {
                let height = self.validator.subtree_height(tx, id).await?;
                self.validator.check_depth(tx, parent_id, height).await?;
            }
        }

        Ok(tx.update_fields(id, update).await?)
    }

    /// Move a node under a new parent (`None` = top level)
    pub async fn move_node(
        &self,
        id: NodeId,
        new_parent_id: Option<NodeId>,
    ) -> Result<Node, NodeServiceError> {
        self.update_node(id, NodeUpdate::new().with_parent(new_parent_id))
            .await
    }

    /// Soft-delete a node
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if the node is absent or already deleted
    /// - `HasChildren` if it still has live children
    pub async fn delete_node(&self, id: NodeId) -> Result<(), NodeServiceError> {
        let tx = self.store.begin().await?;
        let result = self.delete_in(tx.as_ref(), id).await;
        finish(tx, result).await?;

        tracing::info!(id, "Node deleted");
        self.emit_event(DomainEvent::NodeDeleted { id });
        Ok(())
    }

    async fn delete_in(&self, tx: &dyn NodeTransaction, id: NodeId) -> Result<(), NodeServiceError> {
        if tx.get_node(id).await?.is_none() {
            return Err(NodeServiceError::node_not_found(id));
        }
        self.validator.check_deletable(tx, id).await?;
        Ok(tx.soft_delete(id).await?)
    }

    /// Rewrite the `sort` of several nodes, all-or-nothing
    ///
    /// Every `sort` is range-checked before anything is written. If any id
    /// is missing the whole batch is rolled back.
    pub async fn reorder(&self, items: &[ReorderItem]) -> Result<Vec<Node>, NodeServiceError> {
        for item in items {
            validate_sort(item.sort, self.config.max_sort)?;
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.store.begin().await?;
        let result = reorder_in(tx.as_ref(), items).await;
        let nodes = finish(tx, result).await?;

        let ids: Vec<NodeId> = items.iter().map(|item| item.id).collect();
        tracing::info!(count = ids.len(), "Nodes reordered");
        self.emit_event(DomainEvent::NodesReordered { ids });
        Ok(nodes)
    }

    /// Set `is_active` on several nodes, all-or-nothing
    ///
    /// Children of a deactivated node keep their own flag.
    pub async fn bulk_set_status(
        &self,
        ids: &[NodeId],
        is_active: bool,
    ) -> Result<Vec<Node>, NodeServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.store.begin().await?;
        let result = set_status_in(tx.as_ref(), ids, is_active).await;
        let nodes = finish(tx, result).await?;

        tracing::info!(count = ids.len(), is_active, "Node status changed");
        self.emit_event(DomainEvent::StatusChanged {
            ids: ids.to_vec(),
            is_active,
        });
        Ok(nodes)
    }
}

async fn reorder_in(
    tx: &dyn NodeTransaction,
    items: &[ReorderItem],
) -> Result<Vec<Node>, NodeServiceError> {
    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        let update = NodeUpdate::new().with_sort(item.sort);
        nodes.push(tx.update_fields(item.id, &update).await?);
    }
    Ok(nodes)
}

async fn set_status_in(
    tx: &dyn NodeTransaction,
    ids: &[NodeId],
    is_active: bool,
) -> Result<Vec<Node>, NodeServiceError> {
    let update = NodeUpdate::new().with_active(is_active);
    let mut nodes = Vec::with_capacity(ids.len());
    for &id in ids {
        nodes.push(tx.update_fields(id, &update).await?);
    }
    Ok(nodes)
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn NodeTransaction>,
    result: Result<T, NodeServiceError>,
) -> Result<T, NodeServiceError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(error = %err, kind = %err.kind(), "Mutation rejected, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
