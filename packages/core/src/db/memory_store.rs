//! MemoryStore - In-process NodeStore Implementation
//!
//! Keeps the committed node set behind a `RwLock`. A transaction holds the
//! store-wide writer lock for its whole lifetime and works on a private copy,
//! which `commit()` publishes in one step. Dropping the transaction discards
//! the copy.
//!
//! Used by unit tests and benchmarks. Like the `menus` table it rejects a
//! second live sibling with the same case-insensitive name, but nothing
//! survives the process.

use crate::db::error::DatabaseError;
use crate::db::node_store::{NodeReader, NodeStore, NodeTransaction};
use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
struct StoredNode {
    node: Node,
    deleted_at: Option<DateTime<Utc>>,
}

impl StoredNode {
    fn live(&self) -> Option<&Node> {
        match self.deleted_at {
            None => Some(&self.node),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: NodeId,
    rows: BTreeMap<NodeId, StoredNode>,
}

impl MemoryState {
    fn get(&self, id: NodeId) -> Option<Node> {
        self.rows.get(&id).and_then(StoredNode::live).cloned()
    }

    fn children(&self, parent_id: Option<NodeId>) -> Vec<Node> {
        let mut children: Vec<Node> = self
            .rows
            .values()
            .filter_map(StoredNode::live)
            .filter(|n| n.parent_id == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(Node::sibling_key);
        children
    }

    fn all(&self, active_only: bool) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .rows
            .values()
            .filter_map(StoredNode::live)
            .filter(|n| !active_only || n.is_active)
            .cloned()
            .collect();
        nodes.sort_by_key(|n| (n.parent_id.unwrap_or(0), n.sort, n.id));
        nodes
    }

    fn count_children(&self, parent_id: NodeId) -> u64 {
        self.rows
            .values()
            .filter_map(StoredNode::live)
            .filter(|n| n.parent_id == Some(parent_id))
            .count() as u64
    }

    /// Mirrors the `idx_menus_sibling_name` partial unique index
    fn check_sibling_name(
        &self,
        parent_id: Option<NodeId>,
        name: &str,
        exclude_id: Option<NodeId>,
    ) -> Result<(), DatabaseError> {
        let name = name.to_lowercase();
        let taken = self
            .rows
            .values()
            .filter_map(StoredNode::live)
            .any(|n| {
                n.parent_id == parent_id
                    && Some(n.id) != exclude_id
                    && n.name.to_lowercase() == name
            });
        if taken {
            return Err(DatabaseError::sql_execution(format!(
                "UNIQUE constraint failed: menus.parent_id, lower(name) ({})",
                name
            )));
        }
        Ok(())
    }

    fn insert(&mut self, draft: &NewNode) -> Result<Node, DatabaseError> {
        self.check_sibling_name(draft.parent_id, &draft.name, None)?;
        self.next_id += 1;
        let now = Utc::now();
        let node = Node {
            id: self.next_id,
            parent_id: draft.parent_id,
            sort: draft.sort,
            name: draft.name.clone(),
            code: draft.code.clone(),
            route: draft.route.clone(),
            icon: draft.icon.clone(),
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(
            node.id,
            StoredNode {
                node: node.clone(),
                deleted_at: None,
            },
        );
        Ok(node)
    }

    fn update(&mut self, id: NodeId, update: &NodeUpdate) -> Result<Node, DatabaseError> {
        let current = self.get(id).ok_or_else(|| DatabaseError::node_not_found(id))?;
        let mut next = current.apply_update(update);
        self.check_sibling_name(next.parent_id, &next.name, Some(id))?;
        next.updated_at = Utc::now();

        if let Some(stored) = self.rows.get_mut(&id) {
            stored.node = next.clone();
        }
        Ok(next)
    }

    fn soft_delete(&mut self, id: NodeId) -> Result<(), DatabaseError> {
        let stored = self
            .rows
            .get_mut(&id)
            .filter(|s| s.deleted_at.is_none())
            .ok_or_else(|| DatabaseError::node_not_found(id))?;
        stored.deleted_at = Some(Utc::now());
        Ok(())
    }
}

/// In-process store with the same transactional semantics and sibling-name
/// constraint as `TursoStore`
#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> Result<T, DatabaseError> {
        let state = self
            .committed
            .read()
            .map_err(|_| DatabaseError::unavailable("memory store lock poisoned"))?;
        Ok(f(&state))
    }
}

#[async_trait]
impl NodeReader for MemoryStore {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DatabaseError> {
        self.read(|s| s.get(id))
    }

    async fn get_children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, DatabaseError> {
        self.read(|s| s.children(parent_id))
    }

    async fn get_all(&self, active_only: bool) -> Result<Vec<Node>, DatabaseError> {
        self.read(|s| s.all(active_only))
    }

    async fn count_active_children(&self, parent_id: NodeId) -> Result<u64, DatabaseError> {
        self.read(|s| s.count_children(parent_id))
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>, DatabaseError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.read(MemoryState::clone)?;
        tracing::debug!("Transaction started");
        Ok(Box::new(MemoryTransaction {
            committed: Arc::clone(&self.committed),
            working: RwLock::new(working),
            writer: guard,
        }))
    }
}

/// Transaction over a private copy of the committed state
pub struct MemoryTransaction {
    committed: Arc<RwLock<MemoryState>>,
    working: RwLock<MemoryState>,
    writer: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> Result<T, DatabaseError> {
        let state = self
            .working
            .read()
            .map_err(|_| DatabaseError::unavailable("transaction state lock poisoned"))?;
        Ok(f(&state))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut state = self
            .working
            .write()
            .map_err(|_| DatabaseError::unavailable("transaction state lock poisoned"))?;
        f(&mut state)
    }
}

#[async_trait]
impl NodeReader for MemoryTransaction {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DatabaseError> {
        self.read(|s| s.get(id))
    }

    async fn get_children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, DatabaseError> {
        self.read(|s| s.children(parent_id))
    }

    async fn get_all(&self, active_only: bool) -> Result<Vec<Node>, DatabaseError> {
        self.read(|s| s.all(active_only))
    }

    async fn count_active_children(&self, parent_id: NodeId) -> Result<u64, DatabaseError> {
        self.read(|s| s.count_children(parent_id))
    }
}

#[async_trait]
impl NodeTransaction for MemoryTransaction {
    async fn insert_node(&self, draft: &NewNode) -> Result<Node, DatabaseError> {
        self.write(|s| s.insert(draft))
    }

    async fn update_fields(&self, id: NodeId, update: &NodeUpdate) -> Result<Node, DatabaseError> {
        self.write(|s| s.update(id, update))
    }

    async fn soft_delete(&self, id: NodeId) -> Result<(), DatabaseError> {
        self.write(|s| s.soft_delete(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTransaction {
            committed,
            working,
            writer,
        } = *self;
        let working = working
            .into_inner()
            .map_err(|_| DatabaseError::unavailable("transaction state lock poisoned"))?;
        {
            let mut state = committed
                .write()
                .map_err(|_| DatabaseError::unavailable("memory store lock poisoned"))?;
            *state = working;
        }
        drop(writer);
        tracing::debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new();

        let tx = store.begin().await.unwrap();
        let node = tx.insert_node(&NewNode::new("Home")).await.unwrap();
        assert!(tx.get_node(node.id).await.unwrap().is_some());
        assert!(store.get_node(node.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(store.get_node(node.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = MemoryStore::new();

        {
            let tx = store.begin().await.unwrap();
            tx.insert_node(&NewNode::new("Gone")).await.unwrap();
        }

        assert!(store.get_all(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryStore::new();

        let tx = store.begin().await.unwrap();
        let a = tx.insert_node(&NewNode::new("A")).await.unwrap();
        let b = tx.insert_node(&NewNode::new("B")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_soft_delete_is_terminal() {
        let store = MemoryStore::new();

        let tx = store.begin().await.unwrap();
        let parent = tx.insert_node(&NewNode::new("P")).await.unwrap();
        let child = tx
            .insert_node(&NewNode::new("C").with_parent(parent.id))
            .await
            .unwrap();
        assert_eq!(tx.count_active_children(parent.id).await.unwrap(), 1);

        tx.soft_delete(child.id).await.unwrap();
        assert_eq!(tx.count_active_children(parent.id).await.unwrap(), 0);
        assert!(matches!(
            tx.soft_delete(child.id).await,
            Err(DatabaseError::NodeNotFound { .. })
        ));
        tx.commit().await.unwrap();

        assert!(store.get_children(Some(parent.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let store = MemoryStore::new();
        let first = store.begin().await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let tx = contender.begin().await.unwrap();
            let count = tx.get_all(false).await.unwrap().len();
            tx.rollback().await.unwrap();
            count
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        first.insert_node(&NewNode::new("First")).await.unwrap();
        first.commit().await.unwrap();

        // The second transaction starts from the state the first one committed
        assert_eq!(waiter.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sibling_name_constraint() {
        let store = MemoryStore::new();

        let tx = store.begin().await.unwrap();
        let parent = tx.insert_node(&NewNode::new("Parent")).await.unwrap();
        let users = tx
            .insert_node(&NewNode::new("Users").with_parent(parent.id))
            .await
            .unwrap();
        let roles = tx
            .insert_node(&NewNode::new("Roles").with_parent(parent.id))
            .await
            .unwrap();

        assert!(matches!(
            tx.insert_node(&NewNode::new("USERS").with_parent(parent.id)).await,
            Err(DatabaseError::SqlExecutionError { .. })
        ));
        // Same name elsewhere is fine
        tx.insert_node(&NewNode::new("users")).await.unwrap();

        assert!(matches!(
            tx.update_fields(roles.id, &NodeUpdate::new().with_name("users")).await,
            Err(DatabaseError::SqlExecutionError { .. })
        ));
        // Renaming a node to a new casing of its own name is not a collision
        tx.update_fields(users.id, &NodeUpdate::new().with_name("USERS"))
            .await
            .unwrap();

        // A deleted sibling frees its name
        tx.soft_delete(roles.id).await.unwrap();
        tx.insert_node(&NewNode::new("Roles").with_parent(parent.id))
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }
}
