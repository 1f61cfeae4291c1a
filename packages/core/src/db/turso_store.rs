//! TursoStore - NodeStore Implementation for Turso/libsql Backend
//!
//! This module implements the store traits over the `menus` table managed by
//! [`DatabaseService`].
//!
//! # Design Principles
//!
//! 1. **Row Conversion**: `row_to_node` is the single libsql::Row → Node conversion point
//! 2. **Root Mapping**: `parent_id = 0` in SQL surfaces as `None` in Rust
//! 3. **Soft Deletion**: Every query filters `deleted_at IS NULL`
//! 4. **One connection per transaction**: `BEGIN IMMEDIATE` takes the write lock up front,
//!    so concurrent transactions serialize instead of interleaving
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{DatabaseService, NodeReader, NodeStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menutree.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!
//!     let top_level = store.get_children(None).await?;
//!     println!("{} top-level nodes", top_level.len());
//!     Ok(())
//! }
//! ```

use crate::db::database::ROOT_PARENT;
use crate::db::error::DatabaseError;
use crate::db::node_store::{NodeReader, NodeStore, NodeTransaction};
use crate::db::DatabaseService;
use crate::models::{NewNode, Node, NodeId, NodeUpdate};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Connection, Row, Value};
use std::sync::Arc;

const NODE_COLUMNS: &str =
    "id, parent_id, sort, name, code, route, icon, is_active, created_at, updated_at";

/// TursoStore implements the store traits for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }
}

/// Parse timestamp from database - handles both SQLite and RFC3339 formats
///
/// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(DatabaseError::invalid_row(format!(
        "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
        s
    )))
}

/// Convert libsql::Row to Node model
///
/// # Row Format
///
/// Expected columns (in order), see `NODE_COLUMNS`:
/// id, parent_id, sort, name, code, route, icon, is_active, created_at, updated_at
fn row_to_node(row: &Row) -> Result<Node, DatabaseError> {
    let id: i64 = row.get(0)?;
    let parent_id: i64 = row.get(1)?;
    let sort: i64 = row.get(2)?;
    let name: String = row.get(3)?;
    let code: Option<String> = row.get(4)?;
    let route: Option<String> = row.get(5)?;
    let icon: Option<String> = row.get(6)?;
    let is_active: i64 = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Node {
        id,
        parent_id: (parent_id != ROOT_PARENT).then_some(parent_id),
        sort,
        name,
        code,
        route,
        icon,
        is_active: is_active != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parent_value(parent_id: Option<NodeId>) -> i64 {
    parent_id.unwrap_or(ROOT_PARENT)
}

fn text_value(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>, DatabaseError> {
    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await? {
        nodes.push(row_to_node(&row)?);
    }
    Ok(nodes)
}

async fn fetch_node(conn: &Connection, id: NodeId) -> Result<Option<Node>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM menus WHERE id = ? AND deleted_at IS NULL",
        NODE_COLUMNS
    );
    let mut rows = conn
        .query(&sql, [id])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get node: {}", e)))?;

    match rows.next().await? {
        Some(row) => Ok(Some(row_to_node(&row)?)),
        None => Ok(None),
    }
}

async fn fetch_children(
    conn: &Connection,
    parent_id: Option<NodeId>,
) -> Result<Vec<Node>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM menus WHERE parent_id = ? AND deleted_at IS NULL ORDER BY sort, id",
        NODE_COLUMNS
    );
    let rows = conn
        .query(&sql, [parent_value(parent_id)])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to get children: {}", e)))?;
    collect_nodes(rows).await
}

async fn fetch_all(conn: &Connection, active_only: bool) -> Result<Vec<Node>, DatabaseError> {
    let filter = if active_only { " AND is_active = 1" } else { "" };
    let sql = format!(
        "SELECT {} FROM menus WHERE deleted_at IS NULL{} ORDER BY parent_id, sort, id",
        NODE_COLUMNS, filter
    );
    let rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to list nodes: {}", e)))?;
    collect_nodes(rows).await
}

async fn count_children(conn: &Connection, parent_id: NodeId) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM menus WHERE parent_id = ? AND deleted_at IS NULL",
            [parent_id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to count children: {}", e)))?;

    let count: i64 = match rows.next().await? {
        Some(row) => row.get(0)?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

#[async_trait]
impl NodeReader for TursoStore {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_node(&conn, id).await
    }

    async fn get_children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_children(&conn, parent_id).await
    }

    async fn get_all(&self, active_only: bool) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_all(&conn, active_only).await
    }

    async fn count_active_children(&self, parent_id: NodeId) -> Result<u64, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        count_children(&conn, parent_id).await
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn begin(&self) -> Result<Box<dyn NodeTransaction>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;
        tracing::debug!("Transaction started");
        Ok(Box::new(TursoTransaction { conn }))
    }
}

/// A `BEGIN IMMEDIATE` transaction on a dedicated connection
///
/// Dropping it without `commit()` closes the connection, which rolls back
/// the open transaction.
pub struct TursoTransaction {
    conn: Connection,
}

#[async_trait]
impl NodeReader for TursoTransaction {
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>, DatabaseError> {
        fetch_node(&self.conn, id).await
    }

    async fn get_children(&self, parent_id: Option<NodeId>) -> Result<Vec<Node>, DatabaseError> {
        fetch_children(&self.conn, parent_id).await
    }

    async fn get_all(&self, active_only: bool) -> Result<Vec<Node>, DatabaseError> {
        fetch_all(&self.conn, active_only).await
    }

    async fn count_active_children(&self, parent_id: NodeId) -> Result<u64, DatabaseError> {
        count_children(&self.conn, parent_id).await
    }
}

#[async_trait]
impl NodeTransaction for TursoTransaction {
    async fn insert_node(&self, draft: &NewNode) -> Result<Node, DatabaseError> {
        let params = vec![
            Value::Integer(parent_value(draft.parent_id)),
            Value::Integer(draft.sort),
            Value::Text(draft.name.clone()),
            text_value(draft.code.as_deref()),
            text_value(draft.route.as_deref()),
            text_value(draft.icon.as_deref()),
            Value::Integer(i64::from(draft.is_active)),
        ];
        self.conn
            .execute(
                "INSERT INTO menus (parent_id, sort, name, code, route, icon, is_active)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params,
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        let id = self.conn.last_insert_rowid();
        fetch_node(&self.conn, id)
            .await?
            .ok_or_else(|| DatabaseError::sql_execution("Node not found after insert"))
    }

    async fn update_fields(&self, id: NodeId, update: &NodeUpdate) -> Result<Node, DatabaseError> {
        let current = fetch_node(&self.conn, id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))?;
        let next = current.apply_update(update);

        let params = vec![
            Value::Integer(parent_value(next.parent_id)),
            Value::Integer(next.sort),
            Value::Text(next.name),
            text_value(next.code.as_deref()),
            text_value(next.route.as_deref()),
            text_value(next.icon.as_deref()),
            Value::Integer(i64::from(next.is_active)),
            Value::Integer(id),
        ];
        let rows_affected = self
            .conn
            .execute(
                "UPDATE menus
                 SET parent_id = ?, sort = ?, name = ?, code = ?, route = ?, icon = ?,
                     is_active = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ? AND deleted_at IS NULL",
                params,
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node: {}", e)))?;

        if rows_affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }

        fetch_node(&self.conn, id)
            .await?
            .ok_or_else(|| DatabaseError::node_not_found(id))
    }

    async fn soft_delete(&self, id: NodeId) -> Result<(), DatabaseError> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE menus SET deleted_at = CURRENT_TIMESTAMP
                 WHERE id = ? AND deleted_at IS NULL",
                [id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;

        if rows_affected == 0 {
            return Err(DatabaseError::node_not_found(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            let _rollback = self.conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        tracing::debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.conn.execute("ROLLBACK", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to roll back transaction: {}", e))
        })?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(TursoStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TursoStore::new(db), temp_dir))
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let sqlite = parse_timestamp("2024-03-01 12:30:45").unwrap();
        let rfc = parse_timestamp("2024-03-01T12:30:45Z").unwrap();
        assert_eq!(sqlite, rfc);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_insert_and_get_node() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        let created = tx
            .insert_node(&NewNode::new("Dashboard").with_route("/dashboard"))
            .await?;
        tx.commit().await?;

        assert!(created.id > 0);
        assert!(created.is_root());
        assert!(created.is_active);

        let fetched = store.get_node(created.id).await?.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.route.as_deref(), Some("/dashboard"));

        Ok(())
    }

    #[tokio::test]
    async fn test_children_ordered_by_sort_then_id() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        let parent = tx.insert_node(&NewNode::new("Parent")).await?;
        let b = tx
            .insert_node(&NewNode::new("B").with_parent(parent.id).with_sort(2))
            .await?;
        let a = tx
            .insert_node(&NewNode::new("A").with_parent(parent.id).with_sort(1))
            .await?;
        let c = tx
            .insert_node(&NewNode::new("C").with_parent(parent.id).with_sort(2))
            .await?;
        tx.commit().await?;

        let ids: Vec<NodeId> = store
            .get_children(Some(parent.id))
            .await?
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(store.count_active_children(parent.id).await?, 3);
        assert!(store.get_children(Some(9999)).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_fields_only_touches_supplied_fields() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        let node = tx
            .insert_node(&NewNode::new("Users").with_code("USR").with_icon("user"))
            .await?;
        let updated = tx
            .update_fields(node.id, &NodeUpdate::new().with_icon(None).with_sort(4))
            .await?;
        tx.commit().await?;

        assert_eq!(updated.icon, None);
        assert_eq!(updated.sort, 4);
        assert_eq!(updated.code.as_deref(), Some("USR"));
        assert_eq!(updated.name, "Users");

        Ok(())
    }

    #[tokio::test]
    async fn test_soft_delete_hides_node() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        let node = tx.insert_node(&NewNode::new("Temp")).await?;
        tx.soft_delete(node.id).await?;

        let err = tx.soft_delete(node.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NodeNotFound { id } if id == node.id));

        let err = tx
            .update_fields(node.id, &NodeUpdate::new().with_sort(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NodeNotFound { .. }));
        tx.commit().await?;

        assert!(store.get_node(node.id).await?.is_none());
        assert!(store.get_all(false).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        tx.insert_node(&NewNode::new("Discarded")).await?;
        tx.rollback().await?;

        assert!(store.get_all(false).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_rolled_back() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        {
            let tx = store.begin().await?;
            tx.insert_node(&NewNode::new("Abandoned")).await?;
        }

        assert!(store.get_all(false).await?.is_empty());

        // The write lock was released with the connection
        let tx = store.begin().await?;
        tx.insert_node(&NewNode::new("Kept")).await?;
        tx.commit().await?;
        assert_eq!(store.get_all(false).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_all_active_filter() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let tx = store.begin().await?;
        let visible = tx.insert_node(&NewNode::new("Visible")).await?;
        tx.insert_node(&NewNode::new("Hidden").inactive()).await?;
        tx.commit().await?;

        let active = store.get_all(true).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, visible.id);
        assert_eq!(store.get_all(false).await?.len(), 2);

        Ok(())
    }
}
