//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations. Every
//! rejection is a distinct, typed variant; only storage failures are
//! considered transient.

use crate::db::DatabaseError;
use crate::models::{NodeId, ValidationError};
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Referenced node is absent or soft-deleted
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// A move would create a cycle, or the stored ancestry already contains one
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// A create or move would place a node deeper than allowed
    #[error("Maximum depth exceeded: resulting depth {depth} (max {max_depth})")]
    MaxDepthExceeded { depth: usize, max_depth: usize },

    /// A sibling with the same name (case-insensitive) already exists
    #[error("Duplicate name '{name}' under parent {}", parent_label(.parent_id))]
    DuplicateName {
        name: String,
        parent_id: Option<NodeId>,
    },

    /// Delete blocked by live children
    #[error("Node {id} has {count} child node(s) and cannot be deleted")]
    HasChildren { id: NodeId, count: u64 },

    /// Malformed request shape or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Underlying store failure
    #[error("Database operation failed: {0}")]
    Database(DatabaseError),
}

fn parent_label(parent_id: &Option<NodeId>) -> String {
    match parent_id {
        Some(id) => id.to_string(),
        None => "root".to_string(),
    }
}

impl From<DatabaseError> for NodeServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NodeNotFound { id } => Self::NodeNotFound { id },
            other => Self::Database(other),
        }
    }
}

/// Stable classification of a [`NodeServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    CycleDetected,
    MaxDepthExceeded,
    DuplicateName,
    HasChildren,
    Validation,
    Database,
}

impl ErrorKind {
    /// Machine-readable error code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::CycleDetected => "CYCLE_DETECTED",
            ErrorKind::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            ErrorKind::DuplicateName => "DUPLICATE_NAME",
            ErrorKind::HasChildren => "HAS_CHILDREN",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create a max depth exceeded error
    pub fn max_depth_exceeded(depth: usize, max_depth: usize) -> Self {
        Self::MaxDepthExceeded { depth, max_depth }
    }

    /// Create a duplicate name error
    pub fn duplicate_name(name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self::DuplicateName {
            name: name.into(),
            parent_id,
        }
    }

    /// Create a has children error
    pub fn has_children(id: NodeId, count: u64) -> Self {
        Self::HasChildren { id, count }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } => ErrorKind::NotFound,
            Self::CircularReference { .. } => ErrorKind::CycleDetected,
            Self::MaxDepthExceeded { .. } => ErrorKind::MaxDepthExceeded,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::HasChildren { .. } => ErrorKind::HasChildren,
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::Database(_) => ErrorKind::Database,
        }
    }

    /// Whether retrying the same request may succeed
    ///
    /// Only storage failures are transient; every other variant means the
    /// request itself must change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_not_found_is_reclassified() {
        let err: NodeServiceError = DatabaseError::node_not_found(42).into();
        assert!(matches!(err, NodeServiceError::NodeNotFound { id: 42 }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_storage_failures_are_retryable() {
        let err: NodeServiceError = DatabaseError::sql_execution("disk I/O error").into();
        assert!(matches!(err, NodeServiceError::Database(_)));
        assert_eq!(err.kind().as_str(), "DATABASE_ERROR");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_errors_convert() {
        let err: NodeServiceError =
            ValidationError::out_of_range("sort", 10_000, 0, 9999).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
        assert_eq!(
            format!("{}", err),
            "Invalid input: Field 'sort' is out of range: 10000 (allowed 0..=9999)"
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            format!("{}", NodeServiceError::duplicate_name("Home", None)),
            "Duplicate name 'Home' under parent root"
        );
        assert_eq!(
            format!("{}", NodeServiceError::duplicate_name("Home", Some(3))),
            "Duplicate name 'Home' under parent 3"
        );
        assert_eq!(
            format!("{}", NodeServiceError::has_children(5, 2)),
            "Node 5 has 2 child node(s) and cannot be deleted"
        );
        assert_eq!(
            format!("{}", NodeServiceError::max_depth_exceeded(6, 5)),
            "Maximum depth exceeded: resulting depth 6 (max 5)"
        );
    }

    #[test]
    fn test_rejections_are_not_retryable() {
        let rejections = [
            NodeServiceError::node_not_found(1),
            NodeServiceError::circular_reference("1 -> 2 -> 1"),
            NodeServiceError::max_depth_exceeded(6, 5),
            NodeServiceError::duplicate_name("A", None),
            NodeServiceError::has_children(1, 1),
        ];
        for err in rejections {
            assert!(!err.is_retryable(), "{} should not be retryable", err);
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::CycleDetected.to_string(), "CYCLE_DETECTED");
        assert_eq!(
            NodeServiceError::has_children(1, 1).kind().as_str(),
            "HAS_CHILDREN"
        );
    }
}
