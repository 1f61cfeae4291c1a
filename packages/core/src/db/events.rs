//! Domain Events
//!
//! This module defines the domain events emitted by `NodeService` after a
//! mutation commits. Subscribers receive them through a tokio broadcast
//! channel without coupling to the store implementation.
//!
//! # Event Flow
//!
//! 1. `NodeService` commits a transaction
//! 2. One domain event is emitted via the broadcast channel
//! 3. All subscribers receive the event asynchronously
//!
//! Rolled-back mutations never emit events.

use crate::models::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// Domain events emitted by `NodeService`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// A new node was created
    NodeCreated(Node),

    /// An existing node was updated (moved, renamed, toggled, ...)
    NodeUpdated(Node),

    /// A node was soft-deleted
    NodeDeleted { id: NodeId },

    /// Sort keys of several nodes were rewritten in one transaction
    NodesReordered { ids: Vec<NodeId> },

    /// Active flag of several nodes was set in one transaction
    #[serde(rename_all = "camelCase")]
    StatusChanged { ids: Vec<NodeId>, is_active: bool },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::NodeCreated(_) => "node:created",
            DomainEvent::NodeUpdated(_) => "node:updated",
            DomainEvent::NodeDeleted { .. } => "node:deleted",
            DomainEvent::NodesReordered { .. } => "nodes:reordered",
            DomainEvent::StatusChanged { .. } => "nodes:status-changed",
        }
    }
}
