//! Domain Events for node mutations
//!
//! The node service emits one event after every successful insert, update or
//! delete, using tokio's broadcast channel so any number of in-process
//! observers can follow changes without coupling to the pipeline.
//!
//! # Event Flow
//!
//! 1. The pipeline persists a mutation and its history
//! 2. A domain event is emitted via the broadcast channel
//! 3. All subscribers receive the event asynchronously

use serde::{Deserialize, Serialize};

/// Domain events emitted by the node service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// A new node was stored at version 1
    #[serde(rename = "node:created")]
    NodeCreated { id: String, ns: String, version: i64 },

    /// A node moved to a new version
    #[serde(rename = "node:updated")]
    NodeUpdated { id: String, ns: String, version: i64 },

    /// A node and its history were removed
    #[serde(rename = "node:deleted")]
    NodeDeleted { id: String, ns: String },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::NodeCreated { .. } => "node:created",
            DomainEvent::NodeUpdated { .. } => "node:updated",
            DomainEvent::NodeDeleted { .. } => "node:deleted",
        }
    }

    /// Id of the node the event concerns
    pub fn node_id(&self) -> &str {
        match self {
            DomainEvent::NodeCreated { id, .. }
            | DomainEvent::NodeUpdated { id, .. }
            | DomainEvent::NodeDeleted { id, .. } => id,
        }
    }
}
