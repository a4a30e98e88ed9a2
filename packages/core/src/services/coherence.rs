//! Cache coherence between workers
//!
//! Workers keep their own schema and ACL registries. A worker that changes a
//! registry locally publishes a [`CoherenceMessage`]; every other worker
//! applies it to its own cache. Messages carry the id of the worker that
//! emitted them so a worker can ignore its own echoes.
//!
//! Wire shape (JSON):
//!
//! ```json
//! {"cmd": "schema_change", "type": "update", "ns": "test", "name": "sample",
//!  "json": {"type": "object"}, "origin": "worker-12"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Kind of change a coherence message announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insertion,
    Update,
    Deletion,
}

/// Registry change notification relayed between workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CoherenceMessage {
    SchemaChange {
        #[serde(rename = "type")]
        change: ChangeType,
        ns: String,
        name: String,
        /// New document; absent for deletions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        json: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    AuxSchemaChange {
        #[serde(rename = "type")]
        change: ChangeType,
        ns: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        json: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    /// Group membership files of `ns` changed on disk
    AclChange {
        ns: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
}

impl CoherenceMessage {
    pub fn ns(&self) -> &str {
        match self {
            CoherenceMessage::SchemaChange { ns, .. }
            | CoherenceMessage::AuxSchemaChange { ns, .. }
            | CoherenceMessage::AclChange { ns, .. } => ns,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            CoherenceMessage::SchemaChange { origin, .. }
            | CoherenceMessage::AuxSchemaChange { origin, .. }
            | CoherenceMessage::AclChange { origin, .. } => origin.as_deref(),
        }
    }

    /// Same message stamped with `worker_id` as its origin
    pub fn with_origin(mut self, worker_id: &str) -> Self {
        match &mut self {
            CoherenceMessage::SchemaChange { origin, .. }
            | CoherenceMessage::AuxSchemaChange { origin, .. }
            | CoherenceMessage::AclChange { origin, .. } => {
                *origin = Some(worker_id.to_string());
            }
        }
        self
    }

    pub fn cmd(&self) -> &'static str {
        match self {
            CoherenceMessage::SchemaChange { .. } => "schema_change",
            CoherenceMessage::AuxSchemaChange { .. } => "aux_schema_change",
            CoherenceMessage::AclChange { .. } => "acl_change",
        }
    }
}

/// Worker-side handle on the coherence channel
#[derive(Clone)]
pub struct CoherenceBus {
    sender: broadcast::Sender<CoherenceMessage>,
    worker_id: String,
}

impl CoherenceBus {
    pub fn new(capacity: usize, worker_id: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            worker_id: worker_id.into(),
        }
    }

    /// Another worker's handle on the same channel
    pub fn attach(&self, worker_id: impl Into<String>) -> Self {
        Self {
            sender: self.sender.clone(),
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoherenceMessage> {
        self.sender.subscribe()
    }

    /// Whether `message` was emitted by this worker
    pub fn is_own(&self, message: &CoherenceMessage) -> bool {
        message.origin() == Some(self.worker_id.as_str())
    }

    /// Stamp `message` with this worker's id and send it to every subscriber
    ///
    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, message: CoherenceMessage) -> usize {
        let message = message.with_origin(&self.worker_id);
        let cmd = message.cmd();
        let ns = message.ns().to_string();
        match self.sender.send(message) {
            Ok(receivers) => {
                tracing::debug!(cmd, ns = %ns, receivers, "published coherence message");
                receivers
            }
            Err(_) => {
                tracing::debug!(cmd, ns = %ns, "no coherence subscribers");
                0
            }
        }
    }
}
