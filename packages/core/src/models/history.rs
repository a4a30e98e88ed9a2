//! Version history records
//!
//! Each stored node has one history document holding an append-only chain of
//! entries, one per version, each bound to its predecessor by hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One link of a node's history chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Version of the node this entry records
    pub ver: i64,

    /// Chained digest (lowercase hex SHA-256)
    pub hash: String,

    /// Full node document for this version
    pub body: Value,

    pub recorded_at: DateTime<Utc>,
}

/// The complete history of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHistory {
    pub node_id: String,
    pub entries: Vec<HistoryEntry>,
}

impl NodeHistory {
    /// Latest entry of the chain
    pub fn top(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Entry for a specific version
    pub fn entry(&self, ver: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.ver == ver)
    }
}
