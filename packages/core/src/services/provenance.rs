//! Provenance and versioning
//!
//! Every version of a node is recorded in its history with a hash chaining it
//! to the version before:
//!
//! ```text
//! hash_1 = H(H(canonical(v1)))
//! hash_i = H(hash_{i-1} ++ H(canonical(v_i)))
//! ```
//!
//! `H` is SHA-256 rendered as lowercase hex and `++` concatenates the hex
//! strings. `canonical` is [`to_canonical_string`] over the node document.

use crate::models::{HistoryEntry, Node, NodeHistory};
use crate::utils::to_canonical_string;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `H(canonical(body))`
pub fn version_digest(body: &Value) -> String {
    digest_hex(to_canonical_string(body).as_bytes())
}

/// Hash of the first version
pub fn seed_hash(body: &Value) -> String {
    digest_hex(version_digest(body).as_bytes())
}

/// Hash of a version following one whose hash is `previous_hash`
pub fn chain_hash(previous_hash: &str, body: &Value) -> String {
    let mut input = String::with_capacity(128);
    input.push_str(previous_hash);
    input.push_str(&version_digest(body));
    digest_hex(input.as_bytes())
}

/// History of a freshly inserted node: a single version-1 entry
pub fn seed_history(node: &Node) -> NodeHistory {
    let body = node.document();
    NodeHistory {
        node_id: node.id.clone(),
        entries: vec![HistoryEntry {
            ver: node.version,
            hash: seed_hash(&body),
            body,
            recorded_at: Utc::now(),
        }],
    }
}

/// Entry recording `node` on top of `prior_top`
pub fn append_history(prior_top: &HistoryEntry, node: &Node) -> HistoryEntry {
    let body = node.document();
    HistoryEntry {
        ver: node.version,
        hash: chain_hash(&prior_top.hash, &body),
        body,
        recorded_at: Utc::now(),
    }
}

/// Whether an update carrying `supplied` may replace version `stored`
pub fn check_optimistic_version(stored: i64, supplied: i64) -> bool {
    stored == supplied
}

/// Result of recomputing a history chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVerification {
    Intact,
    /// First version whose stored hash or position disagrees
    Broken { ver: i64 },
}

/// Recompute every link of `history`
pub fn verify_chain(history: &NodeHistory) -> ChainVerification {
    let mut previous: Option<&HistoryEntry> = None;
    for (position, entry) in history.entries.iter().enumerate() {
        let expected_ver = position as i64 + 1;
        let expected_hash = match previous {
            None => seed_hash(&entry.body),
            Some(prev) => chain_hash(&prev.hash, &entry.body),
        };
        if entry.ver != expected_ver || entry.hash != expected_hash {
            return ChainVerification::Broken { ver: entry.ver };
        }
        previous = Some(entry);
    }
    ChainVerification::Intact
}
