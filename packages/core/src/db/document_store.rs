//! DocumentStore Trait - Storage Abstraction Layer
//!
//! This module defines the `DocumentStore` trait the validation pipeline uses
//! for every read and write. Any key/document backend (CouchDB-style or
//! otherwise) can sit behind it; the pipeline only relies on the semantics
//! documented here.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async; a call may suspend the calling
//!    operation but never blocks the worker.
//! 2. **Compare-and-swap writes**: `put` and `remove` carry the revision the
//!    caller read. A mismatch is reported as [`StoreError::Conflict`], which the
//!    pipeline surfaces as a version conflict.
//! 3. **Reverse linkage index**: `query_reverse_links` answers "who links to
//!    this id" without scanning, which delete needs to refuse dangling links.
//! 4. **History alongside nodes**: The history document of a node lives in
//!    the same store and is keyed by node id. The pipeline writes a node
//!    version and its history with [`DocumentStore::put_with_history`], so a
//!    stored version never exists without its history entry.

use crate::db::StoreError;
use crate::models::{Node, NodeHistory};
use async_trait::async_trait;

/// Identity of a document after a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRef {
    pub id: String,
    pub version: i64,
}

/// Abstraction over the backing document store
///
/// Implementations must be `Send + Sync` so one store can be shared by every
/// in-flight validation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a node; `Ok(None)` when it does not exist
    async fn get(&self, id: &str) -> Result<Option<Node>, StoreError>;

    /// Current stored version of a node
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the node does not exist.
    async fn get_version(&self, id: &str) -> Result<i64, StoreError>;

    /// Write a node
    ///
    /// With `expected_version = None` the node is created: an empty `node.id`
    /// asks the store to assign one, and an existing id is a conflict. With
    /// `Some(v)` the write only succeeds if the stored version is still `v`.
    async fn put(&self, node: Node, expected_version: Option<i64>)
        -> Result<StoredRef, StoreError>;

    /// Write a node and its history document as one unit
    ///
    /// Same compare-and-swap rules as [`DocumentStore::put`]. When either write
    /// fails, neither is applied.
    async fn put_with_history(
        &self,
        node: Node,
        expected_version: Option<i64>,
        history: NodeHistory,
    ) -> Result<StoredRef, StoreError>;

    /// Remove a node if its stored version equals `expected_version`
    async fn remove(&self, id: &str, expected_version: i64) -> Result<(), StoreError>;

    /// Ids of nodes whose linkage currently references `target_id`
    async fn query_reverse_links(&self, target_id: &str) -> Result<Vec<String>, StoreError>;

    /// All nodes of a type within a namespace
    async fn query_by_type(&self, ns: &str, node_type: &str) -> Result<Vec<Node>, StoreError>;

    /// Fetch the history document of a node
    async fn get_history(&self, node_id: &str) -> Result<Option<NodeHistory>, StoreError>;

    /// Create or replace the history document of a node
    async fn put_history(&self, history: NodeHistory) -> Result<(), StoreError>;

    /// Remove the history document of a node (no-op when absent)
    async fn remove_history(&self, node_id: &str) -> Result<(), StoreError>;
}
