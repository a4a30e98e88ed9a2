//! Node Service - Validation Pipeline
//!
//! Every insert, update and delete passes through this service. Each stage
//! short-circuits on failure and nothing is written to the store before the
//! last validation stage has passed.
//!
//! # Pipelines
//!
//! - **Insert**: parse → required fields → namespace known → schema →
//!   linkage → persist version 1 together with its seeded history → respond
//!   with location
//! - **Update**: parse (with `ver`) → namespace known → schema → linkage →
//!   fetch stored → write permission → optimistic version check → persist
//!   version + 1 and the appended history in one compare-and-swap write
//! - **Delete**: fetch stored → no inbound dependents → write permission →
//!   remove node → remove history
//!
//! # Concurrency
//!
//! The optimistic version check here is only a pre-check. The store's
//! compare-and-swap on write is authoritative; its conflict is reported as the
//! same [`EngineError::VersionConflict`].
//!
//! # Events
//!
//! A [`DomainEvent`] is broadcast after each successful mutation. Sending
//! never fails the operation; events are dropped when nobody subscribes.

use crate::config::{EngineConfig, DEFAULT_CHANNEL_CAPACITY};
use crate::db::{DocumentStore, DomainEvent};
use crate::models::{Node, NodeDraft, NodeHistory};
use crate::services::access_control::AccessControl;
use crate::services::error::{Access, EngineError};
use crate::services::linkage_policy::{LinkageDecision, LinkagePolicy};
use crate::services::provenance::{self, ChainVerification};
use crate::services::schema_registry::SchemaRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Result of a successful insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub id: String,
    pub version: i64,
    /// Value for the Location of the created node
    pub location: String,
}

fn node_resource(id: &str) -> String {
    format!("node {}", id)
}

/// Insert/update/delete pipeline plus ACL-checked reads
#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn DocumentStore>,
    schemas: Arc<SchemaRegistry>,
    linkage: Arc<LinkagePolicy>,
    acl: Arc<AccessControl>,
    config: Arc<EngineConfig>,

    /// Broadcast channel for domain events
    event_tx: broadcast::Sender<DomainEvent>,
}

impl NodeService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        schemas: Arc<SchemaRegistry>,
        linkage: Arc<LinkagePolicy>,
        acl: Arc<AccessControl>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            store,
            schemas,
            linkage,
            acl,
            config,
            event_tx,
        }
    }

    /// The backing document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Subscribe to domain events
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use metanode_core::services::NodeService;
    /// # fn demo(service: &NodeService) {
    /// let mut rx = service.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("{}: {}", event.event_type(), event.node_id());
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: DomainEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Namespace, schema and linkage stages shared by insert and update
    async fn validate_candidate(&self, candidate: &Node) -> Result<(), EngineError> {
        if !self.schemas.contains_namespace(&candidate.ns).await {
            return Err(EngineError::unknown_namespace(&candidate.ns));
        }

        let meta = Value::Object(candidate.meta.clone());
        if let Some(report) = self
            .schemas
            .validate(&candidate.ns, &candidate.node_type, &meta)
            .await
        {
            if let Some(message) = report.first_error() {
                tracing::debug!(ns = %candidate.ns, node_type = %candidate.node_type, %message, "schema rejected node");
                return Err(EngineError::SchemaViolation {
                    node_type: candidate.node_type.clone(),
                    message: message.to_string(),
                });
            }
        }

        match self
            .linkage
            .validate_linkage(self.store.as_ref(), candidate)
            .await?
        {
            LinkageDecision::Rejected(reason) => {
                tracing::debug!(ns = %candidate.ns, node_type = %candidate.node_type, %reason, "linkage rejected node");
                Err(EngineError::linkage_violation(reason))
            }
            LinkageDecision::Uncontrolled | LinkageDecision::Accepted => Ok(()),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Node, EngineError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(node_resource(id)))
    }

    async fn fetch_readable(&self, user: &str, id: &str) -> Result<Node, EngineError> {
        let node = self.fetch(id).await?;
        if !self.acl.has_read_permission(user, &node).await {
            return Err(EngineError::permission_denied(Access::Read, node_resource(id)));
        }
        Ok(node)
    }

    /// Insert a node from a raw JSON payload
    pub async fn insert(&self, raw: &str) -> Result<InsertOutcome, EngineError> {
        let draft = NodeDraft::parse(raw)?;
        self.insert_draft(draft).await
    }

    /// Insert an already parsed draft; any client-supplied version is ignored
    pub async fn insert_draft(&self, draft: NodeDraft) -> Result<InsertOutcome, EngineError> {
        let node = draft.into_node(Uuid::new_v4().simple().to_string(), 1);
        self.validate_candidate(&node).await?;

        let history = provenance::seed_history(&node);
        let stored = self.store.put_with_history(node.clone(), None, history).await?;

        tracing::info!(node_id = %stored.id, ns = %node.ns, node_type = %node.node_type, "node created");
        self.emit_event(DomainEvent::NodeCreated {
            id: stored.id.clone(),
            ns: node.ns,
            version: stored.version,
        });

        Ok(InsertOutcome {
            location: self.config.node_location(&stored.id),
            id: stored.id,
            version: stored.version,
        })
    }

    /// Update node `id` from a raw JSON payload carrying the expected `ver`
    ///
    /// Returns the node as stored, with its incremented version.
    pub async fn update(&self, user: &str, id: &str, raw: &str) -> Result<Node, EngineError> {
        let draft = NodeDraft::parse_versioned(raw)?;
        let supplied = draft
            .version
            .ok_or_else(|| EngineError::MissingField("ver".into()))?;

        // version is assigned once the stored one is known
        let mut candidate = draft.into_node(id.to_string(), supplied);
        self.validate_candidate(&candidate).await?;

        let stored = self.fetch(id).await?;
        if stored.ns != candidate.ns {
            return Err(EngineError::MalformedInput(format!(
                "node {} belongs to namespace '{}' and cannot move to '{}'",
                id, stored.ns, candidate.ns
            )));
        }
        if !self.acl.has_write_permission(user, &stored).await {
            return Err(EngineError::permission_denied(Access::Write, node_resource(id)));
        }
        if !provenance::check_optimistic_version(stored.version, supplied) {
            return Err(EngineError::version_conflict(id, supplied, stored.version));
        }
        candidate.version = stored.version.checked_add(1).ok_or_else(|| {
            EngineError::internal("version increment", format!("node {} is at the maximum version", id))
        })?;

        let mut history = self.prior_history(&stored).await?;
        let entry = history
            .top()
            .map(|top| provenance::append_history(top, &candidate))
            .ok_or_else(|| EngineError::internal("history append", "empty history chain"))?;
        history.entries.push(entry);
        self.store
            .put_with_history(candidate.clone(), Some(stored.version), history)
            .await?;

        tracing::info!(node_id = %id, version = candidate.version, "node updated");
        self.emit_event(DomainEvent::NodeUpdated {
            id: id.to_string(),
            ns: candidate.ns.clone(),
            version: candidate.version,
        });
        Ok(candidate)
    }

    /// History whose latest entry records `stored`
    ///
    /// A chain that is already ahead means another writer got in first. A
    /// missing chain or one that is behind is never rebuilt.
    async fn prior_history(&self, stored: &Node) -> Result<NodeHistory, EngineError> {
        let history = self.store.get_history(&stored.id).await?;
        match history.as_ref().and_then(|h| h.top()).map(|top| top.ver) {
            Some(ver) if ver == stored.version => history
                .ok_or_else(|| EngineError::internal("history read", "history vanished")),
            Some(ver) if ver > stored.version => {
                Err(EngineError::version_conflict(&stored.id, stored.version, ver))
            }
            recorded => {
                tracing::error!(node_id = %stored.id, version = stored.version, ?recorded, "history out of step with node");
                Err(EngineError::internal(
                    "history read",
                    format!(
                        "history of node {} ends at {:?}, node is at version {}",
                        stored.id, recorded, stored.version
                    ),
                ))
            }
        }
    }

    /// Delete node `id`; refused while other nodes link to it
    pub async fn delete(&self, user: &str, id: &str) -> Result<(), EngineError> {
        let stored = self.fetch(id).await?;

        let dependents: Vec<String> = self
            .store
            .query_reverse_links(id)
            .await?
            .into_iter()
            .filter(|source| source != id)
            .collect();
        if !dependents.is_empty() {
            return Err(EngineError::DependencyConflict(format!(
                "node {} is still linked from {}",
                id,
                dependents.join(", ")
            )));
        }

        if !self.acl.has_write_permission(user, &stored).await {
            return Err(EngineError::permission_denied(Access::Write, node_resource(id)));
        }

        self.store.remove(id, stored.version).await?;
        self.store.remove_history(id).await?;

        tracing::info!(node_id = %id, ns = %stored.ns, "node deleted");
        self.emit_event(DomainEvent::NodeDeleted {
            id: id.to_string(),
            ns: stored.ns,
        });
        Ok(())
    }

    /// Current version of a node
    pub async fn get_node(&self, user: &str, id: &str) -> Result<Node, EngineError> {
        self.fetch_readable(user, id).await
    }

    /// Body of a past version; access is decided by the current ACL
    pub async fn get_node_version(&self, user: &str, id: &str, ver: i64) -> Result<Value, EngineError> {
        let history = self.get_history(user, id).await?;
        history
            .entry(ver)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| EngineError::NotFound(format!("version {} of node {}", ver, id)))
    }

    pub async fn get_history(&self, user: &str, id: &str) -> Result<NodeHistory, EngineError> {
        self.fetch_readable(user, id).await?;
        self.store
            .get_history(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("history of node {}", id)))
    }

    /// Recompute the history chain of a node
    pub async fn verify_history(&self, user: &str, id: &str) -> Result<ChainVerification, EngineError> {
        let history = self.get_history(user, id).await?;
        let verification = provenance::verify_chain(&history);
        if let ChainVerification::Broken { ver } = verification {
            tracing::warn!(node_id = %id, ver, "history chain broken");
        }
        Ok(verification)
    }

    /// Nodes of a type that `user` may read
    pub async fn list_nodes_by_type(
        &self,
        user: &str,
        ns: &str,
        node_type: &str,
    ) -> Result<Vec<Node>, EngineError> {
        if !self.schemas.contains_namespace(ns).await {
            return Err(EngineError::unknown_namespace(ns));
        }

        let mut readable = Vec::new();
        for node in self.store.query_by_type(ns, node_type).await? {
            if self.acl.has_read_permission(user, &node).await {
                readable.push(node);
            }
        }
        Ok(readable)
    }

    /// Ids of nodes linking to `id` that `user` may read
    pub async fn inbound_links(&self, user: &str, id: &str) -> Result<Vec<String>, EngineError> {
        self.fetch_readable(user, id).await?;

        let mut sources = Vec::new();
        for source_id in self.store.query_reverse_links(id).await? {
            if let Some(source) = self.store.get(&source_id).await? {
                if self.acl.has_read_permission(user, &source).await {
                    sources.push(source_id);
                }
            }
        }
        Ok(sources)
    }
}
