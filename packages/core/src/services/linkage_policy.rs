//! Linkage Policy
//!
//! Per-namespace rules restricting which edge names a node type may use and
//! which node types those edges may point at. The rule document lives at
//! `<working_dir>/<ns>/<linkage_file>` and has the shape
//!
//! ```json
//! { "sample": { "cites": ["paper", "dataset"], "*": ["*"] },
//!   "*":      { "related": ["*"] } }
//! ```
//!
//! Both the node-type key and the edge-name key accept `"*"`. An exact key
//! always wins over `"*"`. A node type matched by neither is uncontrolled and
//! its edges are not checked.

use crate::db::{DocumentStore, StoreError};
use crate::models::Node;
use crate::services::error::RegistryError;
use crate::services::registry::RegistryHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Wildcard accepted in every rule position
pub const WILDCARD: &str = "*";

type EdgeRules = HashMap<String, BTreeSet<String>>;

/// Linkage rule table of one namespace: node type → edge name → allowed target types
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkageRules(HashMap<String, EdgeRules>);

impl LinkageRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; creates the node-type entry if needed
    pub fn allow(mut self, node_type: &str, edge: &str, targets: &[&str]) -> Self {
        self.0
            .entry(node_type.to_string())
            .or_default()
            .entry(edge.to_string())
            .or_default()
            .extend(targets.iter().map(|t| t.to_string()));
        self
    }

    /// Mark a node type as controlled without permitting any edge
    pub fn control(mut self, node_type: &str) -> Self {
        self.0.entry(node_type.to_string()).or_default();
        self
    }

    /// Rules governing `node_type`, falling back to the `"*"` entry
    pub fn governing(&self, node_type: &str) -> Option<&EdgeRules> {
        self.0.get(node_type).or_else(|| self.0.get(WILDCARD))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a linkage check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkageDecision {
    /// No rule entry applies to the node type; edges were not inspected
    Uncontrolled,
    Accepted,
    /// The first violation found, in edge then target order
    Rejected(String),
}

impl LinkageDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, LinkageDecision::Rejected(_))
    }
}

/// Check `node`'s outbound edges against `rules`
///
/// Targets are fetched one at a time. Only store failures are errors; a
/// missing target is a rejection.
pub async fn check_linkage(
    rules: &LinkageRules,
    store: &dyn DocumentStore,
    node: &Node,
) -> Result<LinkageDecision, StoreError> {
    let Some(edge_rules) = rules.governing(&node.node_type) else {
        return Ok(LinkageDecision::Uncontrolled);
    };

    for (edge, targets) in &node.linkage {
        let Some(allowed) = edge_rules.get(edge).or_else(|| edge_rules.get(WILDCARD)) else {
            return Ok(LinkageDecision::Rejected(format!(
                "linkage edge '{}' is not permitted for node type '{}'",
                edge, node.node_type
            )));
        };
        if allowed.contains(WILDCARD) {
            continue;
        }

        for target_id in targets {
            let target = match store.get(target_id).await? {
                Some(target) => target,
                None => {
                    return Ok(LinkageDecision::Rejected(format!(
                        "linkage target '{}' of edge '{}' does not exist",
                        target_id, edge
                    )))
                }
            };
            if !allowed.contains(&target.node_type) {
                return Ok(LinkageDecision::Rejected(format!(
                    "linkage edge '{}' may not target node type '{}' (node '{}')",
                    edge, target.node_type, target_id
                )));
            }
        }
    }

    Ok(LinkageDecision::Accepted)
}

/// Linkage rule tables for every loaded namespace
pub struct LinkagePolicy {
    working_dir: PathBuf,
    linkage_file: String,
    rules: RegistryHandle<HashMap<String, Arc<LinkageRules>>>,
}

impl LinkagePolicy {
    pub fn new(working_dir: impl Into<PathBuf>, linkage_file: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            linkage_file: linkage_file.into(),
            rules: RegistryHandle::default(),
        }
    }

    /// Read the namespace rule document; a missing document means no rules
    pub async fn load(&self, ns: &str) -> Result<(), RegistryError> {
        let path = self.working_dir.join(ns).join(&self.linkage_file);
        let rules = match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                serde_json::from_str::<LinkageRules>(&text).map_err(|e| RegistryError::json(&path, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(ns, "no linkage rules; every node type is uncontrolled");
                LinkageRules::default()
            }
            Err(e) => return Err(RegistryError::io(&path, e)),
        };

        tracing::info!(ns, node_types = rules.0.len(), "loaded linkage rules");
        self.set_rules(ns, rules).await;
        Ok(())
    }

    /// Replace a namespace's rule table
    pub async fn set_rules(&self, ns: &str, rules: LinkageRules) {
        let rules = Arc::new(rules);
        self.rules
            .modify(|current| {
                let mut next = current.clone();
                next.insert(ns.to_string(), rules);
                next
            })
            .await;
    }

    pub async fn rules_for(&self, ns: &str) -> Option<Arc<LinkageRules>> {
        self.rules.snapshot().await.get(ns).cloned()
    }

    /// Check a node against its namespace's rules
    pub async fn validate_linkage(
        &self,
        store: &dyn DocumentStore,
        node: &Node,
    ) -> Result<LinkageDecision, StoreError> {
        match self.rules_for(&node.ns).await {
            Some(rules) => check_linkage(&rules, store, node).await,
            None => Ok(LinkageDecision::Uncontrolled),
        }
    }
}
