//! In-memory DocumentStore
//!
//! A complete [`DocumentStore`] kept in process memory. It maintains the
//! reverse linkage index eagerly on every write, enforces compare-and-swap on
//! versions, and can be switched into a failing mode to exercise the
//! pipeline's handling of backend outages.

use crate::db::{DocumentStore, StoreError, StoredRef};
use crate::models::{Node, NodeHistory};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<String, Node>,
    history: HashMap<String, NodeHistory>,
    /// target id → ids of nodes linking to it
    reverse: HashMap<String, BTreeSet<String>>,
}

impl MemoryState {
    fn index_links(&mut self, node: &Node) {
        for target in node.linked_ids() {
            self.reverse
                .entry(target.to_string())
                .or_default()
                .insert(node.id.clone());
        }
    }

    fn unindex_links(&mut self, node: &Node) {
        for target in node.linked_ids() {
            if let Some(sources) = self.reverse.get_mut(target) {
                sources.remove(&node.id);
                if sources.is_empty() {
                    self.reverse.remove(target);
                }
            }
        }
    }

    /// Compare-and-swap write of a node, keeping the reverse index in step
    fn write_node(
        &mut self,
        mut node: Node,
        expected_version: Option<i64>,
    ) -> Result<StoredRef, StoreError> {
        match expected_version {
            None => {
                if node.id.is_empty() {
                    node.id = Uuid::new_v4().simple().to_string();
                }
                if let Some(existing) = self.nodes.get(&node.id) {
                    return Err(StoreError::conflict(&node.id, 0, existing.version));
                }
            }
            Some(expected) => {
                let previous = self
                    .nodes
                    .get(&node.id)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found(&node.id))?;
                if previous.version != expected {
                    return Err(StoreError::conflict(&node.id, expected, previous.version));
                }
                self.unindex_links(&previous);
            }
        }

        self.index_links(&node);
        let stored = StoredRef {
            id: node.id.clone(),
            version: node.version,
        };
        self.nodes.insert(node.id.clone(), node);
        Ok(stored)
    }
}

/// Document store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a backend error (or recover)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored nodes
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "connection refused: memory store marked unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Node>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn get_version(&self, id: &str) -> Result<i64, StoreError> {
        self.check_available()?;
        self.state
            .read()
            .await
            .nodes
            .get(id)
            .map(|n| n.version)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn put(&self, node: Node, expected_version: Option<i64>) -> Result<StoredRef, StoreError> {
        self.check_available()?;
        self.state.write().await.write_node(node, expected_version)
    }

    async fn put_with_history(
        &self,
        node: Node,
        expected_version: Option<i64>,
        mut history: NodeHistory,
    ) -> Result<StoredRef, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let stored = state.write_node(node, expected_version)?;
        history.node_id = stored.id.clone();
        state.history.insert(stored.id.clone(), history);
        Ok(stored)
    }

    async fn remove(&self, id: &str, expected_version: i64) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let current = state
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))?;
        if current.version != expected_version {
            return Err(StoreError::conflict(id, expected_version, current.version));
        }

        state.unindex_links(&current);
        state.nodes.remove(id);
        Ok(())
    }

    async fn query_reverse_links(&self, target_id: &str) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .reverse
            .get(target_id)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn query_by_type(&self, ns: &str, node_type: &str) -> Result<Vec<Node>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.ns == ns && n.node_type == node_type)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn get_history(&self, node_id: &str) -> Result<Option<NodeHistory>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.history.get(node_id).cloned())
    }

    async fn put_history(&self, history: NodeHistory) -> Result<(), StoreError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .history
            .insert(history.node_id.clone(), history);
        Ok(())
    }

    async fn remove_history(&self, node_id: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.write().await.history.remove(node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Linkage, NodeAcl};
    use serde_json::Map;

    fn node(id: &str, version: i64, links: &[(&str, &[&str])]) -> Node {
        let mut linkage = Linkage::new();
        for (edge, targets) in links {
            linkage.insert(
                edge.to_string(),
                targets.iter().map(|t| t.to_string()).collect(),
            );
        }
        Node {
            id: id.to_string(),
            version,
            ns: "test".into(),
            node_type: "sample".into(),
            meta: Map::new(),
            linkage,
            acl: NodeAcl::open(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let store = MemoryStore::new();
        let stored = store.put(node("", 1, &[]), None).await.unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(stored.version, 1);
        assert_eq!(store.get_version(&stored.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let store = MemoryStore::new();
        store.put(node("a", 1, &[]), None).await.unwrap();
        store.put(node("a", 2, &[]), Some(1)).await.unwrap();

        let err = store.put(node("a", 2, &[]), Some(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 2, .. }));

        let err = store.remove("a", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        store.remove("a", 2).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_with_history_writes_nothing_on_conflict() {
        let store = MemoryStore::new();
        let first = node("a", 1, &[]);
        let history = NodeHistory {
            node_id: "a".into(),
            entries: Vec::new(),
        };
        store
            .put_with_history(first.clone(), None, history.clone())
            .await
            .unwrap();
        assert_eq!(store.get_history("a").await.unwrap(), Some(history));

        let replacement = NodeHistory {
            node_id: "a".into(),
            entries: crate::services::provenance::seed_history(&first).entries,
        };
        let err = store
            .put_with_history(node("a", 2, &[("cites", &["b"])]), Some(5), replacement)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 5, actual: 1, .. }));
        assert!(store.get_history("a").await.unwrap().unwrap().entries.is_empty());
        assert!(store.query_reverse_links("b").await.unwrap().is_empty());
        assert_eq!(store.get_version("a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reverse_index_follows_updates() {
        let store = MemoryStore::new();
        store.put(node("a", 1, &[]), None).await.unwrap();
        store.put(node("b", 1, &[("cites", &["a"])]), None).await.unwrap();
        assert_eq!(store.query_reverse_links("a").await.unwrap(), vec!["b"]);

        store.put(node("b", 2, &[]), Some(1)).await.unwrap();
        assert!(store.query_reverse_links("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get("x").await.unwrap_err(),
            StoreError::Backend(_)
        ));
        store.set_unavailable(false);
        assert!(store.get("x").await.unwrap().is_none());
    }
}
