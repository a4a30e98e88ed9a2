//! Worker bootstrap and wiring
//!
//! [`Engine`] owns one worker's registries and services. It is built once by
//! [`Engine::bootstrap`], which discovers the namespaces under the working
//! directory and loads the schema, linkage and ACL registries of every
//! namespace concurrently. The first load failure aborts the bootstrap.

use crate::config::EngineConfig;
use crate::db::DocumentStore;
use crate::services::{
    AccessControl, CoherenceBus, CoherenceMessage, EngineError, LinkagePolicy, NodeService,
    RegistryError, SchemaRegistry, SchemaService,
};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// One worker's registries, services and coherence handle
pub struct Engine {
    config: Arc<EngineConfig>,
    schemas: Arc<SchemaRegistry>,
    linkage: Arc<LinkagePolicy>,
    acl: Arc<AccessControl>,
    nodes: NodeService,
    schema_admin: SchemaService,
    bus: CoherenceBus,
    namespaces: Vec<String>,
}

impl Engine {
    /// Build a worker with its own coherence channel
    pub async fn bootstrap(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, RegistryError> {
        // a zero capacity would panic inside the channel constructor
        config.validate().map_err(RegistryError::Config)?;
        let bus = CoherenceBus::new(config.coherence_capacity, config.worker_id.clone());
        Self::bootstrap_with_bus(config, store, bus).await
    }

    /// Build a worker on an existing coherence channel
    ///
    /// Messages this worker publishes are stamped with the bus's worker id.
    pub async fn bootstrap_with_bus(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        bus: CoherenceBus,
    ) -> Result<Self, RegistryError> {
        config.validate().map_err(RegistryError::Config)?;
        let config = Arc::new(config);

        let schemas = Arc::new(SchemaRegistry::new(&config.working_dir));
        let linkage = Arc::new(LinkagePolicy::new(
            &config.working_dir,
            config.linkage_file.clone(),
        ));
        let acl = Arc::new(AccessControl::new(&config.working_dir));

        let namespaces = discover_namespaces(&config.working_dir).await?;
        try_join_all(
            namespaces
                .iter()
                .map(|ns| load_namespace(&schemas, &linkage, &acl, ns)),
        )
        .await?;
        tracing::info!(
            worker = bus.worker_id(),
            namespaces = namespaces.len(),
            "engine bootstrapped"
        );

        let nodes = NodeService::new(
            store,
            schemas.clone(),
            linkage.clone(),
            acl.clone(),
            config.clone(),
        );
        let schema_admin = SchemaService::new(schemas.clone(), bus.clone());

        Ok(Self {
            config,
            schemas,
            linkage,
            acl,
            nodes,
            schema_admin,
            bus,
            namespaces,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Node pipeline and reads
    pub fn nodes(&self) -> &NodeService {
        &self.nodes
    }

    /// Schema administration
    pub fn schemas(&self) -> &SchemaService {
        &self.schema_admin
    }

    pub fn schema_registry(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn linkage(&self) -> &Arc<LinkagePolicy> {
        &self.linkage
    }

    pub fn access_control(&self) -> &Arc<AccessControl> {
        &self.acl
    }

    pub fn bus(&self) -> &CoherenceBus {
        &self.bus
    }

    /// Namespaces found at bootstrap, sorted
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Re-read one namespace's group files and tell sibling workers
    pub async fn reload_acls(&self, ns: &str) -> Result<(), RegistryError> {
        self.acl.load(ns).await?;
        self.bus.publish(CoherenceMessage::AclChange {
            ns: ns.to_string(),
            origin: None,
        });
        Ok(())
    }

    /// Re-read every registry of every namespace from disk
    pub async fn reload_all(&self) -> Result<(), RegistryError> {
        try_join_all(
            self.namespaces
                .iter()
                .map(|ns| load_namespace(&self.schemas, &self.linkage, &self.acl, ns)),
        )
        .await?;
        Ok(())
    }

    /// Apply a message received from the coherence channel
    ///
    /// Messages stamped with this worker's id are skipped.
    pub async fn apply_coherence(&self, message: &CoherenceMessage) -> Result<(), EngineError> {
        if self.bus.is_own(message) {
            tracing::trace!(cmd = message.cmd(), "skipping own coherence message");
            return Ok(());
        }

        tracing::debug!(cmd = message.cmd(), ns = message.ns(), origin = ?message.origin(), "applying coherence message");
        match message {
            CoherenceMessage::AclChange { ns, .. } => self
                .acl
                .load(ns)
                .await
                .map_err(|e| EngineError::internal("acl reload", e)),
            CoherenceMessage::SchemaChange { .. } | CoherenceMessage::AuxSchemaChange { .. } => {
                self.schema_admin.apply_remote(message).await
            }
        }
    }

    /// Follow the coherence channel until it closes
    ///
    /// A listener that falls behind the channel reloads every registry from
    /// disk instead of replaying the messages it missed.
    pub fn spawn_coherence_listener(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        if let Err(e) = self.apply_coherence(&message).await {
                            tracing::warn!(cmd = message.cmd(), ns = message.ns(), error = %e, "coherence message not applied");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "coherence listener lagged; reloading registries");
                        if let Err(e) = self.reload_all().await {
                            tracing::error!(error = %e, "registry reload failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn load_namespace(
    schemas: &SchemaRegistry,
    linkage: &LinkagePolicy,
    acl: &AccessControl,
    ns: &str,
) -> Result<(), RegistryError> {
    tokio::try_join!(schemas.load(ns), linkage.load(ns), acl.load(ns))?;
    tracing::debug!(ns, "namespace registries loaded");
    Ok(())
}

/// Sub-directories of the working directory, excluding hidden ones
async fn discover_namespaces(working_dir: &Path) -> Result<Vec<String>, RegistryError> {
    let mut entries = tokio::fs::read_dir(working_dir)
        .await
        .map_err(|e| RegistryError::io(working_dir, e))?;

    let mut namespaces = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RegistryError::io(working_dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| RegistryError::io(&path, e))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if !name.starts_with('.') => namespaces.push(name.to_string()),
            _ => {}
        }
    }
    namespaces.sort();
    Ok(namespaces)
}
