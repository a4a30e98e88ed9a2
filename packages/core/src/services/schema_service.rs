//! Schema Management Service
//!
//! Administrative writes to a namespace's primary and auxiliary schemas.
//!
//! ## Write sequence
//!
//! 1. Validate the name
//! 2. Stage the new schema set: resolve aux references, compile validators
//! 3. Persist the document under the namespace working directory
//! 4. Install the staged set in the registry
//! 5. Publish a coherence message so sibling workers converge
//!
//! A failure in steps 1-2 leaves disk and registry untouched. Writes are
//! serialized per service so two admin changes never stage against the same
//! base.
//!
//! ## Example Usage
//!
//! ```no_run
//! # use metanode_core::services::SchemaService;
//! # use serde_json::json;
//! # async fn demo(schemas: &SchemaService) -> Result<(), Box<dyn std::error::Error>> {
//! schemas
//!     .insert_aux_schema("test", "positive", json!({"type": "integer", "minimum": 1}))
//!     .await?;
//! schemas
//!     .insert_schema(
//!         "test",
//!         "sample",
//!         json!({"type": "object", "properties": {"count": {"$ref": "positive"}}}),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::services::coherence::{ChangeType, CoherenceBus, CoherenceMessage};
use crate::services::error::EngineError;
use crate::services::schema_registry::{check_name, NamespaceSchemas, SchemaRegistry};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which of a namespace's two schema collections a change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Primary,
    Auxiliary,
}

impl SchemaKind {
    fn label(self) -> &'static str {
        match self {
            SchemaKind::Primary => "schema",
            SchemaKind::Auxiliary => "aux schema",
        }
    }
}

fn stage_change(
    current: &NamespaceSchemas,
    kind: SchemaKind,
    change: ChangeType,
    name: &str,
    document: Option<Value>,
    upsert: bool,
) -> Result<NamespaceSchemas, EngineError> {
    let exists = match kind {
        SchemaKind::Primary => current.schema(name).is_some(),
        SchemaKind::Auxiliary => current.aux_schema(name).is_some(),
    };
    let resource = || format!("{} {}", kind.label(), name);

    match (change, document) {
        (ChangeType::Deletion, _) => match kind {
            SchemaKind::Primary => current.without_schema(name),
            SchemaKind::Auxiliary => current.without_aux(name),
        },
        (ChangeType::Insertion, _) if exists && !upsert => Err(EngineError::AlreadyExists(resource())),
        (ChangeType::Update, _) if !exists && !upsert => Err(EngineError::NotFound(resource())),
        (_, Some(document)) => match kind {
            SchemaKind::Primary => current.with_schema(name, document),
            SchemaKind::Auxiliary => current.with_aux(name, document),
        },
        (_, None) => Err(EngineError::MalformedInput(format!(
            "{} change carries no document",
            resource()
        ))),
    }
}

async fn persist(path: &Path, document: &Value) -> Result<(), EngineError> {
    let text = serde_json::to_string_pretty(document)
        .map_err(|e| EngineError::internal("schema encode", e))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::internal("schema directory", e))?;
    }
    tokio::fs::write(path, text)
        .await
        .map_err(|e| EngineError::internal("schema write", e))
}

async fn unpersist(path: &Path) -> Result<(), EngineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::internal("schema remove", e)),
    }
}

/// Schema administration for every loaded namespace
pub struct SchemaService {
    registry: Arc<SchemaRegistry>,
    bus: CoherenceBus,
    write_lock: Mutex<()>,
}

impl SchemaService {
    pub fn new(registry: Arc<SchemaRegistry>, bus: CoherenceBus) -> Self {
        Self {
            registry,
            bus,
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, kind: SchemaKind, ns: &str, name: &str) -> PathBuf {
        match kind {
            SchemaKind::Primary => self.registry.schema_path(ns, name),
            SchemaKind::Auxiliary => self.registry.aux_path(ns, name),
        }
    }

    async fn write(
        &self,
        kind: SchemaKind,
        change: ChangeType,
        ns: &str,
        name: &str,
        document: Option<Value>,
    ) -> Result<(), EngineError> {
        check_name(name)?;
        let _guard = self.write_lock.lock().await;

        let staged = self
            .registry
            .stage(ns, |current| {
                stage_change(current, kind, change, name, document.clone(), false)
            })
            .await?;

        let path = self.path(kind, ns, name);
        match &document {
            Some(document) => persist(&path, document).await?,
            None => unpersist(&path).await?,
        }
        self.registry.install(ns, staged).await;
        tracing::info!(ns, name, kind = kind.label(), ?change, "schema change applied");

        self.bus.publish(match kind {
            SchemaKind::Primary => CoherenceMessage::SchemaChange {
                change,
                ns: ns.to_string(),
                name: name.to_string(),
                json: document,
                origin: None,
            },
            SchemaKind::Auxiliary => CoherenceMessage::AuxSchemaChange {
                change,
                ns: ns.to_string(),
                name: name.to_string(),
                json: document,
                origin: None,
            },
        });
        Ok(())
    }

    pub async fn insert_schema(&self, ns: &str, name: &str, schema: Value) -> Result<(), EngineError> {
        self.write(SchemaKind::Primary, ChangeType::Insertion, ns, name, Some(schema))
            .await
    }

    pub async fn update_schema(&self, ns: &str, name: &str, schema: Value) -> Result<(), EngineError> {
        self.write(SchemaKind::Primary, ChangeType::Update, ns, name, Some(schema))
            .await
    }

    pub async fn delete_schema(&self, ns: &str, name: &str) -> Result<(), EngineError> {
        self.write(SchemaKind::Primary, ChangeType::Deletion, ns, name, None)
            .await
    }

    pub async fn insert_aux_schema(&self, ns: &str, name: &str, schema: Value) -> Result<(), EngineError> {
        self.write(SchemaKind::Auxiliary, ChangeType::Insertion, ns, name, Some(schema))
            .await
    }

    pub async fn update_aux_schema(&self, ns: &str, name: &str, schema: Value) -> Result<(), EngineError> {
        self.write(SchemaKind::Auxiliary, ChangeType::Update, ns, name, Some(schema))
            .await
    }

    /// Delete an aux schema; refused while any schema references it
    pub async fn delete_aux_schema(&self, ns: &str, name: &str) -> Result<(), EngineError> {
        self.write(SchemaKind::Auxiliary, ChangeType::Deletion, ns, name, None)
            .await
    }

    async fn namespace(&self, ns: &str) -> Result<Arc<NamespaceSchemas>, EngineError> {
        self.registry
            .snapshot()
            .await
            .namespace(ns)
            .cloned()
            .ok_or_else(|| EngineError::unknown_namespace(ns))
    }

    pub async fn list_schemas(&self, ns: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.namespace(ns).await?.schema_names())
    }

    pub async fn list_aux_schemas(&self, ns: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.namespace(ns).await?.aux_names())
    }

    pub async fn get_schema(&self, ns: &str, name: &str) -> Result<Value, EngineError> {
        self.namespace(ns)
            .await?
            .schema(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("schema {}", name)))
    }

    pub async fn get_aux_schema(&self, ns: &str, name: &str) -> Result<Value, EngineError> {
        self.namespace(ns)
            .await?
            .aux_schema(name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("aux schema {}", name)))
    }

    /// Apply a schema change announced by another worker to the local cache
    ///
    /// Files are not touched; the announcing worker already persisted them.
    /// Insertions and updates are applied as upserts. ACL messages are
    /// ignored here.
    pub async fn apply_remote(&self, message: &CoherenceMessage) -> Result<(), EngineError> {
        let (kind, change, ns, name, document) = match message {
            CoherenceMessage::SchemaChange { change, ns, name, json, .. } => {
                (SchemaKind::Primary, *change, ns, name, json)
            }
            CoherenceMessage::AuxSchemaChange { change, ns, name, json, .. } => {
                (SchemaKind::Auxiliary, *change, ns, name, json)
            }
            CoherenceMessage::AclChange { .. } => return Ok(()),
        };

        let _guard = self.write_lock.lock().await;
        let staged = self
            .registry
            .stage(ns, |current| {
                stage_change(current, kind, change, name, document.clone(), true)
            })
            .await?;
        self.registry.install(ns, staged).await;
        tracing::info!(ns = %ns, name = %name, kind = kind.label(), ?change, "remote schema change applied");
        Ok(())
    }
}
