//! Business Services
//!
//! This module contains the document-integrity engine:
//!
//! - `NodeService` - Insert/update/delete pipeline and ACL-checked reads
//! - `SchemaRegistry` - Per-namespace schemas with auxiliary `$ref` resolution
//! - `LinkagePolicy` - Edge-name and target-type rules per node type
//! - `AccessControl` - Group membership and read/write permission checks
//! - `provenance` - Hash-chained version history
//! - `SchemaService` - Schema administration with cross-worker coherence
//!
//! Registries are read on every validation and replaced wholesale on change,
//! so a validation always sees one consistent registry version.

pub mod access_control;
pub mod coherence;
pub mod error;
pub mod linkage_policy;
pub mod node_service;
pub mod provenance;
pub mod registry;
pub mod schema_registry;
pub mod schema_service;

pub use access_control::{AccessControl, GroupTable};
pub use coherence::{ChangeType, CoherenceBus, CoherenceMessage};
pub use error::{Access, EngineError, ErrorResponse, RegistryError};
pub use linkage_policy::{LinkageDecision, LinkagePolicy, LinkageRules};
pub use node_service::{InsertOutcome, NodeService};
pub use provenance::ChainVerification;
pub use registry::RegistryHandle;
pub use schema_registry::{SchemaRegistry, ValidationReport};
pub use schema_service::{SchemaKind, SchemaService};
