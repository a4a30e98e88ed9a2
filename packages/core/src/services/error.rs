//! Service Layer Error Types
//!
//! This module defines the rejection taxonomy every engine operation reports,
//! the fixed status code attached to each kind, and the errors raised while
//! loading registries from a namespace working directory.

use crate::db::StoreError;
use crate::models::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Kind of access a permission check was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

/// Engine operation errors
///
/// Validation-kind errors are raised before any store mutation. Store
/// failures the pipeline does not anticipate become `InternalError`, which
/// carries only an incident id; the underlying detail goes to the log.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Payload is not parseable JSON or has the wrong shape
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A required node field is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Namespace is not loaded by this worker
    #[error("Unknown namespace: {ns}")]
    UnknownNamespace { ns: String },

    /// Metadata does not satisfy the namespace schema for its node type
    #[error("Schema validation failed for node type '{node_type}': {message}")]
    SchemaViolation { node_type: String, message: String },

    /// A schema being registered references an aux schema that does not exist
    #[error("Schema '{schema}' references unknown auxiliary schema '{reference}'")]
    UnknownAuxiliaryReference { schema: String, reference: String },

    /// Schema name or document rejected before registration
    #[error("Invalid schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    /// An edge name or target is not permitted by the namespace linkage rules
    #[error("Invalid linkage: {reason}")]
    LinkageViolation { reason: String },

    /// Optimistic concurrency check failed
    #[error("Version conflict for node {node_id}: expected version {expected_version}, found {actual_version}")]
    VersionConflict {
        node_id: String,
        expected_version: i64,
        actual_version: i64,
    },

    /// User is not in any group the node grants this access to
    #[error("Permission denied: no {access} access to {resource}")]
    PermissionDenied { access: Access, resource: String },

    /// Node, version, schema or aux schema does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert of a schema or aux schema under a name already in use
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Removal blocked because other documents still reference the target
    #[error("Dependency conflict: {0}")]
    DependencyConflict(String),

    /// Unanticipated store or I/O failure
    #[error("Internal error (incident {incident})")]
    InternalError { incident: String },
}

impl EngineError {
    /// Create an unknown namespace error
    pub fn unknown_namespace(ns: impl Into<String>) -> Self {
        Self::UnknownNamespace { ns: ns.into() }
    }

    /// Create a linkage violation error
    pub fn linkage_violation(reason: impl Into<String>) -> Self {
        Self::LinkageViolation {
            reason: reason.into(),
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(access: Access, resource: impl Into<String>) -> Self {
        Self::PermissionDenied {
            access,
            resource: resource.into(),
        }
    }

    /// Create a version conflict error
    pub fn version_conflict(node_id: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::VersionConflict {
            node_id: node_id.into(),
            expected_version: expected,
            actual_version: actual,
        }
    }

    /// Record an unanticipated failure and return an opaque internal error
    ///
    /// The full error is logged with a fresh incident id; only the id reaches
    /// the caller.
    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        let incident = Uuid::new_v4().to_string();
        tracing::error!(%incident, context, error = %err, "internal failure");
        Self::InternalError { incident }
    }

    /// Status code reported for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::MalformedInput(_)
            | EngineError::MissingField(_)
            | EngineError::SchemaViolation { .. }
            | EngineError::UnknownAuxiliaryReference { .. }
            | EngineError::InvalidSchema { .. }
            | EngineError::LinkageViolation { .. }
            | EngineError::DependencyConflict(_) => 422,
            EngineError::UnknownNamespace { .. } | EngineError::NotFound(_) => 404,
            EngineError::PermissionDenied { .. } => 403,
            EngineError::VersionConflict { .. } | EngineError::AlreadyExists(_) => 409,
            EngineError::InternalError { .. } => 500,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MalformedInput(_) => "MALFORMED_INPUT",
            EngineError::MissingField(_) => "MISSING_FIELD",
            EngineError::UnknownNamespace { .. } => "UNKNOWN_NAMESPACE",
            EngineError::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            EngineError::UnknownAuxiliaryReference { .. } => "UNKNOWN_AUX_REFERENCE",
            EngineError::InvalidSchema { .. } => "INVALID_SCHEMA",
            EngineError::LinkageViolation { .. } => "LINKAGE_VIOLATION",
            EngineError::VersionConflict { .. } => "VERSION_CONFLICT",
            EngineError::PermissionDenied { .. } => "PERMISSION_DENIED",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::AlreadyExists(_) => "ALREADY_EXISTS",
            EngineError::DependencyConflict(_) => "DEPENDENCY_CONFLICT",
            EngineError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingField(field) => EngineError::MissingField(field),
            other => EngineError::MalformedInput(other.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => EngineError::NotFound(format!("node {}", id)),
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => EngineError::version_conflict(id, expected, actual),
            StoreError::Backend(e) => EngineError::internal("document store", e),
        }
    }
}

/// Transport-neutral rejection body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status code (403, 404, 409, 422, 500)
    pub status: u16,
    /// Machine-readable error code
    pub code: String,
    /// User-facing error message
    pub message: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            status: err.status_code(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors raised while loading registries from disk
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
