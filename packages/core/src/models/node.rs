//! Node Data Structures
//!
//! This module defines the `Node` record stored by the repository and the
//! `NodeDraft` produced at the JSON boundary before a node has been assigned
//! an id and version.
//!
//! # Architecture
//!
//! - **Typed boundary**: Raw client payloads are checked for every required
//!   field exactly once, in [`NodeDraft::parse`]. Nothing deeper in the
//!   pipeline ever sees a partially populated node.
//! - **Opaque metadata**: `meta` is an arbitrary JSON object; its shape is
//!   governed by the namespace schema for the node type, not by this module.
//! - **Ordered linkage**: Edge names keep their insertion order so linkage
//!   checks report violations reproducibly.
//!
//! # Examples
//!
//! ```rust
//! use metanode_core::models::NodeDraft;
//!
//! let draft = NodeDraft::parse(
//!     r#"{"ns":"test","node_type":"sample","meta":{},"linkage":{},
//!        "acl":{"read":["all"],"write":["all"]}}"#,
//! ).unwrap();
//! assert_eq!(draft.node_type, "sample");
//! assert!(draft.version.is_none());
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Outbound edges of a node: edge name → target node ids, in insertion order
pub type Linkage = IndexMap<String, Vec<String>>;

/// ACL group that matches every user without being materialized
pub const ALL_GROUP: &str = "all";

/// Validation errors raised while turning client JSON into a node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed JSON input: {0}")]
    MalformedInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl ValidationError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Read and write group lists attached to every node
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeAcl {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

impl NodeAcl {
    /// ACL granting read and write to everybody
    pub fn open() -> Self {
        Self {
            read: vec![ALL_GROUP.to_string()],
            write: vec![ALL_GROUP.to_string()],
        }
    }
}

/// A stored, versioned document.
///
/// # Fields
///
/// - `id`: Store-assigned identifier
/// - `version`: Optimistic concurrency version, serialized as `ver` (starts at 1)
/// - `ns`: Namespace owning the node
/// - `node_type`: Type name, selects the schema and linkage rules
/// - `meta`: Schema-governed metadata payload
/// - `linkage`: Named outbound edges to other node ids
/// - `acl`: Groups allowed to read and write this node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,

    #[serde(rename = "ver", alias = "version")]
    pub version: i64,

    pub ns: String,

    pub node_type: String,

    pub meta: Map<String, Value>,

    #[serde(default)]
    pub linkage: Linkage,

    pub acl: NodeAcl,
}

impl Node {
    /// Parse a full stored document (id and version required)
    pub fn from_document(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::MalformedInput("node must be a JSON object".into()))?;

        let id = match object.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => return Err(ValidationError::invalid("id", "expected a non-empty string")),
            None => return Err(ValidationError::MissingField("id".into())),
        };

        let draft = NodeDraft::from_value(value)?;
        let version = draft
            .version
            .ok_or_else(|| ValidationError::MissingField("ver".into()))?;

        Ok(draft.into_node(id, version))
    }

    /// The JSON document representation used for storage and hashing
    pub fn document(&self) -> Value {
        json!({
            "id": self.id,
            "ver": self.version,
            "ns": self.ns,
            "node_type": self.node_type,
            "meta": self.meta,
            "linkage": self.linkage,
            "acl": {
                "read": self.acl.read,
                "write": self.acl.write,
            },
        })
    }

    /// Every target id referenced by this node's linkage, in edge order
    pub fn linked_ids(&self) -> impl Iterator<Item = &str> {
        self.linkage
            .values()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Whether this node has an outbound edge to `target_id`
    pub fn links_to(&self, target_id: &str) -> bool {
        self.linked_ids().any(|id| id == target_id)
    }
}

/// A node payload that passed structural validation but has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    /// Client-supplied version; required for updates, ignored for inserts
    pub version: Option<i64>,
    pub ns: String,
    pub node_type: String,
    pub meta: Map<String, Value>,
    pub linkage: Linkage,
    pub acl: NodeAcl,
}

impl NodeDraft {
    /// Parse an insert payload
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::MalformedInput(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse an update payload; the `ver` field is mandatory
    pub fn parse_versioned(raw: &str) -> Result<Self, ValidationError> {
        let draft = Self::parse(raw)?;
        if draft.version.is_none() {
            return Err(ValidationError::MissingField("ver".into()));
        }
        Ok(draft)
    }

    /// Check required fields on an already-parsed JSON value
    ///
    /// Fields are checked in the order `ns`, `acl`, `node_type`, `meta`,
    /// `linkage` so the reported missing field is stable.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::MalformedInput("node must be a JSON object".into()))?;

        for field in ["ns", "acl", "node_type", "meta", "linkage"] {
            if !object.contains_key(field) {
                return Err(ValidationError::MissingField(field.into()));
            }
        }

        let ns = non_empty_string(object, "ns")?;
        let acl = parse_acl(&object["acl"])?;
        let node_type = non_empty_string(object, "node_type")?;

        let meta = object["meta"]
            .as_object()
            .cloned()
            .ok_or_else(|| ValidationError::invalid("meta", "expected an object"))?;

        let linkage = parse_linkage(&object["linkage"])?;

        let version = match object.get("ver").or_else(|| object.get("version")) {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_i64() {
                Some(ver) if ver >= 1 => Some(ver),
                _ => return Err(ValidationError::invalid("ver", "expected an integer >= 1")),
            },
        };

        Ok(Self {
            version,
            ns,
            node_type,
            meta,
            linkage,
            acl,
        })
    }

    /// Bind the draft to a stored identity
    pub fn into_node(self, id: String, version: i64) -> Node {
        Node {
            id,
            version,
            ns: self.ns,
            node_type: self.node_type,
            meta: self.meta,
            linkage: self.linkage,
            acl: self.acl,
        }
    }
}

fn non_empty_string(object: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(ValidationError::invalid(field, "expected a non-empty string")),
        None => Err(ValidationError::MissingField(field.into())),
    }
}

fn string_list(value: &Value, field: &str) -> Result<Vec<String>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::invalid(field, "expected a list of strings"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ValidationError::invalid(field, "expected a list of strings"))
        })
        .collect()
}

fn parse_acl(value: &Value) -> Result<NodeAcl, ValidationError> {
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::invalid("acl", "expected an object"))?;

    let read = object
        .get("read")
        .ok_or_else(|| ValidationError::MissingField("acl.read".into()))?;
    let write = object
        .get("write")
        .ok_or_else(|| ValidationError::MissingField("acl.write".into()))?;

    Ok(NodeAcl {
        read: string_list(read, "acl.read")?,
        write: string_list(write, "acl.write")?,
    })
}

fn parse_linkage(value: &Value) -> Result<Linkage, ValidationError> {
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::invalid("linkage", "expected an object"))?;

    let mut linkage = Linkage::with_capacity(object.len());
    for (edge, targets) in object {
        let field = format!("linkage.{}", edge);
        linkage.insert(edge.clone(), string_list(targets, &field)?);
    }
    Ok(linkage)
}
