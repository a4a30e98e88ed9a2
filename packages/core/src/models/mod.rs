//! Data Models
//!
//! This module contains the core data structures used throughout Metanode:
//!
//! - `Node` - Versioned, namespace-scoped document
//! - `NodeDraft` - Structurally validated payload awaiting storage
//! - `NodeHistory` - Hash-chained version history of a node

mod history;
mod node;

pub use history::{HistoryEntry, NodeHistory};
pub use node::{Linkage, Node, NodeAcl, NodeDraft, ValidationError, ALL_GROUP};
