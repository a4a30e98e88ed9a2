//! Metanode Core - Document Integrity Engine
//!
//! This crate provides the validation and versioning pipeline of a
//! namespace-partitioned repository for scientific metadata nodes.
//!
//! # Architecture
//!
//! - **Namespaces**: Each namespace carries its own schemas, linkage rules and
//!   ACL groups, loaded from `<working_dir>/<ns>/` at start-up
//! - **Typed boundary**: Client JSON becomes a [`models::NodeDraft`] once, with
//!   every required field checked
//! - **Hash-chained history**: Every version is bound to its predecessor by
//!   SHA-256 over canonical JSON
//! - **Optimistic concurrency**: Updates carry the version they were based on;
//!   the store's compare-and-swap is authoritative
//! - **Replace-not-mutate registries**: Reloads swap a complete registry in,
//!   relayed across workers over a coherence channel
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeDraft, NodeHistory)
//! - [`services`] - Pipeline, registries, schema administration
//! - [`db`] - Document store adapter trait and in-memory implementation
//! - [`engine`] - Worker bootstrap and coherence listener
//! - [`config`] - Engine configuration
//! - [`utils`] - Canonical JSON and registry name rules

pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::Engine;
pub use models::*;
pub use services::*;
