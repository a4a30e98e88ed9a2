//! Storage Layer
//!
//! This module defines how the engine talks to its backing document store:
//!
//! - [`DocumentStore`] - async adapter trait (get/put/remove, reverse links, history)
//! - [`MemoryStore`] - complete in-process implementation
//! - [`DomainEvent`] - notifications emitted after successful mutations
//!
//! The engine never depends on a concrete backend; every backend-specific
//! failure is reported as [`StoreError::Backend`].

mod document_store;
mod error;
pub mod events;
mod memory_store;

pub use document_store::{DocumentStore, StoredRef};
pub use error::StoreError;
pub use events::DomainEvent;
pub use memory_store::MemoryStore;
