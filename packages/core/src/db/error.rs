//! Document Store Error Types
//!
//! This module defines the errors a document store adapter may report. Only
//! `NotFound` and `Conflict` carry meaning for the validation pipeline; every
//! other failure is opaque and surfaces to callers as an internal error.

use thiserror::Error;

/// Document store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Document does not exist
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// Compare-and-swap rejected the write: the stored revision moved on
    #[error("Revision conflict for {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    /// Any other backend failure (connection, corruption, ...)
    #[error("Store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a revision conflict error
    pub fn conflict(id: impl Into<String>, expected: i64, actual: i64) -> Self {
        Self::Conflict {
            id: id.into(),
            expected,
            actual,
        }
    }
}
