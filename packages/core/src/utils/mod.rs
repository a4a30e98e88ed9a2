//! Utility functions for Metanode Core
//!
//! This module provides common utility functions used across the codebase.

mod canonical_json;
mod names;

pub use canonical_json::to_canonical_string;
pub use names::{is_valid_registry_name, MAX_NAME_LENGTH};
