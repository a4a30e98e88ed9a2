//! Name rules shared by schema and auxiliary schema registries

use regex::Regex;
use std::sync::LazyLock;

/// Longest accepted schema or auxiliary schema name
pub const MAX_NAME_LENGTH: usize = 32;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Whether `name` is acceptable as a schema or aux schema name
///
/// # Examples
///
/// ```
/// use metanode_core::utils::is_valid_registry_name;
///
/// assert!(is_valid_registry_name("abc_DEF-123"));
/// assert!(!is_valid_registry_name("has space"));
/// ```
pub fn is_valid_registry_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LENGTH && NAME_RE.is_match(name)
}
