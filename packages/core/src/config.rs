//! Engine configuration
//!
//! `EngineConfig` is built once at worker start-up and shared read-only by the
//! engine. Defaults suit a local working directory; [`EngineConfig::from_env`]
//! overlays environment variables the same way the binaries read them.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default broadcast capacity for coherence messages and domain events
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Runtime configuration for one worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one sub-directory per namespace
    pub working_dir: PathBuf,

    /// Prefix used to build node Location values (`{base_url}/nodes/{id}`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// File name of the per-namespace linkage rule document
    #[serde(default = "default_linkage_file")]
    pub linkage_file: String,

    /// Capacity of the coherence broadcast channel
    #[serde(default = "default_capacity")]
    pub coherence_capacity: usize,

    /// Origin tag stamped on coherence messages emitted by this worker
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

fn default_base_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_linkage_file() -> String {
    "linkage.json".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_worker_id() -> String {
    format!("worker-{}", std::process::id())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("working"),
            base_url: default_base_url(),
            linkage_file: default_linkage_file(),
            coherence_capacity: default_capacity(),
            worker_id: default_worker_id(),
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at `working_dir`, everything else defaulted
    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with `METANODE_WORKING_DIR`, `METANODE_BASE_URL`
    /// and `METANODE_WORKER_ID`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("METANODE_WORKING_DIR") {
            config.working_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("METANODE_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(id) = env::var("METANODE_WORKER_ID") {
            config.worker_id = id;
        }
        config
    }

    /// Location value for a stored node
    pub fn node_location(&self, id: &str) -> String {
        format!("{}/nodes/{}", self.base_url.trim_end_matches('/'), id)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.working_dir.as_os_str().is_empty() {
            return Err("working_dir cannot be empty".to_string());
        }

        if self.linkage_file.is_empty() || self.linkage_file.contains(['/', '\\']) {
            return Err("linkage_file must be a plain file name".to_string());
        }

        if self.coherence_capacity == 0 {
            return Err("coherence_capacity must be greater than 0".to_string());
        }

        if self.worker_id.is_empty() {
            return Err("worker_id cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_node_location_trims_trailing_slash() {
        let mut config = EngineConfig::default();
        config.base_url = "https://repo.example.org/".into();
        assert_eq!(
            config.node_location("abc"),
            "https://repo.example.org/nodes/abc"
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.coherence_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.linkage_file = "../rules.json".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_optional_fields_deserialize_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"working_dir": "/srv/metanode"}"#).unwrap();
        assert_eq!(config.linkage_file, "linkage.json");
        assert_eq!(config.coherence_capacity, DEFAULT_CHANNEL_CAPACITY);
    }
}
