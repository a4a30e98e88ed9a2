//! Node Check Binary
//!
//! Bootstraps the namespaces of a working directory against an in-memory
//! store and runs the insert pipeline over node files, in order.
//!
//! # Usage
//!
//! ```bash
//! metanode-check ./working nodes/sample.json nodes/citing.json
//! ```
//!
//! A linkage target written as `@<file stem>` is replaced by the id assigned
//! to the earlier file with that stem, so later files can link to earlier ones.
//!
//! # Environment Variables
//!
//! - `METANODE_BASE_URL`: Prefix of printed node locations
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;

use metanode_core::db::{DocumentStore, MemoryStore};
use metanode_core::services::ErrorResponse;
use metanode_core::{Engine, EngineConfig, EngineError};
use serde_json::Value;

fn substitute_targets(payload: &mut Value, assigned: &HashMap<String, String>) {
    let Some(linkage) = payload.get_mut("linkage").and_then(Value::as_object_mut) else {
        return;
    };
    for targets in linkage.values_mut().filter_map(Value::as_array_mut) {
        for target in targets.iter_mut() {
            let replacement = target
                .as_str()
                .and_then(|t| t.strip_prefix('@'))
                .and_then(|stem| assigned.get(stem));
            if let Some(id) = replacement {
                *target = Value::String(id.clone());
            }
        }
    }
}

async fn check_file(
    engine: &Engine,
    path: &Path,
    assigned: &HashMap<String, String>,
) -> anyhow::Result<Result<(String, String), EngineError>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let raw = match serde_json::from_str::<Value>(&raw) {
        Ok(mut payload) => {
            substitute_targets(&mut payload, assigned);
            payload.to_string()
        }
        // let the pipeline report the parse failure
        Err(_) => raw,
    };
    Ok(engine
        .nodes()
        .insert(&raw)
        .await
        .map(|outcome| (outcome.id, outcome.location)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let working_dir = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: metanode-check <working_dir> <node.json>..."))?;
    let files: Vec<String> = args.collect();

    let mut config = EngineConfig::from_env();
    config.working_dir = working_dir.into();

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = Engine::bootstrap(config, store).await?;
    tracing::info!(namespaces = ?engine.namespaces(), "working directory loaded");

    let mut assigned = HashMap::new();
    let mut failures = 0usize;
    for file in &files {
        let path = Path::new(file);
        match check_file(&engine, path, &assigned).await? {
            Ok((id, location)) => {
                println!("{} 201 {}", file, location);
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    assigned.insert(stem.to_string(), id);
                }
            }
            Err(err) => {
                failures += 1;
                let body = ErrorResponse::from(&err);
                println!("{} {} {}", file, body.status, serde_json::to_string(&body)?);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} nodes rejected", failures, files.len());
    }
    Ok(())
}
