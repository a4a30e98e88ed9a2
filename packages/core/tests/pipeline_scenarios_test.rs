//! Pipeline Scenario Tests
//!
//! End-to-end walkthroughs of insert, update, delete and read against a
//! bootstrapped engine over an on-disk namespace and an in-memory store.

#[cfg(test)]
mod pipeline_scenario_tests {
    use anyhow::Result;
    use metanode_core::db::{DocumentStore, MemoryStore};
    use metanode_core::services::{Access, ChainVerification, EngineError};
    use metanode_core::{Engine, EngineConfig};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Namespace `test`: a schema for `paper`, linkage rules for `locked` and
    /// `paper`, and a `privileged` group containing bob
    async fn setup() -> Result<(Engine, Arc<MemoryStore>, TempDir)> {
        let dir = TempDir::new()?;
        let ns = dir.path().join("test");
        std::fs::create_dir_all(ns.join("schemas"))?;
        std::fs::create_dir_all(ns.join("acls"))?;
        std::fs::write(
            ns.join("schemas/paper.json"),
            r#"{"type": "object", "properties": {"title": {"type": "string"}}, "required": ["title"]}"#,
        )?;
        std::fs::write(
            ns.join("linkage.json"),
            r#"{"locked": {}, "paper": {"cites": ["paper"]}}"#,
        )?;
        std::fs::write(ns.join("acls/privileged"), "bob\n")?;

        let store = Arc::new(MemoryStore::new());
        let engine =
            Engine::bootstrap(EngineConfig::with_working_dir(dir.path()), store.clone()).await?;
        Ok((engine, store, dir))
    }

    fn node(node_type: &str, meta: Value, linkage: Value, read: &[&str]) -> Value {
        json!({
            "ns": "test",
            "node_type": node_type,
            "meta": meta,
            "linkage": linkage,
            "acl": {"read": read, "write": ["all"]}
        })
    }

    fn versioned(mut payload: Value, ver: i64) -> String {
        payload["ver"] = json!(ver);
        payload.to_string()
    }

    #[tokio::test]
    async fn test_insert_minimal_node() -> Result<()> {
        let (engine, store, _dir) = setup().await?;

        let outcome = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["all"]).to_string())
            .await?;

        assert_eq!(outcome.version, 1);
        assert_eq!(store.get_version(&outcome.id).await?, 1);
        assert_eq!(
            outcome.location,
            format!("http://localhost:8123/nodes/{}", outcome.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_uncontrolled_type_may_link_freely() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let first = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["all"]).to_string())
            .await?;

        let second = engine
            .nodes()
            .insert(
                &node("note", json!({}), json!({"connected_to": [first.id.clone()]}), &["all"])
                    .to_string(),
            )
            .await?;
        assert_eq!(second.version, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_controlled_type_without_rules_rejects_edges() -> Result<()> {
        let (engine, store, _dir) = setup().await?;
        let target = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["all"]).to_string())
            .await?;

        let err = engine
            .nodes()
            .insert(
                &node("locked", json!({}), json!({"refers": [target.id.clone()]}), &["all"]).to_string(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("linkage"));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_disallowed_target_type_leaves_store_unchanged() -> Result<()> {
        let (engine, store, _dir) = setup().await?;
        let note = engine
            .nodes()
            .insert(&node("note", json!({}), json!({}), &["all"]).to_string())
            .await?;
        let paper_payload = node("paper", json!({"title": "A"}), json!({}), &["all"]);
        let paper = engine.nodes().insert(&paper_payload.to_string()).await?;

        // insert citing a note
        let err = engine
            .nodes()
            .insert(
                &node("paper", json!({"title": "B"}), json!({"cites": [note.id.clone()]}), &["all"])
                    .to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LinkageViolation { .. }));
        assert_eq!(store.len().await, 2);

        // update citing a note
        let bad_update = node(
            "paper",
            json!({"title": "A"}),
            json!({"cites": [note.id.clone()]}),
            &["all"],
        );
        let err = engine
            .nodes()
            .update("bob", &paper.id, &versioned(bad_update, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LinkageViolation { .. }));
        let stored = engine.nodes().get_node("bob", &paper.id).await?;
        assert_eq!(stored.version, 1);
        assert!(stored.linkage.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_link_target_is_linkage_violation() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let err = engine
            .nodes()
            .insert(
                &node("paper", json!({"title": "A"}), json!({"cites": ["no-such-node"]}), &["all"])
                    .to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LINKAGE_VIOLATION");
        Ok(())
    }

    #[tokio::test]
    async fn test_schema_violation_reports_validator_message() -> Result<()> {
        let (engine, store, _dir) = setup().await?;
        let err = engine
            .nodes()
            .insert(&node("paper", json!({"title": 5}), json!({}), &["all"]).to_string())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 422);
        match err {
            EngineError::SchemaViolation { node_type, message } => {
                assert_eq!(node_type, "paper");
                assert!(!message.is_empty());
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_and_nothing_changes() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let payload = node("test", json!({"step": 1}), json!({}), &["all"]);
        let created = engine.nodes().insert(&payload.to_string()).await?;

        let v2 = node("test", json!({"step": 2}), json!({}), &["all"]);
        engine
            .nodes()
            .update("bob", &created.id, &versioned(v2, 1))
            .await?;

        let stale = node("test", json!({"step": 3}), json!({}), &["all"]);
        let err = engine
            .nodes()
            .update("bob", &created.id, &versioned(stale, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(matches!(
            err,
            EngineError::VersionConflict {
                expected_version: 1,
                actual_version: 2,
                ..
            }
        ));

        let current = engine.nodes().get_node("bob", &created.id).await?;
        assert_eq!(current.version, 2);
        assert_eq!(current.meta["step"], json!(2));
        let history = engine.nodes().get_history("bob", &created.id).await?;
        assert_eq!(history.entries.len(), 2);
        assert_eq!(
            engine.nodes().verify_history("bob", &created.id).await?,
            ChainVerification::Intact
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_blocked_until_dependents_removed() -> Result<()> {
        let (engine, store, _dir) = setup().await?;
        let a = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["all"]).to_string())
            .await?;
        let b = engine
            .nodes()
            .insert(&node("note", json!({}), json!({"about": [a.id.clone()]}), &["all"]).to_string())
            .await?;

        let err = engine.nodes().delete("bob", &a.id).await.unwrap_err();
        assert!(matches!(err, EngineError::DependencyConflict(_)));
        assert_eq!(err.status_code(), 422);
        assert_eq!(
            engine.nodes().inbound_links("bob", &a.id).await?,
            vec![b.id.clone()]
        );

        engine.nodes().delete("bob", &b.id).await?;
        engine.nodes().delete("bob", &a.id).await?;

        assert!(store.is_empty().await);
        assert!(store.get_history(&a.id).await?.is_none());
        assert!(store.get_history(&b.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_self_link_does_not_block_delete() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let created = engine
            .nodes()
            .insert(&node("note", json!({}), json!({}), &["all"]).to_string())
            .await?;
        let linked = node("note", json!({}), json!({"self": [created.id.clone()]}), &["all"]);
        engine
            .nodes()
            .update("bob", &created.id, &versioned(linked, 1))
            .await?;

        engine.nodes().delete("bob", &created.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_read_access_follows_group_reload() -> Result<()> {
        let (engine, _store, dir) = setup().await?;
        let created = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["privileged"]).to_string())
            .await?;

        let err = engine.nodes().get_node("alice", &created.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(matches!(
            err,
            EngineError::PermissionDenied {
                access: Access::Read,
                ..
            }
        ));
        assert!(engine.nodes().get_node("bob", &created.id).await.is_ok());

        std::fs::write(dir.path().join("test/acls/privileged"), "bob\nalice\n")?;
        engine.reload_acls("test").await?;

        let node = engine.nodes().get_node("alice", &created.id).await?;
        assert_eq!(node.id, created.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_permission_guards_update_and_delete() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let mut payload = node("test", json!({}), json!({}), &["all"]);
        payload["acl"]["write"] = json!(["privileged"]);
        let created = engine.nodes().insert(&payload.to_string()).await?;

        let err = engine
            .nodes()
            .update("alice", &created.id, &versioned(payload.clone(), 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::PermissionDenied {
                access: Access::Write,
                ..
            }
        ));
        let err = engine.nodes().delete("alice", &created.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        engine
            .nodes()
            .update("bob", &created.id, &versioned(payload, 1))
            .await?;
        engine.nodes().delete("bob", &created.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_by_type_filters_unreadable_nodes() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let open = engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["all"]).to_string())
            .await?;
        engine
            .nodes()
            .insert(&node("test", json!({}), json!({}), &["privileged"]).to_string())
            .await?;

        let visible = engine.nodes().list_nodes_by_type("alice", "test", "test").await?;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, open.id);

        let visible = engine.nodes().list_nodes_by_type("bob", "test", "test").await?;
        assert_eq!(visible.len(), 2);

        let err = engine
            .nodes()
            .list_nodes_by_type("bob", "other", "test")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        Ok(())
    }

    #[tokio::test]
    async fn test_input_errors_map_to_422() -> Result<()> {
        let (engine, store, _dir) = setup().await?;

        let err = engine.nodes().insert("{\"ns\": ").await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_INPUT");
        assert_eq!(err.status_code(), 422);

        let mut missing = node("test", json!({}), json!({}), &["all"]);
        if let Some(object) = missing.as_object_mut() {
            object.remove("acl");
        }
        let err = engine.nodes().insert(&missing.to_string()).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingField(ref f) if f == "acl"));
        assert_eq!(err.status_code(), 422);

        let mut bad_acl = node("test", json!({}), json!({}), &["all"]);
        bad_acl["acl"]["read"] = json!("all");
        let err = engine.nodes().insert(&bad_acl.to_string()).await.unwrap_err();
        assert_eq!(err.code(), "MALFORMED_INPUT");

        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_node_is_not_found() -> Result<()> {
        let (engine, _store, _dir) = setup().await?;
        let err = engine.nodes().get_node("bob", "nope").await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = engine.nodes().delete("bob", "nope").await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let payload = node("test", json!({}), json!({}), &["all"]);
        let err = engine
            .nodes()
            .update("bob", "nope", &versioned(payload, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        Ok(())
    }
}
