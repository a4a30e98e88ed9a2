//! Access Control Registry
//!
//! Group membership per namespace, read from `<working_dir>/<ns>/acls/<group>`
//! files holding one username per line. A node grants read or write access
//! by listing group names in `acl.read` / `acl.write`; the group `"all"`
//! matches every user and is never stored as membership.

use crate::models::{Node, NodeAcl, ValidationError, ALL_GROUP};
use crate::services::error::{Access, RegistryError};
use crate::services::registry::RegistryHandle;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Directory (inside a namespace) holding group membership files
pub const ACL_DIR: &str = "acls";

/// Group name → members, for one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTable {
    groups: HashMap<String, BTreeSet<String>>,
}

impl GroupTable {
    pub fn is_member(&self, group: &str, user: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(user))
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether any of `groups` admits `user`
    pub fn grants(&self, groups: &[String], user: &str) -> bool {
        groups
            .iter()
            .any(|group| group == ALL_GROUP || self.is_member(group, user))
    }

    fn with_group(&self, group: &str, members: BTreeSet<String>) -> Self {
        let mut next = self.clone();
        next.groups.insert(group.to_string(), members);
        next
    }
}

/// Normalize a membership list
///
/// Entries are trimmed; blank lines, the literal `all`, and entries with inner
/// whitespace are dropped. The result is deduplicated.
pub fn parse_members<'a>(lines: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|member| !member.is_empty())
        .filter(|member| *member != ALL_GROUP)
        .filter(|member| !member.contains(char::is_whitespace))
        .map(str::to_string)
        .collect()
}

/// Per-namespace ACL group tables
pub struct AccessControl {
    working_dir: PathBuf,
    tables: RegistryHandle<HashMap<String, Arc<GroupTable>>>,
}

impl AccessControl {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            tables: RegistryHandle::default(),
        }
    }

    /// Read every group file of a namespace and replace its table
    pub async fn load(&self, ns: &str) -> Result<(), RegistryError> {
        let dir = self.working_dir.join(ns).join(ACL_DIR);
        let mut table = GroupTable::default();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RegistryError::io(&dir, e)),
        };

        if let Some(entries) = entries.as_mut() {
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| RegistryError::io(&dir, e))?
            {
                let path = entry.path();
                let Some(group) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if group.starts_with('.') {
                    continue;
                }
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| RegistryError::io(&path, e))?;
                if !file_type.is_file() {
                    continue;
                }

                let text = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| RegistryError::io(&path, e))?;
                table.groups.insert(group, parse_members(text.lines()));
            }
        }

        tracing::info!(ns, groups = table.groups.len(), "loaded ACL groups");
        self.install(ns, table).await;
        Ok(())
    }

    async fn install(&self, ns: &str, table: GroupTable) {
        let table = Arc::new(table);
        self.tables
            .modify(|current| {
                let mut next = current.clone();
                next.insert(ns.to_string(), table);
                next
            })
            .await;
    }

    /// Replace one group's membership in memory
    pub async fn set_group<'a>(
        &self,
        ns: &str,
        group: &str,
        members: impl IntoIterator<Item = &'a str>,
    ) {
        let members = parse_members(members);
        self.tables
            .modify(|current| {
                let mut next = current.clone();
                let table = next.get(ns).map(|t| t.with_group(group, members.clone()));
                let table = table.unwrap_or_else(|| GroupTable::default().with_group(group, members));
                next.insert(ns.to_string(), Arc::new(table));
                next
            })
            .await;
    }

    pub async fn table(&self, ns: &str) -> Option<Arc<GroupTable>> {
        self.tables.snapshot().await.get(ns).cloned()
    }

    pub async fn members(&self, ns: &str, group: &str) -> Vec<String> {
        self.table(ns)
            .await
            .map(|table| table.members(group))
            .unwrap_or_default()
    }

    async fn grants(&self, ns: &str, groups: &[String], user: &str) -> bool {
        if groups.iter().any(|g| g == ALL_GROUP) {
            return true;
        }
        match self.table(ns).await {
            Some(table) => table.grants(groups, user),
            None => false,
        }
    }

    pub async fn has_read_permission(&self, user: &str, node: &Node) -> bool {
        self.grants(&node.ns, &node.acl.read, user).await
    }

    pub async fn has_write_permission(&self, user: &str, node: &Node) -> bool {
        self.grants(&node.ns, &node.acl.write, user).await
    }

    /// Permission check on a raw document
    ///
    /// The document must carry `ns`, `node_type`, `acl` and `linkage`; anything
    /// less is rejected before membership is consulted.
    pub async fn check_document_permission(
        &self,
        user: &str,
        document: &Value,
        access: Access,
    ) -> Result<bool, ValidationError> {
        let object = document
            .as_object()
            .ok_or_else(|| ValidationError::MalformedInput("node must be a JSON object".into()))?;
        for field in ["ns", "node_type", "acl", "linkage"] {
            if !object.contains_key(field) {
                return Err(ValidationError::MissingField(field.into()));
            }
        }

        let ns = object["ns"].as_str().ok_or_else(|| ValidationError::InvalidField {
            field: "ns".into(),
            reason: "expected a string".into(),
        })?;
        let acl: NodeAcl =
            serde_json::from_value(object["acl"].clone()).map_err(|e| ValidationError::InvalidField {
                field: "acl".into(),
                reason: e.to_string(),
            })?;

        let groups = match access {
            Access::Read => &acl.read,
            Access::Write => &acl.write,
        };
        Ok(self.grants(ns, groups, user).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Linkage;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn node_with_acl(read: &[&str], write: &[&str]) -> Node {
        Node {
            id: "n1".into(),
            version: 1,
            ns: "test".into(),
            node_type: "sample".into(),
            meta: Map::new(),
            linkage: Linkage::new(),
            acl: NodeAcl {
                read: read.iter().map(|s| s.to_string()).collect(),
                write: write.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_member_list_filtering() {
        let members = parse_members(["alice", "  bob  ", "", "all", "eve mallory", "alice", "\t"]);
        assert_eq!(
            members.into_iter().collect::<Vec<_>>(),
            vec!["alice".to_string(), "bob".to_string()]
        );
    }

    #[tokio::test]
    async fn test_all_matches_everyone() {
        let acl = AccessControl::new("unused");
        let node = node_with_acl(&["all"], &[]);
        assert!(acl.has_read_permission("anyone", &node).await);
        assert!(!acl.has_write_permission("anyone", &node).await);
    }

    #[tokio::test]
    async fn test_group_membership_grants_access() {
        let acl = AccessControl::new("unused");
        acl.set_group("test", "privileged", ["alice"]).await;
        let node = node_with_acl(&["privileged"], &["editors"]);

        assert!(acl.has_read_permission("alice", &node).await);
        assert!(!acl.has_read_permission("bob", &node).await);
        assert!(!acl.has_write_permission("alice", &node).await);
    }

    #[tokio::test]
    async fn test_load_reads_group_files() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let acls = dir.path().join("test").join(ACL_DIR);
        std::fs::create_dir_all(&acls)?;
        std::fs::write(acls.join("privileged"), "alice\nbob\n\nall\n")?;
        std::fs::write(acls.join(".hidden"), "mallory\n")?;

        let acl = AccessControl::new(dir.path());
        acl.load("test").await?;

        assert_eq!(acl.members("test", "privileged").await, vec!["alice", "bob"]);
        let table = acl.table("test").await.expect("table loaded");
        assert_eq!(table.group_names(), vec!["privileged"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_members() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let acls = dir.path().join("test").join(ACL_DIR);
        std::fs::create_dir_all(&acls)?;
        std::fs::write(acls.join("privileged"), "bob\n")?;

        let acl = AccessControl::new(dir.path());
        acl.load("test").await?;
        let node = node_with_acl(&["privileged"], &[]);
        assert!(!acl.has_read_permission("alice", &node).await);

        std::fs::write(acls.join("privileged"), "bob\nalice\n")?;
        acl.load("test").await?;
        assert!(acl.has_read_permission("alice", &node).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_document_check_requires_structure() {
        let acl = AccessControl::new("unused");
        let incomplete = json!({"ns": "test", "acl": {"read": ["all"], "write": []}});
        let err = acl
            .check_document_permission("alice", &incomplete, Access::Read)
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("node_type".into()));

        let complete = json!({
            "ns": "test",
            "node_type": "sample",
            "linkage": {},
            "acl": {"read": ["all"], "write": []}
        });
        assert!(acl
            .check_document_permission("alice", &complete, Access::Read)
            .await
            .unwrap());
        assert!(!acl
            .check_document_permission("alice", &complete, Access::Write)
            .await
            .unwrap());
    }
}
