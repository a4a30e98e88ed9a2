//! Schema Registry
//!
//! Holds, per namespace, the primary JSON Schemas (one per node type) and the
//! auxiliary schema fragments they reference through `$ref`, plus a compiled
//! validator for every primary schema.
//!
//! # Auxiliary references
//!
//! A `$ref` whose value is a bare name (`"positive_int"`, optionally with a
//! `.json` suffix or a `#/...` fragment) refers to the auxiliary schema of that
//! name in the same namespace. Refs starting with `#` are internal and refs
//! containing `:` are absolute URIs; neither is treated as auxiliary.
//!
//! Before a schema is registered, its aux references are resolved
//! recursively with an explicit visited set, so every aux schema in the
//! reference graph is loaded at most once even when the graph has diamonds or
//! cycles. An unknown reference rejects the registration outright; nothing is
//! partially registered.
//!
//! # Concurrency
//!
//! The catalog is swapped as a whole ([`RegistryHandle`]); a validation works
//! on one snapshot from start to finish.

use crate::services::error::{EngineError, RegistryError};
use crate::services::registry::RegistryHandle;
use crate::utils::{is_valid_registry_name, MAX_NAME_LENGTH};
use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Directory (inside a namespace) holding primary schemas
pub const SCHEMA_DIR: &str = "schemas";

/// Directory (inside a namespace) holding auxiliary schemas
pub const AUX_DIR: &str = "aux";

/// Base URI aux documents are registered under when compiling validators
const AUX_BASE_URI: &str = "https://schemas.metanode.local/aux/";

/// Every `$ref` value found anywhere in a schema document
///
/// Both object members and array elements are searched, at any depth.
///
/// # Examples
///
/// ```
/// use metanode_core::services::schema_registry::extract_refs;
/// use serde_json::json;
///
/// let schema = json!({
///     "properties": {"a": {"$ref": "alpha"}},
///     "anyOf": [{"$ref": "beta"}, {"type": "null"}]
/// });
/// let mut refs = extract_refs(&schema);
/// refs.sort();
/// assert_eq!(refs, vec!["alpha", "beta"]);
/// ```
pub fn extract_refs(schema: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs(schema, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => refs.push(reference.clone()),
                    _ => collect_refs(child, refs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        _ => {}
    }
}

/// Name of the auxiliary schema a `$ref` points at, if it points at one
pub fn aux_reference(reference: &str) -> Option<&str> {
    if reference.starts_with('#') || reference.contains(':') {
        return None;
    }
    let name = reference.split('#').next().unwrap_or(reference);
    let name = name.strip_suffix(".json").unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn aux_uri(name: &str) -> String {
    format!("{}{}.json", AUX_BASE_URI, name)
}

/// Copy of `value` with aux `$ref`s rewritten to the URIs they are compiled under
fn qualify_refs(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| {
                    let child = match (key.as_str(), child) {
                        ("$ref", Value::String(reference)) => match aux_reference(reference) {
                            Some(name) => {
                                let fragment = reference.find('#').map_or("", |i| &reference[i..]);
                                Value::String(format!("{}{}", aux_uri(name), fragment))
                            }
                            None => child.clone(),
                        },
                        _ => qualify_refs(child),
                    };
                    (key.clone(), child)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(qualify_refs).collect()),
        other => other.clone(),
    }
}

/// A `$ref` named an aux schema that is not registered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown auxiliary schema '{0}'")]
pub struct UnknownAuxSchema(pub String);

/// State threaded through aux resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxResolution {
    /// Aux schemas already entered; each is entered at most once
    pub visited: BTreeSet<String>,
    /// Aux schemas in dependency-first order
    pub load_order: Vec<String>,
}

/// Resolve the aux schemas reachable from `refs`
///
/// Takes the resolution state so far and returns the extended state. An aux
/// schema already in `visited` is not entered again, which makes the walk
/// terminate on cyclic reference graphs.
pub fn resolve_aux_refs(
    refs: &[String],
    catalog: &BTreeMap<String, Value>,
    resolution: AuxResolution,
) -> Result<AuxResolution, UnknownAuxSchema> {
    refs.iter()
        .filter_map(|reference| aux_reference(reference))
        .try_fold(resolution, |acc, name| resolve_aux(name, catalog, acc))
}

fn resolve_aux(
    name: &str,
    catalog: &BTreeMap<String, Value>,
    mut resolution: AuxResolution,
) -> Result<AuxResolution, UnknownAuxSchema> {
    if resolution.visited.contains(name) {
        return Ok(resolution);
    }
    let schema = catalog
        .get(name)
        .ok_or_else(|| UnknownAuxSchema(name.to_string()))?;

    resolution.visited.insert(name.to_string());
    let mut resolution = resolve_aux_refs(&extract_refs(schema), catalog, resolution)?;
    resolution.load_order.push(name.to_string());
    Ok(resolution)
}

/// Outcome of validating a metadata payload against a registered schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub node_type: String,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first validator message, which is what callers are shown
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

pub(crate) fn check_name(name: &str) -> Result<(), EngineError> {
    if is_valid_registry_name(name) {
        Ok(())
    } else {
        Err(EngineError::invalid_schema(
            name,
            format!(
                "names must be 1-{} characters from [A-Za-z0-9_-]",
                MAX_NAME_LENGTH
            ),
        ))
    }
}

fn check_document(name: &str, schema: &Value) -> Result<(), EngineError> {
    if schema.is_object() {
        Ok(())
    } else {
        Err(EngineError::invalid_schema(
            name,
            "schema document must be a JSON object",
        ))
    }
}

/// Schemas of one namespace together with their compiled validators
#[derive(Clone, Default)]
pub struct NamespaceSchemas {
    primaries: BTreeMap<String, Value>,
    aux: BTreeMap<String, Value>,
    validators: HashMap<String, Arc<JSONSchema>>,
}

impl fmt::Debug for NamespaceSchemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceSchemas")
            .field("primaries", &self.primaries.keys().collect::<Vec<_>>())
            .field("aux", &self.aux.keys().collect::<Vec<_>>())
            .field("compiled", &self.validators.len())
            .finish()
    }
}

impl NamespaceSchemas {
    /// Build from documents read from disk
    ///
    /// Aux schemas whose references cannot be resolved are dropped until the
    /// remaining set is closed; primaries that fail resolution or compilation
    /// are left unregistered. Every drop is logged.
    pub fn from_documents(
        ns: &str,
        primaries: BTreeMap<String, Value>,
        mut aux: BTreeMap<String, Value>,
    ) -> Self {
        loop {
            let broken: Vec<(String, UnknownAuxSchema)> = aux
                .iter()
                .filter_map(|(name, schema)| {
                    resolve_aux_refs(&extract_refs(schema), &aux, AuxResolution::default())
                        .err()
                        .map(|missing| (name.clone(), missing))
                })
                .collect();
            if broken.is_empty() {
                break;
            }
            for (name, missing) in broken {
                tracing::error!(ns, aux = %name, error = %missing, "auxiliary schema not registered");
                aux.remove(&name);
            }
        }

        let mut schemas = Self {
            primaries: BTreeMap::new(),
            aux,
            validators: HashMap::new(),
        };
        for (name, schema) in primaries {
            match schemas.compile(&name, &schema) {
                Ok(validator) => {
                    schemas.validators.insert(name.clone(), Arc::new(validator));
                    schemas.primaries.insert(name, schema);
                }
                Err(e) => tracing::error!(ns, schema = %name, error = %e, "schema not registered"),
            }
        }
        schemas
    }

    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.primaries.get(name)
    }

    pub fn aux_schema(&self, name: &str) -> Option<&Value> {
        self.aux.get(name)
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.primaries.keys().cloned().collect()
    }

    pub fn aux_names(&self) -> Vec<String> {
        self.aux.keys().cloned().collect()
    }

    /// Validate `meta` against the schema for `node_type`
    ///
    /// `None` means no schema is registered for the type, which is a pass.
    pub fn validate(&self, node_type: &str, meta: &Value) -> Option<ValidationReport> {
        let validator = self.validators.get(node_type)?;
        let errors = match validator.validate(meta) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        };
        Some(ValidationReport {
            node_type: node_type.to_string(),
            errors,
        })
    }

    /// Schemas (primary or aux, other than `aux_name` itself) whose refs name `aux_name`
    pub fn aux_dependents(&self, aux_name: &str) -> Vec<String> {
        let uses = |schema: &Value| {
            extract_refs(schema)
                .iter()
                .any(|r| aux_reference(r) == Some(aux_name))
        };

        let primaries = self
            .primaries
            .iter()
            .filter(|(_, schema)| uses(schema))
            .map(|(name, _)| format!("schema '{}'", name));
        let aux = self
            .aux
            .iter()
            .filter(|(name, schema)| name.as_str() != aux_name && uses(schema))
            .map(|(name, _)| format!("aux schema '{}'", name));

        primaries.chain(aux).collect()
    }

    /// Copy with `schema` registered as the primary schema `name`
    pub fn with_schema(&self, name: &str, schema: Value) -> Result<Self, EngineError> {
        check_name(name)?;
        check_document(name, &schema)?;
        let validator = self.compile(name, &schema)?;

        let mut next = self.clone();
        next.validators.insert(name.to_string(), Arc::new(validator));
        next.primaries.insert(name.to_string(), schema);
        Ok(next)
    }

    /// Copy without the primary schema `name`
    pub fn without_schema(&self, name: &str) -> Result<Self, EngineError> {
        if !self.primaries.contains_key(name) {
            return Err(EngineError::NotFound(format!("schema {}", name)));
        }
        let mut next = self.clone();
        next.primaries.remove(name);
        next.validators.remove(name);
        Ok(next)
    }

    /// Copy with `schema` registered as the aux schema `name`
    ///
    /// An aux schema may reference itself. Every primary is recompiled against
    /// the new aux set; if any of them no longer compiles the change is
    /// rejected.
    pub fn with_aux(&self, name: &str, schema: Value) -> Result<Self, EngineError> {
        check_name(name)?;
        check_document(name, &schema)?;

        let mut next = self.clone();
        next.aux.insert(name.to_string(), schema);
        if let Some(schema) = next.aux.get(name) {
            resolve_aux_refs(&extract_refs(schema), &next.aux, AuxResolution::default())
                .map_err(|missing| EngineError::UnknownAuxiliaryReference {
                    schema: name.to_string(),
                    reference: missing.0,
                })?;
        }
        next.recompile_all()?;
        Ok(next)
    }

    /// Copy without the aux schema `name`; refused while anything references it
    pub fn without_aux(&self, name: &str) -> Result<Self, EngineError> {
        if !self.aux.contains_key(name) {
            return Err(EngineError::NotFound(format!("aux schema {}", name)));
        }
        let dependents = self.aux_dependents(name);
        if !dependents.is_empty() {
            return Err(EngineError::DependencyConflict(format!(
                "aux schema '{}' is still referenced by {}",
                name,
                dependents.join(", ")
            )));
        }
        let mut next = self.clone();
        next.aux.remove(name);
        Ok(next)
    }

    fn recompile_all(&mut self) -> Result<(), EngineError> {
        let mut validators = HashMap::with_capacity(self.primaries.len());
        for (name, schema) in &self.primaries {
            validators.insert(name.clone(), Arc::new(self.compile(name, schema)?));
        }
        self.validators = validators;
        Ok(())
    }

    fn compile(&self, name: &str, schema: &Value) -> Result<JSONSchema, EngineError> {
        let resolution = resolve_aux_refs(&extract_refs(schema), &self.aux, AuxResolution::default())
            .map_err(|missing| EngineError::UnknownAuxiliaryReference {
                schema: name.to_string(),
                reference: missing.0,
            })?;

        let mut options = JSONSchema::options();
        for aux_name in &resolution.load_order {
            if let Some(document) = self.aux.get(aux_name) {
                options.with_document(aux_uri(aux_name), qualify_refs(document));
            }
        }

        let qualified = qualify_refs(schema);
        options
            .compile(&qualified)
            .map_err(|e| EngineError::invalid_schema(name, e.to_string()))
    }
}

/// Schemas of every loaded namespace
#[derive(Clone, Default, Debug)]
pub struct SchemaCatalog {
    namespaces: HashMap<String, Arc<NamespaceSchemas>>,
}

impl SchemaCatalog {
    pub fn contains(&self, ns: &str) -> bool {
        self.namespaces.contains_key(ns)
    }

    pub fn namespace(&self, ns: &str) -> Option<&Arc<NamespaceSchemas>> {
        self.namespaces.get(ns)
    }

    /// Names of all loaded namespaces, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validate `meta`; `None` when the namespace or type has no schema
    pub fn validate(&self, ns: &str, node_type: &str, meta: &Value) -> Option<ValidationReport> {
        self.namespaces.get(ns)?.validate(node_type, meta)
    }

    fn with_namespace(&self, ns: &str, schemas: NamespaceSchemas) -> Self {
        let mut next = self.clone();
        next.namespaces.insert(ns.to_string(), Arc::new(schemas));
        next
    }
}

/// Per-namespace schema registry backed by a working directory
pub struct SchemaRegistry {
    working_dir: PathBuf,
    catalog: RegistryHandle<SchemaCatalog>,
}

impl SchemaRegistry {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            catalog: RegistryHandle::default(),
        }
    }

    /// `<working_dir>/<ns>/schemas/<name>.json`
    pub fn schema_path(&self, ns: &str, name: &str) -> PathBuf {
        self.working_dir
            .join(ns)
            .join(SCHEMA_DIR)
            .join(format!("{}.json", name))
    }

    /// `<working_dir>/<ns>/aux/<name>.json`
    pub fn aux_path(&self, ns: &str, name: &str) -> PathBuf {
        self.working_dir
            .join(ns)
            .join(AUX_DIR)
            .join(format!("{}.json", name))
    }

    /// Scan a namespace's schema and aux directories and install the result
    ///
    /// Replaces whatever this worker held for the namespace before.
    pub async fn load(&self, ns: &str) -> Result<(), RegistryError> {
        let dir = self.working_dir.join(ns);
        let primaries = read_json_dir(&dir.join(SCHEMA_DIR)).await?;
        let aux = read_json_dir(&dir.join(AUX_DIR)).await?;

        let schemas = NamespaceSchemas::from_documents(ns, primaries, aux);
        tracing::info!(
            ns,
            schemas = schemas.primaries.len(),
            aux = schemas.aux.len(),
            "loaded namespace schemas"
        );
        self.install(ns, schemas).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> Arc<SchemaCatalog> {
        self.catalog.snapshot().await
    }

    pub async fn contains_namespace(&self, ns: &str) -> bool {
        self.snapshot().await.contains(ns)
    }

    /// Validate `meta` for `(ns, node_type)`; `None` means no schema registered
    pub async fn validate(&self, ns: &str, node_type: &str, meta: &Value) -> Option<ValidationReport> {
        self.snapshot().await.validate(ns, node_type, meta)
    }

    /// Compute a namespace's next schema set without installing it
    pub async fn stage<F>(&self, ns: &str, change: F) -> Result<NamespaceSchemas, EngineError>
    where
        F: FnOnce(&NamespaceSchemas) -> Result<NamespaceSchemas, EngineError>,
    {
        let snapshot = self.snapshot().await;
        let current = snapshot
            .namespace(ns)
            .ok_or_else(|| EngineError::unknown_namespace(ns))?;
        change(current)
    }

    /// Install a namespace's schema set, replacing the previous one
    pub async fn install(&self, ns: &str, schemas: NamespaceSchemas) {
        self.catalog
            .modify(|catalog| catalog.with_namespace(ns, schemas))
            .await;
    }
}

/// Read every `<name>.json` in `dir`; a missing directory is empty
async fn read_json_dir(dir: &Path) -> Result<BTreeMap<String, Value>, RegistryError> {
    let mut documents = BTreeMap::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(documents),
        Err(e) => return Err(RegistryError::io(dir, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RegistryError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !is_valid_registry_name(name) {
            tracing::warn!(path = %path.display(), "skipping schema file with invalid name");
            continue;
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RegistryError::io(&path, e))?;
        let document: Value =
            serde_json::from_str(&text).map_err(|e| RegistryError::json(&path, e))?;
        documents.insert(name.to_string(), document);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(name, schema)| (name.to_string(), schema.clone()))
            .collect()
    }

    #[test]
    fn test_extract_refs_searches_keys_and_arrays() {
        let schema = json!({
            "definitions": {"inner": {"$ref": "#/definitions/other"}},
            "allOf": [{"$ref": "one"}, [{"$ref": "two.json"}]],
            "properties": {"x": {"items": {"$ref": "three#/definitions/y"}}}
        });
        let mut refs = extract_refs(&schema);
        refs.sort();
        assert_eq!(
            refs,
            vec!["#/definitions/other", "one", "three#/definitions/y", "two.json"]
        );
    }

    #[test]
    fn test_aux_reference_forms() {
        assert_eq!(aux_reference("positive"), Some("positive"));
        assert_eq!(aux_reference("positive.json"), Some("positive"));
        assert_eq!(aux_reference("shapes#/definitions/x"), Some("shapes"));
        assert_eq!(aux_reference("#/definitions/x"), None);
        assert_eq!(aux_reference("http://json-schema.org/draft-07/schema#"), None);
    }

    #[test]
    fn test_cyclic_aux_graph_loads_each_once() {
        let aux = catalog(&[
            ("A", json!({"properties": {"b": {"$ref": "B"}}})),
            ("B", json!({"properties": {"a": {"$ref": "A"}}})),
        ]);
        let resolution =
            resolve_aux_refs(&["A".to_string()], &aux, AuxResolution::default()).unwrap();

        assert_eq!(resolution.load_order, vec!["B", "A"]);
        assert_eq!(resolution.visited.len(), 2);
    }

    #[test]
    fn test_diamond_aux_graph_loads_shared_leaf_once() {
        let aux = catalog(&[
            ("top", json!({"allOf": [{"$ref": "left"}, {"$ref": "right"}]})),
            ("left", json!({"$ref": "leaf"})),
            ("right", json!({"$ref": "leaf"})),
            ("leaf", json!({"type": "object"})),
        ]);
        let resolution =
            resolve_aux_refs(&["top".to_string()], &aux, AuxResolution::default()).unwrap();

        let leaf_loads = resolution.load_order.iter().filter(|n| *n == "leaf").count();
        assert_eq!(leaf_loads, 1);
        assert_eq!(resolution.load_order.first().map(String::as_str), Some("leaf"));
        assert_eq!(resolution.load_order.last().map(String::as_str), Some("top"));
    }

    #[test]
    fn test_unknown_aux_is_reported() {
        let aux = catalog(&[("A", json!({"$ref": "ghost"}))]);
        let err = resolve_aux_refs(&["A".to_string()], &aux, AuxResolution::default()).unwrap_err();
        assert_eq!(err, UnknownAuxSchema("ghost".into()));
    }

    #[test]
    fn test_schema_with_aux_reference_validates_meta() {
        let schemas = NamespaceSchemas::default()
            .with_aux("positive", json!({"type": "integer", "minimum": 1}))
            .unwrap()
            .with_schema(
                "sample",
                json!({
                    "type": "object",
                    "properties": {"count": {"$ref": "positive"}},
                    "required": ["count"]
                }),
            )
            .unwrap();

        let report = schemas.validate("sample", &json!({"count": 3})).unwrap();
        assert!(report.is_valid());

        let report = schemas.validate("sample", &json!({"count": 0})).unwrap();
        assert!(!report.is_valid());
        assert!(report.first_error().is_some());

        assert!(schemas.validate("unregistered", &json!({})).is_none());
    }

    #[test]
    fn test_cyclic_aux_schemas_register_and_validate() {
        // B alone references the missing A
        let err = NamespaceSchemas::default()
            .with_aux("B", json!({"type": "object", "properties": {"a": {"$ref": "A"}}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownAuxiliaryReference { ref reference, .. } if reference == "A"
        ));

        let aux = catalog(&[
            ("A", json!({"type": "object", "properties": {"b": {"$ref": "B"}}})),
            ("B", json!({"type": "object", "properties": {"a": {"$ref": "A"}}})),
        ]);
        let primaries = catalog(&[("tree", json!({"$ref": "A"}))]);
        let schemas = NamespaceSchemas::from_documents("test", primaries, aux);

        assert_eq!(schemas.aux_names(), vec!["A", "B"]);
        assert_eq!(schemas.schema_names(), vec!["tree"]);
        assert!(schemas
            .validate("tree", &json!({"b": {"a": {"b": {}}}}))
            .unwrap()
            .is_valid());
        assert!(!schemas
            .validate("tree", &json!({"b": {"a": 5}}))
            .unwrap()
            .is_valid());
    }

    #[test]
    fn test_unknown_aux_reference_rejects_without_partial_registration() {
        let schemas = NamespaceSchemas::default();
        let err = schemas
            .with_schema("sample", json!({"properties": {"x": {"$ref": "missing"}}}))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownAuxiliaryReference { .. }));
        assert!(schemas.schema("sample").is_none());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let schemas = NamespaceSchemas::default();
        assert!(schemas.with_schema("abc_DEF-123", json!({})).is_ok());
        let long = "x".repeat(33);
        assert!(matches!(
            schemas.with_schema(&long, json!({})),
            Err(EngineError::InvalidSchema { .. })
        ));
        assert!(matches!(
            schemas.with_aux("bad name", json!({})),
            Err(EngineError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_aux_deletion_blocked_while_referenced() {
        let schemas = NamespaceSchemas::default()
            .with_aux("leaf", json!({"type": "string"}))
            .unwrap()
            .with_aux("wrapper", json!({"$ref": "leaf"}))
            .unwrap()
            .with_schema("sample", json!({"properties": {"w": {"$ref": "wrapper"}}}))
            .unwrap();

        assert_eq!(schemas.aux_dependents("leaf"), vec!["aux schema 'wrapper'"]);
        assert!(matches!(
            schemas.without_aux("wrapper"),
            Err(EngineError::DependencyConflict(_))
        ));

        let schemas = schemas.without_schema("sample").unwrap();
        let schemas = schemas.without_aux("wrapper").unwrap();
        let schemas = schemas.without_aux("leaf").unwrap();
        assert!(schemas.aux_names().is_empty());
    }

    #[test]
    fn test_aux_update_recompiles_primaries() {
        let schemas = NamespaceSchemas::default()
            .with_aux("label", json!({"type": "string"}))
            .unwrap()
            .with_schema("sample", json!({"properties": {"l": {"$ref": "label"}}}))
            .unwrap();
        assert!(schemas.validate("sample", &json!({"l": 1})).unwrap().errors.len() == 1);

        let schemas = schemas
            .with_aux("label", json!({"type": ["string", "integer"]}))
            .unwrap();
        assert!(schemas.validate("sample", &json!({"l": 1})).unwrap().is_valid());
    }

    #[test]
    fn test_debug_lists_names_without_validators() {
        let schemas = NamespaceSchemas::default()
            .with_aux("label", json!({"type": "string"}))
            .unwrap()
            .with_schema("sample", json!({"type": "object"}))
            .unwrap();
        let rendered = format!("{:?}", schemas);
        assert!(rendered.contains("\"sample\""));
        assert!(rendered.contains("\"label\""));
        assert!(rendered.contains("compiled: 1"));
    }
}
