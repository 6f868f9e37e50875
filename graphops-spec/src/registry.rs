//! Per-workspace schema registry.
//!
//! Read-mostly cache of domain schemas, loaded from a schemas directory
//! at startup and invalidated only by explicit reload or registration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use graphops_core::{Error, Result};

use crate::schema::DomainSchema;

pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<DomainSchema>>>,
    schemas_dir: Option<PathBuf>,
}

impl SchemaRegistry {
    /// Registry backed by a schemas directory. Call [`Self::reload`] to
    /// populate it.
    pub fn new(schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            schemas_dir: Some(schemas_dir.into()),
        }
    }

    /// Registry without disk backing (workspaces registered via API only).
    pub fn in_memory() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            schemas_dir: None,
        }
    }

    /// (Re)load every `*.yaml`/`*.yml` schema in the directory. Files
    /// starting with `_` are skipped; unparsable files are logged and
    /// skipped rather than failing startup.
    pub fn reload(&self) -> Result<usize> {
        let Some(dir) = &self.schemas_dir else {
            return Ok(0);
        };
        if !dir.exists() {
            warn!(dir = %dir.display(), "schemas directory does not exist");
            return Ok(0);
        }

        let mut loaded = 0;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::internal(format!("cannot read schemas dir: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('_') || !(name.ends_with(".yaml") || name.ends_with(".yml")) {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read schema file");
                    continue;
                }
            };
            match DomainSchema::from_yaml(&content) {
                Ok(schema) => {
                    info!(workspace = %schema.workspace, path = %path.display(), "loaded schema");
                    self.schemas
                        .write()
                        .unwrap()
                        .insert(schema.workspace.clone(), Arc::new(schema));
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid schema file");
                }
            }
        }
        Ok(loaded)
    }

    /// Register a schema directly (workspace creation via API). The
    /// schema must already validate.
    pub fn register(&self, schema: DomainSchema) -> Result<()> {
        schema.validate()?;
        self.schemas
            .write()
            .unwrap()
            .insert(schema.workspace.clone(), Arc::new(schema));
        Ok(())
    }

    /// Schema of a workspace, or NotFound.
    pub fn get(&self, workspace_id: &str) -> Result<Arc<DomainSchema>> {
        self.schemas
            .read()
            .unwrap()
            .get(workspace_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("workspace '{workspace_id}'")))
    }

    /// Whether the workspace exists.
    pub fn contains(&self, workspace_id: &str) -> bool {
        self.schemas.read().unwrap().contains_key(workspace_id)
    }

    /// Sorted list of registered workspace ids.
    pub fn list(&self) -> Vec<String> {
        let mut out: Vec<String> = self.schemas.read().unwrap().keys().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCHEMA: &str = r#"
workspace: datacenter
version: "1"
entity_types:
  Location:
    primary_key: loc_id
    properties:
      loc_id: { type: string }
"#;

    #[test]
    fn loads_schemas_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("datacenter.yaml"), SCHEMA).unwrap();
        // underscore-prefixed and non-yaml files are ignored
        std::fs::write(dir.path().join("_draft.yaml"), "junk: [").unwrap();
        let mut other = std::fs::File::create(dir.path().join("notes.txt")).unwrap();
        writeln!(other, "not a schema").unwrap();

        let registry = SchemaRegistry::new(dir.path());
        assert_eq!(registry.reload().unwrap(), 1);
        assert!(registry.contains("datacenter"));
        assert_eq!(registry.list(), vec!["datacenter".to_string()]);
    }

    #[test]
    fn register_and_get() {
        let registry = SchemaRegistry::in_memory();
        registry
            .register(DomainSchema::from_yaml(SCHEMA).unwrap())
            .unwrap();
        let schema = registry.get("datacenter").unwrap();
        assert_eq!(schema.version, "1");
        assert!(registry.get("absent").is_err());
    }
}
