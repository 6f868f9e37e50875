//! Spec store: loads `{name}.yaml` ingest specs from a directory,
//! caching by file mtime so edited specs are picked up without a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::debug;

use graphops_core::{Error, Result};

use crate::spec::IngestSpec;

struct CachedSpec {
    spec: Arc<IngestSpec>,
    mtime: SystemTime,
}

pub struct SpecStore {
    specs_dir: PathBuf,
    cache: RwLock<HashMap<String, CachedSpec>>,
}

impl SpecStore {
    pub fn new(specs_dir: impl Into<PathBuf>) -> Self {
        Self {
            specs_dir: specs_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load a spec by name (`{specs_dir}/{name}.yaml`), serving from
    /// cache while the file is unchanged.
    pub fn load(&self, spec_name: &str) -> Result<Arc<IngestSpec>> {
        let path = self.specs_dir.join(format!("{spec_name}.yaml"));
        let meta = std::fs::metadata(&path)
            .map_err(|_| Error::validation(format!("ingest spec '{spec_name}' not found")))?;
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if let Some(cached) = self.cache.read().unwrap().get(spec_name) {
            if cached.mtime == mtime {
                return Ok(cached.spec.clone());
            }
        }

        debug!(spec = spec_name, path = %path.display(), "loading ingest spec");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::validation(format!("cannot read spec '{spec_name}': {e}")))?;
        let spec = Arc::new(IngestSpec::from_yaml(&content)?);
        self.cache.write().unwrap().insert(
            spec_name.to_string(),
            CachedSpec {
                spec: spec.clone(),
                mtime,
            },
        );
        Ok(spec)
    }

    /// Names of available specs (file stems, underscore-prefixed files
    /// excluded).
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.specs_dir) else {
            return Vec::new();
        };
        let mut out: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let path = e.path();
                let stem = path.file_stem()?.to_str()?.to_string();
                let ext = path.extension()?.to_str()?;
                (ext == "yaml" && !stem.starts_with('_')).then_some(stem)
            })
            .collect();
        out.sort();
        out
    }
}
