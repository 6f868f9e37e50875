//! Per-`(workspace, spec)` import serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cooperative async locks keyed by `(workspace_id, spec_name)`.
///
/// Held for the duration of one import. Lock entries are never removed;
/// the key space is bounded by the number of distinct specs.
#[derive(Default)]
pub struct ImportLocks {
    inner: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl ImportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding imports of one spec in one workspace.
    pub fn for_spec(&self, workspace_id: &str, spec_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = (workspace_id.to_string(), spec_name.to_string());
        self.inner
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
