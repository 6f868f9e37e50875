//! In-memory gateway implementation.
//!
//! Maps keyed the way the store's composite indexes are, behind one
//! `RwLock`. Observable behavior (conflicts, workspace scoping, open
//! filtering) matches the NebulaGraph implementation; tests and the
//! server's memory mode run against this.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use graphops_core::id::storage_form;
use graphops_core::{
    AssertionRecord, ChangeEvent, Entity, Error, ImportRun, PropertyValue, Result, Source,
};

use crate::gateway::{EventLink, GraphGateway};

#[derive(Default)]
struct State {
    /// bare id → entity
    entities: HashMap<String, Entity>,
    /// (workspace_id, entity_type, primary_key) → bare id
    entity_index: HashMap<(String, String, String), String>,
    /// bare id → assertion
    assertions: HashMap<String, AssertionRecord>,
    /// bare assertion id → bare subject entity id
    subject_edges: HashMap<String, String>,
    /// bare assertion id → bare object id (entity or property value)
    object_edges: HashMap<String, String>,
    /// bare id → property value
    property_values: HashMap<String, PropertyValue>,
    /// bare id → change event
    change_events: HashMap<String, ChangeEvent>,
    /// bare event id → bare assertion ids (CREATED_ASSERTION)
    created_links: HashMap<String, Vec<String>>,
    /// bare event id → bare assertion ids (CLOSED_ASSERTION)
    closed_links: HashMap<String, Vec<String>>,
    /// bare assertion id → bare event id (reverse of created_links)
    created_by: HashMap<String, String>,
    /// bare id → import run
    import_runs: HashMap<String, ImportRun>,
    /// bare id → source
    sources: HashMap<String, Source>,
    /// (workspace_id, source_name) → bare id
    source_index: HashMap<(String, String), String>,
}

#[derive(Default)]
pub struct MemoryGateway {
    state: RwLock<State>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bare(id: &str) -> String {
    storage_form(id).to_string()
}

#[async_trait]
impl GraphGateway for MemoryGateway {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let index_key = (
            entity.workspace_id.clone(),
            entity.entity_type.clone(),
            entity.primary_key.clone(),
        );
        if state.entity_index.contains_key(&index_key) {
            return Err(Error::conflict(format!(
                "entity already exists: ({}, {}, {})",
                entity.workspace_id, entity.entity_type, entity.primary_key
            )));
        }
        let id = bare(&entity.entity_id);
        state.entity_index.insert(index_key, id.clone());
        state.entities.insert(id, entity.clone());
        Ok(())
    }

    async fn find_entity(
        &self,
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
    ) -> Result<Option<Entity>> {
        let state = self.state.read().unwrap();
        let key = (
            workspace_id.to_string(),
            entity_type.to_string(),
            primary_key.to_string(),
        );
        Ok(state
            .entity_index
            .get(&key)
            .and_then(|id| state.entities.get(id))
            .cloned())
    }

    async fn get_entity(&self, workspace_id: &str, entity_id: &str) -> Result<Option<Entity>> {
        let state = self.state.read().unwrap();
        Ok(state
            .entities
            .get(&bare(entity_id))
            .filter(|e| e.workspace_id == workspace_id)
            .cloned())
    }

    async fn search_entities(
        &self,
        workspace_id: &str,
        entity_type: Option<&str>,
        primary_key: Option<&str>,
        q: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let state = self.state.read().unwrap();
        let needle = q.map(|s| s.to_lowercase());
        let mut hits: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| e.workspace_id == workspace_id)
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| primary_key.map_or(true, |pk| e.primary_key == pk))
            .filter(|e| {
                needle.as_deref().map_or(true, |n| {
                    e.display_name
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(n))
                })
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn insert_assertion(
        &self,
        assertion: &AssertionRecord,
        subject_id: &str,
        object_id: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let subject = state.entities.get(&bare(subject_id)).ok_or_else(|| {
            Error::internal(format!(
                "assertion {} subject {subject_id} does not exist",
                assertion.assertion_key
            ))
        })?;
        if subject.workspace_id != assertion.workspace_id {
            return Err(Error::internal(format!(
                "cross-workspace edge rejected for assertion {}",
                assertion.assertion_key
            )));
        }
        let object_workspace = state
            .entities
            .get(&bare(object_id))
            .map(|e| e.workspace_id.clone())
            .or_else(|| {
                state
                    .property_values
                    .get(&bare(object_id))
                    .map(|pv| pv.workspace_id.clone())
            })
            .ok_or_else(|| {
                Error::internal(format!(
                    "assertion {} object {object_id} does not exist",
                    assertion.assertion_key
                ))
            })?;
        if object_workspace != assertion.workspace_id {
            return Err(Error::internal(format!(
                "cross-workspace edge rejected for assertion {}",
                assertion.assertion_key
            )));
        }

        let id = bare(&assertion.assertion_id);
        state.subject_edges.insert(id.clone(), bare(subject_id));
        state.object_edges.insert(id.clone(), bare(object_id));
        state.assertions.insert(id, assertion.clone());
        Ok(())
    }

    async fn close_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let record = state
            .assertions
            .get_mut(&bare(assertion_id))
            .filter(|a| a.workspace_id == workspace_id)
            .ok_or_else(|| Error::not_found(format!("assertion {assertion_id}")))?;
        if record.valid_to.is_some() {
            return Err(Error::conflict(format!(
                "assertion {assertion_id} ({}) is already closed",
                record.assertion_key
            )));
        }
        record.valid_to = Some(valid_to);
        Ok(())
    }

    async fn delete_assertion(&self, workspace_id: &str, assertion_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let id = bare(assertion_id);
        match state.assertions.get(&id) {
            Some(a) if a.workspace_id == workspace_id => {}
            _ => return Err(Error::not_found(format!("assertion {assertion_id}"))),
        }
        state.assertions.remove(&id);
        state.subject_edges.remove(&id);
        state.object_edges.remove(&id);
        state.created_by.remove(&id);
        Ok(())
    }

    async fn open_assertions_for_key(
        &self,
        workspace_id: &str,
        assertion_key: &str,
        scenario_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let state = self.state.read().unwrap();
        let mut out: Vec<AssertionRecord> = state
            .assertions
            .values()
            .filter(|a| {
                a.workspace_id == workspace_id
                    && a.assertion_key == assertion_key
                    && a.scenario_id == scenario_id
                    && a.is_open()
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(out)
    }

    async fn open_assertions_for_entity(
        &self,
        workspace_id: &str,
        entity_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let state = self.state.read().unwrap();
        let subject = bare(entity_id);
        let mut out: Vec<AssertionRecord> = state
            .subject_edges
            .iter()
            .filter(|(_, s)| **s == subject)
            .filter_map(|(aid, _)| state.assertions.get(aid))
            .filter(|a| a.workspace_id == workspace_id && a.is_open())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(out)
    }

    async fn assertions_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let state = self.state.read().unwrap();
        let run = bare(import_run_id);
        let mut out: Vec<AssertionRecord> = state
            .assertions
            .values()
            .filter(|a| {
                a.workspace_id == workspace_id
                    && a.import_run_id.as_deref().map(storage_form) == Some(run.as_str())
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(out)
    }

    async fn open_assertion_keys_by_spec(
        &self,
        workspace_id: &str,
        spec_name: &str,
    ) -> Result<Vec<String>> {
        let state = self.state.read().unwrap();
        let run_ids: HashSet<String> = state
            .import_runs
            .values()
            .filter(|r| r.workspace_id == workspace_id && r.spec_name == spec_name)
            .map(|r| bare(&r.import_run_id))
            .collect();
        let mut keys: Vec<String> = state
            .assertions
            .values()
            .filter(|a| a.workspace_id == workspace_id && a.is_open())
            .filter(|a| {
                a.import_run_id
                    .as_deref()
                    .is_some_and(|id| run_ids.contains(storage_form(id)))
            })
            .map(|a| a.assertion_key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn is_created_linked(&self, _workspace_id: &str, assertion_id: &str) -> Result<bool> {
        let state = self.state.read().unwrap();
        Ok(state.created_by.contains_key(&bare(assertion_id)))
    }

    async fn insert_property_value(&self, pv: &PropertyValue) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state
            .property_values
            .insert(bare(&pv.property_value_id), pv.clone());
        Ok(())
    }

    async fn property_value_for_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<PropertyValue>> {
        let state = self.state.read().unwrap();
        Ok(state
            .object_edges
            .get(&bare(assertion_id))
            .and_then(|oid| state.property_values.get(oid))
            .filter(|pv| pv.workspace_id == workspace_id)
            .cloned())
    }

    async fn relationship_target(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<Entity>> {
        let state = self.state.read().unwrap();
        Ok(state
            .object_edges
            .get(&bare(assertion_id))
            .and_then(|oid| state.entities.get(oid))
            .filter(|e| e.workspace_id == workspace_id)
            .cloned())
    }

    async fn insert_change_event(
        &self,
        event: &ChangeEvent,
        created: &[String],
        closed: &[String],
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let event_id = bare(&event.change_event_id);
        for aid in created {
            state.created_by.insert(bare(aid), event_id.clone());
        }
        state
            .created_links
            .insert(event_id.clone(), created.iter().map(|a| bare(a)).collect());
        state
            .closed_links
            .insert(event_id.clone(), closed.iter().map(|a| bare(a)).collect());
        state.change_events.insert(event_id, event.clone());
        Ok(())
    }

    async fn change_event_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ChangeEvent>> {
        let state = self.state.read().unwrap();
        let run = bare(import_run_id);
        Ok(state
            .change_events
            .values()
            .find(|e| {
                e.workspace_id == workspace_id
                    && e.import_run_id.as_deref().map(storage_form) == Some(run.as_str())
            })
            .cloned())
    }

    async fn event_assertions(
        &self,
        workspace_id: &str,
        change_event_id: &str,
        link: EventLink,
    ) -> Result<Vec<AssertionRecord>> {
        let state = self.state.read().unwrap();
        let links = match link {
            EventLink::Created => &state.created_links,
            EventLink::Closed => &state.closed_links,
        };
        Ok(links
            .get(&bare(change_event_id))
            .map(|ids| {
                ids.iter()
                    .filter_map(|aid| state.assertions.get(aid))
                    .filter(|a| a.workspace_id == workspace_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_import_run(&self, run: &ImportRun) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.import_runs.insert(bare(&run.import_run_id), run.clone());
        Ok(())
    }

    async fn update_import_run(&self, run: &ImportRun) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let id = bare(&run.import_run_id);
        if !state.import_runs.contains_key(&id) {
            return Err(Error::not_found(format!(
                "import run {}",
                run.import_run_id
            )));
        }
        state.import_runs.insert(id, run.clone());
        Ok(())
    }

    async fn get_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ImportRun>> {
        let state = self.state.read().unwrap();
        Ok(state
            .import_runs
            .get(&bare(import_run_id))
            .filter(|r| r.workspace_id == workspace_id)
            .cloned())
    }

    async fn list_import_runs(&self, workspace_id: &str, limit: usize) -> Result<Vec<ImportRun>> {
        let state = self.state.read().unwrap();
        let mut runs: Vec<ImportRun> = state
            .import_runs
            .values()
            .filter(|r| r.workspace_id == workspace_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.import_run_id.cmp(&a.import_run_id))
        });
        runs.truncate(limit);
        Ok(runs)
    }

    async fn upsert_source(&self, source: &Source) -> Result<String> {
        let mut state = self.state.write().unwrap();
        let index_key = (source.workspace_id.clone(), source.source_name.clone());
        if let Some(existing_id) = state.source_index.get(&index_key).cloned() {
            let mut updated = source.clone();
            let display_id = state.sources[&existing_id].source_id.clone();
            updated.source_id = display_id.clone();
            state.sources.insert(existing_id, updated);
            return Ok(display_id);
        }
        let id = bare(&source.source_id);
        state.source_index.insert(index_key, id.clone());
        state.sources.insert(id, source.clone());
        Ok(source.source_id.clone())
    }

    async fn list_sources(&self, workspace_id: &str) -> Result<Vec<Source>> {
        let state = self.state.read().unwrap();
        let mut out: Vec<Source> = state
            .sources
            .values()
            .filter(|s| s.workspace_id == workspace_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        Ok(out)
    }
}
