//! The typed gateway contract every storage backend implements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use graphops_core::{
    AssertionRecord, ChangeEvent, Entity, ImportRun, PropertyValue, Result, Source,
};

/// Which link set of a ChangeEvent to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLink {
    Created,
    Closed,
}

/// Typed CRUD surface over the backing property-graph store.
///
/// Every operation is workspace-scoped; no implementation may return a
/// vertex whose `workspace_id` differs from the one asked for. Write
/// operations are never retried by callers - error recovery is the
/// orchestrator's job (orphan reaping).
#[async_trait]
pub trait GraphGateway: Send + Sync {
    /// Cheap connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;

    // --- entities ---

    /// Insert a new entity. Fails with Conflict if one already exists for
    /// `(workspace_id, entity_type, primary_key)`.
    async fn insert_entity(&self, entity: &Entity) -> Result<()>;

    /// Index lookup by the natural key.
    async fn find_entity(
        &self,
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
    ) -> Result<Option<Entity>>;

    /// Fetch by vertex id; None on absence or workspace mismatch.
    async fn get_entity(&self, workspace_id: &str, entity_id: &str) -> Result<Option<Entity>>;

    /// Bounded entity search. `q` is a case-insensitive substring match
    /// over `display_name`.
    async fn search_entities(
        &self,
        workspace_id: &str,
        entity_type: Option<&str>,
        primary_key: Option<&str>,
        q: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>>;

    // --- assertions ---

    /// Insert an assertion vertex together with both `ASSERTED_REL`
    /// edges (subject entity → assertion → object entity/property-value).
    async fn insert_assertion(
        &self,
        assertion: &AssertionRecord,
        subject_id: &str,
        object_id: &str,
    ) -> Result<()>;

    /// Set `valid_to` on an open assertion. Refuses to re-close
    /// (Conflict) and fails with NotFound for unknown ids.
    async fn close_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove an assertion vertex and its edges. Only the orphan reaper
    /// calls this.
    async fn delete_assertion(&self, workspace_id: &str, assertion_id: &str) -> Result<()>;

    /// All open records (`valid_to = ∞`) for one assertion key and
    /// scenario.
    async fn open_assertions_for_key(
        &self,
        workspace_id: &str,
        assertion_key: &str,
        scenario_id: &str,
    ) -> Result<Vec<AssertionRecord>>;

    /// Open assertions whose subject is the given entity (outbound
    /// `ASSERTED_REL` traversal).
    async fn open_assertions_for_entity(
        &self,
        workspace_id: &str,
        entity_id: &str,
    ) -> Result<Vec<AssertionRecord>>;

    /// Every assertion recorded under one import run, open or closed.
    async fn assertions_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Vec<AssertionRecord>>;

    /// Distinct keys of open assertions introduced by any import run of
    /// the given spec. Drives disappearance detection.
    async fn open_assertion_keys_by_spec(
        &self,
        workspace_id: &str,
        spec_name: &str,
    ) -> Result<Vec<String>>;

    /// Whether a `CREATED_ASSERTION` edge reaches this assertion (the
    /// visibility predicate; absent means orphan).
    async fn is_created_linked(&self, workspace_id: &str, assertion_id: &str) -> Result<bool>;

    // --- property values ---

    async fn insert_property_value(&self, pv: &PropertyValue) -> Result<()>;

    /// Follow the object `ASSERTED_REL` edge of a property assertion.
    async fn property_value_for_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<PropertyValue>>;

    /// Follow the object `ASSERTED_REL` edge of a relationship assertion.
    async fn relationship_target(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<Entity>>;

    // --- change events ---

    /// Insert the event vertex and materialize `TRIGGERED_BY` plus all
    /// `CREATED_ASSERTION` / `CLOSED_ASSERTION` edges. One call per
    /// import; this is the reader-visibility boundary.
    async fn insert_change_event(
        &self,
        event: &ChangeEvent,
        created: &[String],
        closed: &[String],
    ) -> Result<()>;

    async fn change_event_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ChangeEvent>>;

    /// Assertions linked from an event via the given edge set.
    async fn event_assertions(
        &self,
        workspace_id: &str,
        change_event_id: &str,
        link: EventLink,
    ) -> Result<Vec<AssertionRecord>>;

    // --- import runs ---

    async fn insert_import_run(&self, run: &ImportRun) -> Result<()>;

    /// Rewrite the mutable tail of a run (status, finished_at, stats,
    /// error_message).
    async fn update_import_run(&self, run: &ImportRun) -> Result<()>;

    async fn get_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ImportRun>>;

    /// Runs for a workspace, most recently started first.
    async fn list_import_runs(&self, workspace_id: &str, limit: usize) -> Result<Vec<ImportRun>>;

    // --- sources ---

    /// Insert or update by `(workspace_id, source_name)`; returns the
    /// source id.
    async fn upsert_source(&self, source: &Source) -> Result<String>;

    async fn list_sources(&self, workspace_id: &str) -> Result<Vec<Source>>;

    /// `source_id → authority_rank` for the resolution engine.
    async fn source_authority_map(&self, workspace_id: &str) -> Result<HashMap<String, i64>> {
        let sources = self.list_sources(workspace_id).await?;
        Ok(sources
            .into_iter()
            .map(|s| (s.source_id, s.authority_rank))
            .collect())
    }
}
