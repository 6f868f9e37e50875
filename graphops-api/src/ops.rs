//! The `GraphOps` facade.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use graphops_core::resolve::{annotate, resolve_groups, ResolveContext};
use graphops_core::{AssertionRecord, Error, ImportRun, Result};
use graphops_graph::{EventLink, GraphGateway};
use graphops_ingest::{ImportOutcome, Importer};
use graphops_spec::{DomainSchema, SchemaRegistry, SpecStore};

use crate::types::{
    EntityDetail, EntitySummary, ImportDiff, ImportDiffEntry, PropertyView, RelationshipView,
    ViewMode, WorkspaceInfo,
};

/// Default page size for entity search.
pub const DEFAULT_PAGE: usize = 50;
/// Hard upper bound for entity search pages.
pub const MAX_PAGE: usize = 500;

pub struct GraphOps {
    gateway: Arc<dyn GraphGateway>,
    registry: Arc<SchemaRegistry>,
    specs: Arc<SpecStore>,
    importer: Importer,
}

impl GraphOps {
    pub fn new(
        gateway: Arc<dyn GraphGateway>,
        registry: Arc<SchemaRegistry>,
        specs: Arc<SpecStore>,
    ) -> Self {
        let importer = Importer::new(gateway.clone());
        Self {
            gateway,
            registry,
            specs,
            importer,
        }
    }

    /// Connectivity of the backing graph store (for health reporting).
    pub async fn graph_ok(&self) -> bool {
        self.gateway.ping().await.is_ok()
    }

    // --- workspaces ---

    pub fn list_workspaces(&self) -> Vec<WorkspaceInfo> {
        self.registry
            .list()
            .into_iter()
            .filter_map(|wid| self.registry.get(&wid).ok())
            .map(|schema| workspace_info(&schema))
            .collect()
    }

    /// Create a workspace from a schema document. The schema's own
    /// `workspace` field must match the requested id.
    pub fn create_workspace(&self, workspace_id: &str, schema_yaml: &str) -> Result<WorkspaceInfo> {
        validate_workspace_id(workspace_id)?;
        if self.registry.contains(workspace_id) {
            return Err(Error::conflict(format!(
                "workspace '{workspace_id}' already exists"
            )));
        }
        let schema = DomainSchema::from_yaml(schema_yaml)?;
        if schema.workspace != workspace_id {
            return Err(Error::validation(format!(
                "schema declares workspace '{}' but the request targets '{workspace_id}'",
                schema.workspace
            )));
        }
        let info = workspace_info(&schema);
        self.registry.register(schema)?;
        Ok(info)
    }

    pub fn workspace_schema(&self, workspace_id: &str) -> Result<Arc<DomainSchema>> {
        self.registry.get(workspace_id)
    }

    // --- imports ---

    /// Execute an import synchronously: load + validate the spec, then
    /// hand off to the orchestrator.
    pub async fn run_import(
        &self,
        workspace_id: &str,
        spec_name: &str,
        file_path: &Path,
        actor: &str,
    ) -> Result<ImportOutcome> {
        let schema = self.registry.get(workspace_id)?;
        let spec = self.specs.load(spec_name)?;
        if spec.workspace_id != workspace_id {
            return Err(Error::validation(format!(
                "spec '{spec_name}' targets workspace '{}', not '{workspace_id}'",
                spec.workspace_id
            )));
        }
        self.importer
            .run_import(&schema, &spec, file_path, actor)
            .await
    }

    pub async fn get_import(&self, workspace_id: &str, import_run_id: &str) -> Result<ImportRun> {
        self.gateway
            .get_import_run(workspace_id, import_run_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("import run {import_run_id}")))
    }

    pub async fn list_imports(&self, workspace_id: &str, limit: usize) -> Result<Vec<ImportRun>> {
        self.gateway.list_import_runs(workspace_id, limit).await
    }

    /// The created/closed assertion lists of a run's change event,
    /// dereferenced for display.
    pub async fn import_diff(&self, workspace_id: &str, import_run_id: &str) -> Result<ImportDiff> {
        let run = self.get_import(workspace_id, import_run_id).await?;
        let Some(event) = self
            .gateway
            .change_event_for_import_run(workspace_id, &run.import_run_id)
            .await?
        else {
            return Ok(ImportDiff {
                import_run_id: run.import_run_id,
                change_event_id: None,
                stats: None,
                created_assertions: Vec::new(),
                closed_assertions: Vec::new(),
            });
        };

        let created = self
            .diff_entries(workspace_id, &event.change_event_id, EventLink::Created)
            .await?;
        let closed = self
            .diff_entries(workspace_id, &event.change_event_id, EventLink::Closed)
            .await?;
        Ok(ImportDiff {
            import_run_id: run.import_run_id,
            change_event_id: Some(event.change_event_id),
            stats: Some(event.stats),
            created_assertions: created,
            closed_assertions: closed,
        })
    }

    async fn diff_entries(
        &self,
        workspace_id: &str,
        change_event_id: &str,
        link: EventLink,
    ) -> Result<Vec<ImportDiffEntry>> {
        let mut records = self
            .gateway
            .event_assertions(workspace_id, change_event_id, link)
            .await?;
        records.sort_by(|a, b| a.assertion_key.cmp(&b.assertion_key));

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let (value, target) = self.dereference(workspace_id, &record).await?;
            entries.push(ImportDiffEntry {
                assertion_id: record.assertion_id,
                assertion_key: record.assertion_key,
                relationship_type: record.relationship_type,
                property_key: record.property_key,
                value,
                target,
                source_ref: record.source_ref,
                valid_from: record.valid_from,
                valid_to: record.valid_to,
            });
        }
        Ok(entries)
    }

    async fn dereference(
        &self,
        workspace_id: &str,
        record: &AssertionRecord,
    ) -> Result<(Option<String>, Option<EntitySummary>)> {
        if record.is_property() {
            let value = self
                .gateway
                .property_value_for_assertion(workspace_id, &record.assertion_id)
                .await?
                .and_then(|pv| pv.value);
            Ok((value, None))
        } else {
            let target = self
                .gateway
                .relationship_target(workspace_id, &record.assertion_id)
                .await?
                .map(|e| EntitySummary {
                    entity_id: e.entity_id,
                    entity_type: e.entity_type,
                    primary_key: e.primary_key,
                    display_name: e.display_name,
                });
            Ok((None, target))
        }
    }

    // --- entities ---

    /// Bounded entity search (pure index lookups, no assertion
    /// traversal).
    pub async fn search_entities(
        &self,
        workspace_id: &str,
        entity_type: Option<&str>,
        primary_key: Option<&str>,
        q: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<EntitySummary>> {
        self.registry.get(workspace_id)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let entities = self
            .gateway
            .search_entities(workspace_id, entity_type, primary_key, q, limit)
            .await?;
        Ok(entities
            .into_iter()
            .map(|e| EntitySummary {
                entity_id: e.entity_id,
                entity_type: e.entity_type,
                primary_key: e.primary_key,
                display_name: e.display_name,
            })
            .collect())
    }

    /// Entity detail assembled through the resolution engine.
    pub async fn entity_detail(
        &self,
        workspace_id: &str,
        entity_id: &str,
        view_mode: ViewMode,
        scenario_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<EntityDetail> {
        let entity = self
            .gateway
            .get_entity(workspace_id, entity_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("entity {entity_id}")))?;

        // Visibility predicate: an assertion exists for readers only
        // once a CREATED_ASSERTION edge reaches it. Unlinked records are
        // in-flight or orphaned and are ignored here.
        let mut records = Vec::new();
        for record in self
            .gateway
            .open_assertions_for_entity(workspace_id, entity_id)
            .await?
        {
            if self
                .gateway
                .is_created_linked(workspace_id, &record.assertion_id)
                .await?
            {
                records.push(record);
            } else {
                warn!(
                    assertion = %record.assertion_id,
                    key = %record.assertion_key,
                    "ignoring assertion not yet linked to a change event"
                );
            }
        }
        let authority = self.gateway.source_authority_map(workspace_id).await?;
        let as_of = as_of.unwrap_or_else(Utc::now);
        let ctx = ResolveContext {
            scenario_id,
            as_of,
            authority: &authority,
        };

        let mut properties = Vec::new();
        let mut relationships = Vec::new();

        match view_mode {
            ViewMode::Resolved => {
                let mut winners: Vec<&AssertionRecord> =
                    resolve_groups(&records, &ctx).into_values().collect();
                winners.sort_by(|a, b| a.assertion_key.cmp(&b.assertion_key));
                for winner in winners {
                    self.push_view(
                        workspace_id,
                        winner,
                        true,
                        None,
                        &mut properties,
                        &mut relationships,
                    )
                    .await?;
                }
            }
            ViewMode::AllClaims => {
                for claim in annotate(&records, &ctx) {
                    self.push_view(
                        workspace_id,
                        &claim.record,
                        claim.is_winner,
                        claim.lost,
                        &mut properties,
                        &mut relationships,
                    )
                    .await?;
                }
            }
        }

        Ok(EntityDetail {
            entity_id: entity.entity_id,
            entity_type: entity.entity_type,
            primary_key: entity.primary_key,
            display_name: entity.display_name,
            view_mode,
            scenario_id: scenario_id.to_string(),
            as_of,
            properties,
            relationships,
        })
    }

    async fn push_view(
        &self,
        workspace_id: &str,
        record: &AssertionRecord,
        is_winner: bool,
        lost: Option<graphops_core::LossReason>,
        properties: &mut Vec<PropertyView>,
        relationships: &mut Vec<RelationshipView>,
    ) -> Result<()> {
        if record.is_property() {
            let pv = self
                .gateway
                .property_value_for_assertion(workspace_id, &record.assertion_id)
                .await?;
            properties.push(PropertyView {
                property_key: record
                    .property_key
                    .clone()
                    .unwrap_or_default(),
                value: pv.as_ref().and_then(|pv| pv.value.clone()),
                value_type: pv
                    .map(|pv| pv.value_type.as_str().to_string())
                    .unwrap_or_else(|| "string".to_string()),
                assertion_id: record.assertion_id.clone(),
                source_ref: record.source_ref.clone(),
                confidence: record.confidence,
                is_winner,
                lost,
            });
        } else {
            let Some(target) = self
                .gateway
                .relationship_target(workspace_id, &record.assertion_id)
                .await?
            else {
                warn!(
                    assertion = %record.assertion_id,
                    key = %record.assertion_key,
                    "relationship assertion has no reachable object entity"
                );
                return Ok(());
            };
            relationships.push(RelationshipView {
                relationship_type: record.relationship_type.clone(),
                target_entity_id: target.entity_id,
                target_entity_type: target.entity_type,
                target_primary_key: target.primary_key,
                target_display_name: target.display_name,
                assertion_id: record.assertion_id.clone(),
                source_ref: record.source_ref.clone(),
                confidence: record.confidence,
                is_winner,
                lost,
            });
        }
        Ok(())
    }
}

fn workspace_info(schema: &DomainSchema) -> WorkspaceInfo {
    WorkspaceInfo {
        workspace_id: schema.workspace.clone(),
        schema_version: schema.version.clone(),
        entity_types: schema.entity_types.keys().cloned().collect(),
        relationship_types: schema.relationship_types.keys().cloned().collect(),
    }
}

fn validate_workspace_id(workspace_id: &str) -> Result<()> {
    let ok = !workspace_id.is_empty()
        && workspace_id.len() <= 64
        && workspace_id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid workspace id '{workspace_id}' (lowercase alphanumeric and underscore, max 64)"
        )))
    }
}
