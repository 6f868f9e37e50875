//! The import pipeline.
//!
//! One call to [`Importer::run_import`] performs, in order: orphan
//! reaping for the spec, source registration, run bookkeeping, parsing,
//! entity dedup, per-candidate change detection, disappearance closing,
//! and the single change-event emission that makes the batch visible.
//!
//! The change event is written last; readers treat
//! `CREATED_ASSERTION`-reachability as the visibility predicate, so a
//! crash before the event leaves only orphans, which the next import for
//! the same spec deletes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use graphops_core::hash::{
    property_assertion_key, property_content_hashes, relationship_assertion_key,
    relationship_content_hash,
};
use graphops_core::id::{mint, storage_form};
use graphops_core::model::BASE_SCENARIO;
use graphops_core::{
    AssertionRecord, ChangeEvent, ChangeStats, Entity, Error, EventType, IdKind, ImportRun,
    ImportStatus, PropertyValue, Result, Source, SourceType, HAS_PROPERTY,
};
use graphops_graph::GraphGateway;
use graphops_spec::{DomainSchema, IngestSpec, SourceAuthority};
use graphops_tabular::{open_source, stage_tables, StagedRow};

use crate::locks::ImportLocks;

/// Counters accumulated over one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub entities_created: u64,
    pub entities_existing: u64,
    pub created: u64,
    pub closed: u64,
    pub unchanged: u64,
}

impl ImportStats {
    pub fn change_stats(&self) -> ChangeStats {
        ChangeStats {
            created: self.created,
            closed: self.closed,
            unchanged: self.unchanged,
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub run: ImportRun,
    pub change_event_id: String,
    pub stats: ImportStats,
}

pub struct Importer {
    gateway: Arc<dyn GraphGateway>,
    locks: ImportLocks,
}

impl Importer {
    pub fn new(gateway: Arc<dyn GraphGateway>) -> Self {
        Self {
            gateway,
            locks: ImportLocks::new(),
        }
    }

    /// Run a full import of `file_path` under `spec`.
    ///
    /// Imports of the same spec in the same workspace are serialized;
    /// the lock is held until the run record is finalized. On failure
    /// the run is marked failed and the error re-surfaced; partially
    /// created assertions are left for the next run's reaper.
    pub async fn run_import(
        &self,
        schema: &DomainSchema,
        spec: &IngestSpec,
        file_path: &Path,
        actor: &str,
    ) -> Result<ImportOutcome> {
        spec.validate_against(schema)?;
        let workspace_id = spec.workspace_id.clone();

        let lock = self.locks.for_spec(&workspace_id, &spec.spec_name);
        let _guard = lock.lock().await;

        self.reap_orphans(&workspace_id, &spec.spec_name).await?;

        let source_id = match &spec.source_authority {
            Some(authority) => Some(self.register_source(&workspace_id, authority).await?),
            None => None,
        };

        let started_at = Utc::now();
        let source_filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mut run = ImportRun {
            import_run_id: mint(IdKind::ImportRun),
            workspace_id: workspace_id.clone(),
            spec_name: spec.spec_name.clone(),
            source_filename,
            started_at,
            finished_at: None,
            status: ImportStatus::Running,
            stats: None,
            error_message: None,
        };
        self.gateway.insert_import_run(&run).await?;
        info!(
            workspace = %workspace_id,
            spec = %spec.spec_name,
            run = %run.import_run_id,
            file = %run.source_filename,
            "import started"
        );

        let result = self
            .execute(&workspace_id, spec, file_path, source_id.as_deref(), &run, started_at)
            .await;

        match result {
            Ok((stats, created_ids, closed_ids)) => {
                let event = ChangeEvent {
                    change_event_id: mint(IdKind::ChangeEvent),
                    workspace_id: workspace_id.clone(),
                    event_type: EventType::Import,
                    ts: Utc::now(),
                    actor: actor.to_string(),
                    stats: stats.change_stats(),
                    descr: format!(
                        "import of {} via {}: {} created, {} closed, {} unchanged",
                        run.source_filename, spec.spec_name, stats.created, stats.closed,
                        stats.unchanged
                    ),
                    import_run_id: Some(run.import_run_id.clone()),
                };
                self.gateway
                    .insert_change_event(&event, &created_ids, &closed_ids)
                    .await?;

                run.status = ImportStatus::Ok;
                run.finished_at = Some(Utc::now());
                run.stats = Some(stats.change_stats());
                self.gateway.update_import_run(&run).await?;

                info!(
                    run = %run.import_run_id,
                    event = %event.change_event_id,
                    created = stats.created,
                    closed = stats.closed,
                    unchanged = stats.unchanged,
                    "import finished"
                );
                Ok(ImportOutcome {
                    run,
                    change_event_id: event.change_event_id,
                    stats,
                })
            }
            Err(e) => {
                run.status = ImportStatus::Failed;
                run.finished_at = Some(Utc::now());
                run.error_message = Some(e.to_string());
                if let Err(update_err) = self.gateway.update_import_run(&run).await {
                    warn!(run = %run.import_run_id, error = %update_err,
                          "could not mark import run failed");
                }
                warn!(run = %run.import_run_id, error = %e, "import failed");
                Err(e)
            }
        }
    }

    /// Steps (2)–(7): parse, upsert entities, change-detect candidates,
    /// close disappearances. Returns the counters plus created/closed
    /// assertion ids for the change event.
    async fn execute(
        &self,
        workspace_id: &str,
        spec: &IngestSpec,
        file_path: &Path,
        source_id: Option<&str>,
        run: &ImportRun,
        now: DateTime<Utc>,
    ) -> Result<(ImportStats, Vec<String>, Vec<String>)> {
        let tables = open_source(file_path)?;
        let rows = stage_tables(&tables, spec)?;
        info!(rows = rows.len(), spec = %spec.spec_name, "parsed staged rows");

        let mut stats = ImportStats::default();
        let mut created_ids = Vec::new();
        let mut closed_ids = Vec::new();

        let entity_ids = self
            .upsert_entities(workspace_id, &rows, &mut stats)
            .await?;

        let strict = spec.strict_mode();
        let rules = &spec.change_detection.normalization_rules;
        let mut seen_keys: HashSet<String> = HashSet::new();

        for row in &rows {
            for candidate in &row.entities {
                let entity_key = (candidate.entity_type.clone(), candidate.primary_key.clone());
                let Some(subject_id) = entity_ids.get(&entity_key) else {
                    continue;
                };
                for prop in &candidate.properties {
                    // null tokens produce no assertion
                    if prop.value.is_empty()
                        || rules.normalize_nulls.iter().any(|t| t == &prop.value.displayed())
                    {
                        continue;
                    }
                    let assertion_key = property_assertion_key(
                        workspace_id,
                        &candidate.entity_type,
                        &candidate.primary_key,
                        &prop.property_key,
                    );
                    seen_keys.insert(assertion_key.clone());

                    let (raw_hash, normalized_hash) = property_content_hashes(
                        &prop.property_key,
                        &prop.value,
                        &spec.raw_hash_serialization,
                        rules,
                    );
                    let supersedes = match self
                        .detect_change(
                            workspace_id,
                            &assertion_key,
                            if strict { &raw_hash } else { &normalized_hash },
                            strict,
                            source_id,
                            now,
                            &mut stats,
                            &mut closed_ids,
                        )
                        .await?
                    {
                        Detection::Unchanged => continue,
                        Detection::Create { supersedes } => supersedes,
                    };

                    let pv = PropertyValue {
                        property_value_id: mint(IdKind::PropertyValue),
                        workspace_id: workspace_id.to_string(),
                        property_key: prop.property_key.clone(),
                        value: Some(prop.value.displayed()),
                        value_type: prop.value_type,
                    };
                    self.gateway.insert_property_value(&pv).await?;

                    let assertion = AssertionRecord {
                        assertion_id: mint(IdKind::Assertion),
                        workspace_id: workspace_id.to_string(),
                        assertion_key,
                        relationship_type: HAS_PROPERTY.to_string(),
                        property_key: Some(prop.property_key.clone()),
                        raw_hash,
                        normalized_hash,
                        source_type: SourceType::Spreadsheet,
                        source_ref: Some(row.source_ref.clone()),
                        source_id: source_id.map(str::to_string),
                        import_run_id: Some(run.import_run_id.clone()),
                        recorded_at: now,
                        valid_from: now,
                        valid_to: None,
                        scenario_id: BASE_SCENARIO.to_string(),
                        confidence: 1.0,
                        supersedes,
                    };
                    self.gateway
                        .insert_assertion(&assertion, subject_id, &pv.property_value_id)
                        .await?;
                    created_ids.push(assertion.assertion_id);
                    stats.created += 1;
                }
            }

            for rel in &row.relationships {
                let from_key = (rel.from_entity_type.clone(), rel.from_primary_key.clone());
                let to_key = (rel.to_entity_type.clone(), rel.to_primary_key.clone());
                let (Some(from_id), Some(to_id)) =
                    (entity_ids.get(&from_key), entity_ids.get(&to_key))
                else {
                    continue;
                };
                let assertion_key = relationship_assertion_key(
                    workspace_id,
                    &rel.from_entity_type,
                    &rel.from_primary_key,
                    &rel.relationship_type,
                    &rel.to_entity_type,
                    &rel.to_primary_key,
                );
                seen_keys.insert(assertion_key.clone());

                // Relationship identity is its endpoints; both digests
                // coincide by construction.
                let content_hash = relationship_content_hash(&assertion_key);
                let supersedes = match self
                    .detect_change(
                        workspace_id,
                        &assertion_key,
                        &content_hash,
                        strict,
                        source_id,
                        now,
                        &mut stats,
                        &mut closed_ids,
                    )
                    .await?
                {
                    Detection::Unchanged => continue,
                    Detection::Create { supersedes } => supersedes,
                };

                let assertion = AssertionRecord {
                    assertion_id: mint(IdKind::Assertion),
                    workspace_id: workspace_id.to_string(),
                    assertion_key,
                    relationship_type: rel.relationship_type.clone(),
                    property_key: None,
                    raw_hash: content_hash.clone(),
                    normalized_hash: content_hash,
                    source_type: SourceType::Spreadsheet,
                    source_ref: Some(row.source_ref.clone()),
                    source_id: source_id.map(str::to_string),
                    import_run_id: Some(run.import_run_id.clone()),
                    recorded_at: now,
                    valid_from: now,
                    valid_to: None,
                    scenario_id: BASE_SCENARIO.to_string(),
                    confidence: 1.0,
                    supersedes,
                };
                self.gateway
                    .insert_assertion(&assertion, from_id, to_id)
                    .await?;
                created_ids.push(assertion.assertion_id);
                stats.created += 1;
            }
        }

        self.close_disappeared(
            workspace_id,
            &spec.spec_name,
            &seen_keys,
            source_id,
            now,
            &mut stats,
            &mut closed_ids,
        )
        .await?;

        Ok((stats, created_ids, closed_ids))
    }

    /// Step (3): first sighting creates the entity; later sightings are
    /// index hits. The alias cache spans the whole run.
    async fn upsert_entities(
        &self,
        workspace_id: &str,
        rows: &[StagedRow],
        stats: &mut ImportStats,
    ) -> Result<HashMap<(String, String), String>> {
        let mut entity_ids = HashMap::new();
        for row in rows {
            for candidate in &row.entities {
                let key = (candidate.entity_type.clone(), candidate.primary_key.clone());
                if entity_ids.contains_key(&key) {
                    continue;
                }
                let id = match self
                    .gateway
                    .find_entity(workspace_id, &candidate.entity_type, &candidate.primary_key)
                    .await?
                {
                    Some(existing) => {
                        stats.entities_existing += 1;
                        existing.entity_id
                    }
                    None => {
                        let created_at = Utc::now();
                        let entity = Entity {
                            entity_id: mint(IdKind::Entity),
                            workspace_id: workspace_id.to_string(),
                            entity_type: candidate.entity_type.clone(),
                            primary_key: candidate.primary_key.clone(),
                            display_name: Some(candidate.display_name.clone()),
                            created_at,
                            updated_at: created_at,
                        };
                        self.gateway.insert_entity(&entity).await?;
                        stats.entities_created += 1;
                        entity.entity_id
                    }
                };
                entity_ids.insert(key, id);
            }
        }
        Ok(entity_ids)
    }

    /// Step (5): the per-candidate outcome table. Claims from other
    /// sources are co-existing evidence and are never closed here.
    #[allow(clippy::too_many_arguments)]
    async fn detect_change(
        &self,
        workspace_id: &str,
        assertion_key: &str,
        comparison_hash: &str,
        strict: bool,
        source_id: Option<&str>,
        now: DateTime<Utc>,
        stats: &mut ImportStats,
        closed_ids: &mut Vec<String>,
    ) -> Result<Detection> {
        let existing = self
            .gateway
            .open_assertions_for_key(workspace_id, assertion_key, BASE_SCENARIO)
            .await?;
        let same_source: Vec<&AssertionRecord> = existing
            .iter()
            .filter(|a| is_same_source(a, source_id))
            .collect();

        if same_source.len() > 1 {
            return Err(Error::internal(format!(
                "invariant violation: {} open assertions for key {assertion_key} from one source",
                same_source.len()
            )));
        }

        match same_source.first() {
            Some(open) if open.comparison_hash(strict) == comparison_hash => {
                stats.unchanged += 1;
                Ok(Detection::Unchanged)
            }
            Some(open) => {
                self.gateway
                    .close_assertion(workspace_id, &open.assertion_id, now)
                    .await?;
                closed_ids.push(open.assertion_id.clone());
                stats.closed += 1;
                Ok(Detection::Create {
                    supersedes: Some(open.assertion_id.clone()),
                })
            }
            None => Ok(Detection::Create { supersedes: None }),
        }
    }

    /// Step (6): keys this spec asserted before but did not produce this
    /// time are closed, for this spec's source only.
    #[allow(clippy::too_many_arguments)]
    async fn close_disappeared(
        &self,
        workspace_id: &str,
        spec_name: &str,
        seen_keys: &HashSet<String>,
        source_id: Option<&str>,
        now: DateTime<Utc>,
        stats: &mut ImportStats,
        closed_ids: &mut Vec<String>,
    ) -> Result<()> {
        let previous_keys = self
            .gateway
            .open_assertion_keys_by_spec(workspace_id, spec_name)
            .await?;
        for key in previous_keys {
            if seen_keys.contains(&key) {
                continue;
            }
            let open = self
                .gateway
                .open_assertions_for_key(workspace_id, &key, BASE_SCENARIO)
                .await?;
            for record in open {
                if !is_same_source(&record, source_id) {
                    continue;
                }
                info!(key = %key, assertion = %record.assertion_id, "closing disappeared assertion");
                self.gateway
                    .close_assertion(workspace_id, &record.assertion_id, now)
                    .await?;
                closed_ids.push(record.assertion_id);
                stats.closed += 1;
            }
        }
        Ok(())
    }

    /// Delete assertions recorded under failed runs of this spec that no
    /// change event reaches (the visibility predicate).
    async fn reap_orphans(&self, workspace_id: &str, spec_name: &str) -> Result<()> {
        let runs = self.gateway.list_import_runs(workspace_id, 500).await?;
        for run in runs {
            if run.spec_name != spec_name || run.status != ImportStatus::Failed {
                continue;
            }
            let records = self
                .gateway
                .assertions_for_import_run(workspace_id, &run.import_run_id)
                .await?;
            for record in records {
                if self
                    .gateway
                    .is_created_linked(workspace_id, &record.assertion_id)
                    .await?
                {
                    continue;
                }
                warn!(
                    run = %run.import_run_id,
                    assertion = %record.assertion_id,
                    key = %record.assertion_key,
                    "reaping orphan assertion from failed run"
                );
                self.gateway
                    .delete_assertion(workspace_id, &record.assertion_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn register_source(
        &self,
        workspace_id: &str,
        authority: &SourceAuthority,
    ) -> Result<String> {
        let source = Source {
            source_id: mint(IdKind::Source),
            workspace_id: workspace_id.to_string(),
            source_name: authority.source_name.clone(),
            source_type: SourceType::Spreadsheet,
            authority_rank: authority.authority_rank,
            authority_domains: authority.authority_domains.clone(),
        };
        self.gateway.upsert_source(&source).await
    }
}

enum Detection {
    Unchanged,
    Create { supersedes: Option<String> },
}

fn is_same_source(record: &AssertionRecord, source_id: Option<&str>) -> bool {
    match (record.source_id.as_deref(), source_id) {
        (None, None) => true,
        (Some(a), Some(b)) => storage_form(a) == storage_form(b),
        _ => false,
    }
}
