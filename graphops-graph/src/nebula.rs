//! NebulaGraph gateway: nGQL over the NebulaGraph HTTP gateway.
//!
//! The platform talks to graphd through the nebula-http-gateway sidecar:
//! `POST /api/db/connect` opens a session (the returned token is replayed
//! in the `nsid` header) and `POST /api/db/exec` runs one nGQL string,
//! answering `{code, message, data: {headers, tables}}` where `tables` is
//! a list of column-name → value rows.
//!
//! Decoding rules (the store's quirks end here):
//! - JSON `null`, a missing column, and the literal `"__NULL__"` all
//!   decode to `None`.
//! - Datetimes arrive as ISO strings (`T` or space separated, optional
//!   fraction) or epoch seconds; both decode to `DateTime<Utc>`.
//! - Vertex ids come back bare and are re-prefixed by kind.
//!
//! Read statements are retried with bounded exponential backoff; writes
//! are executed exactly once (recovery is the orphan reaper's job).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use graphops_core::id::display_form;
use graphops_core::{
    AssertionRecord, ChangeEvent, ChangeStats, Entity, Error, EventType, IdKind, ImportRun,
    ImportStatus, PropertyValue, Result, Source, SourceType, ValueType,
};

use crate::gateway::{EventLink, GraphGateway};
use crate::ngql;

const READ_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Connection settings for the NebulaGraph HTTP gateway.
#[derive(Debug, Clone)]
pub struct NebulaConfig {
    /// Base URL of the HTTP gateway, e.g. `http://127.0.0.1:8080`.
    pub gateway_url: String,
    /// graphd host/port the gateway should dial.
    pub graphd_host: String,
    pub graphd_port: u16,
    pub username: String,
    pub password: String,
    /// Graph space holding all GraphOps state.
    pub space: String,
}

/// One decoded result set.
struct ResultSet {
    rows: Vec<Map<String, Json>>,
}

struct Client {
    http: reqwest::Client,
    config: NebulaConfig,
    session: tokio::sync::Mutex<Option<String>>,
}

#[derive(serde::Deserialize)]
struct GatewayResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Json,
}

impl Client {
    fn new(config: NebulaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            session: tokio::sync::Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<String> {
        let url = format!(
            "{}/api/db/connect",
            self.config.gateway_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "username": self.config.username,
            "password": self.config.password,
            "address": self.config.graphd_host,
            "port": self.config.graphd_port,
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::store(format!("graph gateway unreachable: {e}")))?;
        let parsed: GatewayResponse = response
            .json()
            .await
            .map_err(|e| Error::store(format!("malformed connect response: {e}")))?;
        if parsed.code != 0 {
            return Err(Error::store(format!(
                "graph session open failed: {}",
                parsed.message
            )));
        }
        let nsid = match &parsed.data {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        debug!("opened graph session");
        Ok(nsid)
    }

    async fn session_id(&self) -> Result<String> {
        let mut guard = self.session.lock().await;
        if let Some(nsid) = guard.as_ref() {
            return Ok(nsid.clone());
        }
        let nsid = self.connect().await?;
        *guard = Some(nsid.clone());
        Ok(nsid)
    }

    async fn drop_session(&self) {
        *self.session.lock().await = None;
    }

    /// Run one statement in the configured space.
    async fn execute_once(&self, stmt: &str) -> Result<ResultSet> {
        let nsid = self.session_id().await?;
        let url = format!(
            "{}/api/db/exec",
            self.config.gateway_url.trim_end_matches('/')
        );
        let gql = format!("USE {};{stmt}", self.config.space);
        let response = self
            .http
            .post(&url)
            .header("nsid", nsid)
            .json(&serde_json::json!({ "gql": gql }))
            .send()
            .await
            .map_err(|e| Error::store(format!("graph gateway unreachable: {e}")))?;
        if response.status().is_server_error() {
            return Err(Error::store(format!(
                "graph gateway returned {}",
                response.status()
            )));
        }
        let parsed: GatewayResponse = response
            .json()
            .await
            .map_err(|e| Error::store(format!("malformed exec response: {e}")))?;
        if parsed.code != 0 {
            // Expired sessions must not poison subsequent calls.
            if parsed.message.contains("Session") || parsed.message.contains("session") {
                self.drop_session().await;
            }
            return Err(Error::store(format!(
                "nGQL failed: {} (statement: {stmt})",
                parsed.message
            )));
        }
        let rows = parsed
            .data
            .get("tables")
            .and_then(Json::as_array)
            .map(|tables| {
                tables
                    .iter()
                    .filter_map(|row| row.as_object().cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ResultSet { rows })
    }

    /// Idempotent read: bounded retries with exponential backoff on
    /// transport-level failures.
    async fn execute_read(&self, stmt: &str) -> Result<ResultSet> {
        let mut last = None;
        for attempt in 0..READ_ATTEMPTS {
            match self.execute_once(stmt).await {
                Ok(rs) => return Ok(rs),
                Err(e) => {
                    let transient = e.to_string().contains("unreachable")
                        || e.to_string().contains("returned 5");
                    if !transient {
                        return Err(e);
                    }
                    warn!(attempt, error = %e, "transient graph read failure");
                    last = Some(e);
                    tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt)).await;
                }
            }
        }
        Err(last.unwrap_or_else(|| Error::store("graph read failed")))
    }

    /// Writes run exactly once; the caller owns recovery.
    async fn execute_write(&self, stmt: &str) -> Result<ResultSet> {
        self.execute_once(stmt).await
    }
}

// --- row decoding ---

fn opt_string(row: &Map<String, Json>, col: &str) -> Option<String> {
    match row.get(col) {
        None | Some(Json::Null) => None,
        Some(Json::String(s)) if s == "__NULL__" => None,
        Some(Json::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn string(row: &Map<String, Json>, col: &str) -> Result<String> {
    opt_string(row, col).ok_or_else(|| Error::store(format!("column '{col}' missing in result")))
}

fn i64_col(row: &Map<String, Json>, col: &str) -> Result<i64> {
    match row.get(col) {
        Some(Json::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::store(format!("column '{col}' is not an integer"))),
        Some(Json::String(s)) => s
            .parse()
            .map_err(|_| Error::store(format!("column '{col}' is not an integer"))),
        _ => Err(Error::store(format!("column '{col}' missing in result"))),
    }
}

fn f64_col(row: &Map<String, Json>, col: &str) -> Result<f64> {
    match row.get(col) {
        Some(Json::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::store(format!("column '{col}' is not a number"))),
        Some(Json::String(s)) => s
            .parse()
            .map_err(|_| Error::store(format!("column '{col}' is not a number"))),
        _ => Err(Error::store(format!("column '{col}' missing in result"))),
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn opt_datetime(row: &Map<String, Json>, col: &str) -> Result<Option<DateTime<Utc>>> {
    match row.get(col) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) if s == "__NULL__" => Ok(None),
        Some(Json::String(s)) => parse_datetime(s)
            .map(Some)
            .ok_or_else(|| Error::store(format!("column '{col}' has unparsable datetime '{s}'"))),
        Some(Json::Number(n)) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| Error::store(format!("column '{col}' has invalid epoch")))?;
            DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or_else(|| Error::store(format!("column '{col}' has out-of-range epoch")))
        }
        Some(other) => Err(Error::store(format!(
            "column '{col}' has undecodable datetime {other}"
        ))),
    }
}

fn datetime(row: &Map<String, Json>, col: &str) -> Result<DateTime<Utc>> {
    opt_datetime(row, col)?
        .ok_or_else(|| Error::store(format!("column '{col}' missing in result")))
}

fn opt_id(row: &Map<String, Json>, col: &str, kind: IdKind) -> Option<String> {
    opt_string(row, col).map(|s| display_form(kind, &s))
}

fn decode_entity(row: &Map<String, Json>) -> Result<Entity> {
    Ok(Entity {
        entity_id: display_form(IdKind::Entity, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        entity_type: string(row, "entity_type")?,
        primary_key: string(row, "primary_key")?,
        display_name: opt_string(row, "display_name"),
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

fn decode_assertion(row: &Map<String, Json>) -> Result<AssertionRecord> {
    let source_type_raw = string(row, "source_type")?;
    let source_type = SourceType::parse(&source_type_raw)
        .ok_or_else(|| Error::store(format!("unknown source_type '{source_type_raw}'")))?;
    Ok(AssertionRecord {
        assertion_id: display_form(IdKind::Assertion, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        assertion_key: string(row, "assertion_key")?,
        relationship_type: string(row, "relationship_type")?,
        property_key: opt_string(row, "property_key"),
        raw_hash: string(row, "raw_hash")?,
        normalized_hash: string(row, "normalized_hash")?,
        source_type,
        source_ref: opt_string(row, "source_ref"),
        source_id: opt_id(row, "source_id", IdKind::Source),
        import_run_id: opt_id(row, "import_run_id", IdKind::ImportRun),
        recorded_at: datetime(row, "recorded_at")?,
        valid_from: datetime(row, "valid_from")?,
        valid_to: opt_datetime(row, "valid_to")?,
        scenario_id: string(row, "scenario_id")?,
        confidence: f64_col(row, "confidence")?,
        supersedes: opt_id(row, "supersedes", IdKind::Assertion),
    })
}

fn decode_property_value(row: &Map<String, Json>) -> Result<PropertyValue> {
    let value_type_raw = string(row, "value_type")?;
    Ok(PropertyValue {
        property_value_id: display_form(IdKind::PropertyValue, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        property_key: string(row, "property_key")?,
        value: opt_string(row, "value"),
        value_type: ValueType::parse(&value_type_raw)
            .ok_or_else(|| Error::store(format!("unknown value_type '{value_type_raw}'")))?,
    })
}

fn decode_change_event(row: &Map<String, Json>) -> Result<ChangeEvent> {
    let event_type_raw = string(row, "event_type")?;
    let stats_raw = string(row, "stats")?;
    let stats: ChangeStats = serde_json::from_str(&stats_raw)
        .map_err(|e| Error::store(format!("undecodable event stats '{stats_raw}': {e}")))?;
    Ok(ChangeEvent {
        change_event_id: display_form(IdKind::ChangeEvent, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        event_type: EventType::parse(&event_type_raw)
            .ok_or_else(|| Error::store(format!("unknown event_type '{event_type_raw}'")))?,
        ts: datetime(row, "ts")?,
        actor: string(row, "actor")?,
        stats,
        descr: string(row, "descr")?,
        import_run_id: opt_id(row, "import_run_id", IdKind::ImportRun),
    })
}

fn decode_import_run(row: &Map<String, Json>) -> Result<ImportRun> {
    let status_raw = string(row, "status")?;
    let stats = match opt_string(row, "stats") {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| Error::store(format!("undecodable run stats '{raw}': {e}")))?,
        ),
        None => None,
    };
    Ok(ImportRun {
        import_run_id: display_form(IdKind::ImportRun, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        spec_name: string(row, "spec_name")?,
        source_filename: string(row, "source_filename")?,
        started_at: datetime(row, "started_at")?,
        finished_at: opt_datetime(row, "finished_at")?,
        status: ImportStatus::parse(&status_raw)
            .ok_or_else(|| Error::store(format!("unknown import status '{status_raw}'")))?,
        stats,
        error_message: opt_string(row, "error_message"),
    })
}

fn decode_source(row: &Map<String, Json>) -> Result<Source> {
    let source_type_raw = string(row, "source_type")?;
    let domains_raw = string(row, "authority_domains")?;
    let authority_domains: Vec<String> = serde_json::from_str(&domains_raw)
        .map_err(|e| Error::store(format!("undecodable authority_domains '{domains_raw}': {e}")))?;
    Ok(Source {
        source_id: display_form(IdKind::Source, &string(row, "vid")?),
        workspace_id: string(row, "workspace_id")?,
        source_name: string(row, "source_name")?,
        source_type: SourceType::parse(&source_type_raw)
            .ok_or_else(|| Error::store(format!("unknown source_type '{source_type_raw}'")))?,
        authority_rank: i64_col(row, "authority_rank")?,
        authority_domains,
    })
}

/// GraphGateway backed by NebulaGraph.
pub struct NebulaGateway {
    client: Client,
}

impl NebulaGateway {
    pub fn new(config: NebulaConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn fetch_assertions(&self, vids: Vec<String>) -> Result<Vec<AssertionRecord>> {
        if vids.is_empty() {
            return Ok(Vec::new());
        }
        let rs = self.client.execute_read(&ngql::fetch_assertions(&vids)).await?;
        rs.rows.iter().map(decode_assertion).collect()
    }

    async fn assertion_vids(&self, stmt: &str) -> Result<Vec<String>> {
        let rs = self.client.execute_read(stmt).await?;
        rs.rows.iter().map(|row| string(row, "vid")).collect()
    }

    async fn out_neighbors(&self, vertex_id: &str) -> Result<Vec<String>> {
        let rs = self
            .client
            .execute_read(&ngql::go_out_asserted(vertex_id))
            .await?;
        rs.rows.iter().map(|row| string(row, "dst")).collect()
    }
}

#[async_trait]
impl GraphGateway for NebulaGateway {
    async fn ping(&self) -> Result<()> {
        self.client.execute_read("YIELD 1;").await.map(|_| ())
    }

    async fn insert_entity(&self, entity: &Entity) -> Result<()> {
        if self
            .find_entity(&entity.workspace_id, &entity.entity_type, &entity.primary_key)
            .await?
            .is_some()
        {
            return Err(Error::conflict(format!(
                "entity already exists: ({}, {}, {})",
                entity.workspace_id, entity.entity_type, entity.primary_key
            )));
        }
        self.client
            .execute_write(&ngql::insert_entity(entity))
            .await
            .map(|_| ())
    }

    async fn find_entity(
        &self,
        workspace_id: &str,
        entity_type: &str,
        primary_key: &str,
    ) -> Result<Option<Entity>> {
        let rs = self
            .client
            .execute_read(&ngql::lookup_entity(workspace_id, entity_type, primary_key))
            .await?;
        rs.rows.first().map(decode_entity).transpose()
    }

    async fn get_entity(&self, workspace_id: &str, entity_id: &str) -> Result<Option<Entity>> {
        let rs = self.client.execute_read(&ngql::fetch_entity(entity_id)).await?;
        let entity = rs.rows.first().map(decode_entity).transpose()?;
        Ok(entity.filter(|e| e.workspace_id == workspace_id))
    }

    async fn search_entities(
        &self,
        workspace_id: &str,
        entity_type: Option<&str>,
        primary_key: Option<&str>,
        q: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        // The display-name substring filter cannot be pushed into a
        // LOOKUP, so over-fetch and filter here when it is present.
        let fetch_limit = if q.is_some() { limit.max(500) } else { limit };
        let rs = self
            .client
            .execute_read(&ngql::search_entities(
                workspace_id,
                entity_type,
                primary_key,
                fetch_limit,
            ))
            .await?;
        let mut entities: Vec<Entity> =
            rs.rows.iter().map(decode_entity).collect::<Result<_>>()?;
        if let Some(q) = q {
            let needle = q.to_lowercase();
            entities.retain(|e| {
                e.display_name
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
            });
        }
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entities.truncate(limit);
        Ok(entities)
    }

    async fn insert_assertion(
        &self,
        assertion: &AssertionRecord,
        subject_id: &str,
        object_id: &str,
    ) -> Result<()> {
        self.client
            .execute_write(&ngql::insert_assertion(assertion))
            .await?;
        self.client
            .execute_write(&ngql::insert_asserted_rel(
                subject_id,
                &assertion.assertion_id,
                &assertion.assertion_id,
            ))
            .await?;
        self.client
            .execute_write(&ngql::insert_asserted_rel(
                &assertion.assertion_id,
                object_id,
                &assertion.assertion_id,
            ))
            .await?;
        Ok(())
    }

    async fn close_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<()> {
        let existing = self
            .fetch_assertions(vec![assertion_id.to_string()])
            .await?
            .into_iter()
            .find(|a| a.workspace_id == workspace_id)
            .ok_or_else(|| Error::not_found(format!("assertion {assertion_id}")))?;
        if !existing.is_open() {
            return Err(Error::conflict(format!(
                "assertion {assertion_id} ({}) is already closed",
                existing.assertion_key
            )));
        }
        self.client
            .execute_write(&ngql::close_assertion(assertion_id, valid_to))
            .await
            .map(|_| ())
    }

    async fn delete_assertion(&self, workspace_id: &str, assertion_id: &str) -> Result<()> {
        // Scope check before the destructive statement.
        let found = self
            .fetch_assertions(vec![assertion_id.to_string()])
            .await?
            .into_iter()
            .any(|a| a.workspace_id == workspace_id);
        if !found {
            return Err(Error::not_found(format!("assertion {assertion_id}")));
        }
        self.client
            .execute_write(&ngql::delete_vertex(assertion_id))
            .await
            .map(|_| ())
    }

    async fn open_assertions_for_key(
        &self,
        workspace_id: &str,
        assertion_key: &str,
        scenario_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let vids = self
            .assertion_vids(&ngql::lookup_assertion_vids_by_key(
                workspace_id,
                assertion_key,
                scenario_id,
            ))
            .await?;
        let mut records = self.fetch_assertions(vids).await?;
        records.retain(|a| a.is_open());
        records.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(records)
    }

    async fn open_assertions_for_entity(
        &self,
        workspace_id: &str,
        entity_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let vids = self.out_neighbors(entity_id).await?;
        let mut records = self.fetch_assertions(vids).await?;
        records.retain(|a| a.workspace_id == workspace_id && a.is_open());
        records.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(records)
    }

    async fn assertions_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Vec<AssertionRecord>> {
        let vids = self
            .assertion_vids(&ngql::lookup_assertion_vids_by_run(import_run_id))
            .await?;
        let mut records = self.fetch_assertions(vids).await?;
        records.retain(|a| a.workspace_id == workspace_id);
        records.sort_by(|a, b| a.assertion_id.cmp(&b.assertion_id));
        Ok(records)
    }

    async fn open_assertion_keys_by_spec(
        &self,
        workspace_id: &str,
        spec_name: &str,
    ) -> Result<Vec<String>> {
        let rs = self
            .client
            .execute_read(&ngql::lookup_import_runs_by_spec(workspace_id, spec_name))
            .await?;
        let runs: Vec<ImportRun> = rs.rows.iter().map(decode_import_run).collect::<Result<_>>()?;

        let mut keys = std::collections::HashSet::new();
        for run in runs {
            let records = self
                .assertions_for_import_run(workspace_id, &run.import_run_id)
                .await?;
            for record in records {
                if record.is_open() {
                    keys.insert(record.assertion_key);
                }
            }
        }
        let mut out: Vec<String> = keys.into_iter().collect();
        out.sort();
        Ok(out)
    }

    async fn is_created_linked(&self, _workspace_id: &str, assertion_id: &str) -> Result<bool> {
        let rs = self
            .client
            .execute_read(&ngql::go_created_by(assertion_id))
            .await?;
        Ok(!rs.rows.is_empty())
    }

    async fn insert_property_value(&self, pv: &PropertyValue) -> Result<()> {
        self.client
            .execute_write(&ngql::insert_property_value(pv))
            .await
            .map(|_| ())
    }

    async fn property_value_for_assertion(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<PropertyValue>> {
        for dst in self.out_neighbors(assertion_id).await? {
            let rs = self
                .client
                .execute_read(&ngql::fetch_property_value(&dst))
                .await?;
            if let Some(row) = rs.rows.first() {
                let pv = decode_property_value(row)?;
                if pv.workspace_id == workspace_id {
                    return Ok(Some(pv));
                }
            }
        }
        Ok(None)
    }

    async fn relationship_target(
        &self,
        workspace_id: &str,
        assertion_id: &str,
    ) -> Result<Option<Entity>> {
        for dst in self.out_neighbors(assertion_id).await? {
            let rs = self.client.execute_read(&ngql::fetch_entity(&dst)).await?;
            if let Some(row) = rs.rows.first() {
                let entity = decode_entity(row)?;
                if entity.workspace_id == workspace_id {
                    return Ok(Some(entity));
                }
            }
        }
        Ok(None)
    }

    async fn insert_change_event(
        &self,
        event: &ChangeEvent,
        created: &[String],
        closed: &[String],
    ) -> Result<()> {
        let stats_json = serde_json::to_string(&event.stats)?;
        self.client
            .execute_write(&ngql::insert_change_event(event, &stats_json))
            .await?;
        if let Some(run_id) = &event.import_run_id {
            self.client
                .execute_write(&ngql::insert_event_link(
                    "TRIGGERED_BY",
                    &event.change_event_id,
                    run_id,
                ))
                .await?;
        }
        for aid in created {
            self.client
                .execute_write(&ngql::insert_event_link(
                    "CREATED_ASSERTION",
                    &event.change_event_id,
                    aid,
                ))
                .await?;
        }
        for aid in closed {
            self.client
                .execute_write(&ngql::insert_event_link(
                    "CLOSED_ASSERTION",
                    &event.change_event_id,
                    aid,
                ))
                .await?;
        }
        Ok(())
    }

    async fn change_event_for_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ChangeEvent>> {
        let rs = self
            .client
            .execute_read(&ngql::lookup_change_event_by_run(workspace_id, import_run_id))
            .await?;
        let Some(row) = rs.rows.first() else {
            return Ok(None);
        };
        let vid = string(row, "vid")?;
        let rs = self
            .client
            .execute_read(&ngql::fetch_change_event(&vid))
            .await?;
        rs.rows.first().map(decode_change_event).transpose()
    }

    async fn event_assertions(
        &self,
        workspace_id: &str,
        change_event_id: &str,
        link: EventLink,
    ) -> Result<Vec<AssertionRecord>> {
        let edge_name = match link {
            EventLink::Created => "CREATED_ASSERTION",
            EventLink::Closed => "CLOSED_ASSERTION",
        };
        let rs = self
            .client
            .execute_read(&ngql::go_event_links(change_event_id, edge_name))
            .await?;
        let vids: Vec<String> = rs
            .rows
            .iter()
            .map(|row| string(row, "dst"))
            .collect::<Result<_>>()?;
        let mut records = self.fetch_assertions(vids).await?;
        records.retain(|a| a.workspace_id == workspace_id);
        Ok(records)
    }

    async fn insert_import_run(&self, run: &ImportRun) -> Result<()> {
        let stats_json = run.stats.map(|s| serde_json::to_string(&s)).transpose()?;
        self.client
            .execute_write(&ngql::insert_import_run(run, stats_json.as_deref()))
            .await
            .map(|_| ())
    }

    async fn update_import_run(&self, run: &ImportRun) -> Result<()> {
        let stats_json = run.stats.map(|s| serde_json::to_string(&s)).transpose()?;
        self.client
            .execute_write(&ngql::update_import_run(run, stats_json.as_deref()))
            .await
            .map(|_| ())
    }

    async fn get_import_run(
        &self,
        workspace_id: &str,
        import_run_id: &str,
    ) -> Result<Option<ImportRun>> {
        let rs = self
            .client
            .execute_read(&ngql::fetch_import_run(import_run_id))
            .await?;
        let run = rs.rows.first().map(decode_import_run).transpose()?;
        Ok(run.filter(|r| r.workspace_id == workspace_id))
    }

    async fn list_import_runs(&self, workspace_id: &str, limit: usize) -> Result<Vec<ImportRun>> {
        let rs = self
            .client
            .execute_read(&ngql::lookup_import_runs(workspace_id))
            .await?;
        let mut runs: Vec<ImportRun> =
            rs.rows.iter().map(decode_import_run).collect::<Result<_>>()?;
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.import_run_id.cmp(&a.import_run_id))
        });
        runs.truncate(limit);
        Ok(runs)
    }

    async fn upsert_source(&self, source: &Source) -> Result<String> {
        let domains_json = serde_json::to_string(&source.authority_domains)?;
        let rs = self
            .client
            .execute_read(&ngql::lookup_source_by_name(
                &source.workspace_id,
                &source.source_name,
            ))
            .await?;
        // INSERT VERTEX on an existing vid rewrites its properties, which
        // is exactly the upsert we want once the id is pinned.
        let effective_id = match rs.rows.first() {
            Some(row) => display_form(IdKind::Source, &string(row, "vid")?),
            None => source.source_id.clone(),
        };
        let mut pinned = source.clone();
        pinned.source_id = effective_id.clone();
        self.client
            .execute_write(&ngql::insert_source(&pinned, &domains_json))
            .await?;
        Ok(effective_id)
    }

    async fn list_sources(&self, workspace_id: &str) -> Result<Vec<Source>> {
        let rs = self
            .client
            .execute_read(&ngql::lookup_sources(workspace_id))
            .await?;
        let mut sources: Vec<Source> =
            rs.rows.iter().map(decode_source).collect::<Result<_>>()?;
        sources.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        Ok(sources)
    }
}
