//! The six vertex kinds of the GraphOps data model.
//!
//! Every vertex carries a mandatory `workspace_id` discriminator; no edge
//! may cross workspaces. AssertionRecords are append-only: after creation
//! only `valid_to` (exactly once, ∞ → concrete) and `supersedes` may be
//! written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pseudo relationship type marking property assertions.
pub const HAS_PROPERTY: &str = "HAS_PROPERTY";

/// Scenario label for reality (as opposed to what-if branches).
pub const BASE_SCENARIO: &str = "base";

/// Provenance category of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Spreadsheet,
    Api,
    Manual,
    Derived,
    Inferred,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Spreadsheet => "spreadsheet",
            SourceType::Api => "api",
            SourceType::Manual => "manual",
            SourceType::Derived => "derived",
            SourceType::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<SourceType> {
        match s {
            "spreadsheet" => Some(SourceType::Spreadsheet),
            "api" => Some(SourceType::Api),
            "manual" => Some(SourceType::Manual),
            "derived" => Some(SourceType::Derived),
            "inferred" => Some(SourceType::Inferred),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of atomic mutation a ChangeEvent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Import,
    ManualEdit,
    ManualResolve,
    ScenarioDelta,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Import => "import",
            EventType::ManualEdit => "manual_edit",
            EventType::ManualResolve => "manual_resolve",
            EventType::ScenarioDelta => "scenario_delta",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        match s {
            "import" => Some(EventType::Import),
            "manual_edit" => Some(EventType::ManualEdit),
            "manual_resolve" => Some(EventType::ManualResolve),
            "scenario_delta" => Some(EventType::ScenarioDelta),
            _ => None,
        }
    }
}

/// Lifecycle state of an ImportRun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Running,
    Ok,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Running => "running",
            ImportStatus::Ok => "ok",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<ImportStatus> {
        match s {
            "running" => Some(ImportStatus::Running),
            "ok" => Some(ImportStatus::Ok),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }
}

/// A domain object. Created on first sighting per
/// `(workspace_id, entity_type, primary_key)` and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub workspace_id: String,
    pub entity_type: String,
    pub primary_key: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A versioned, evidence-backed claim.
///
/// One record per (conceptual fact, source, validity segment). The
/// `assertion_key` identifies the conceptual fact and is shared across
/// sources and over time; `valid_to = None` means currently valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub assertion_id: String,
    pub workspace_id: String,
    pub assertion_key: String,
    /// Relationship type; [`HAS_PROPERTY`] for property assertions.
    pub relationship_type: String,
    /// Present iff this is a property assertion.
    pub property_key: Option<String>,
    pub raw_hash: String,
    pub normalized_hash: String,
    pub source_type: SourceType,
    /// Opaque provenance blob (file, sheet, row index, or API citation).
    pub source_ref: Option<String>,
    pub source_id: Option<String>,
    pub import_run_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    /// None = ∞ (currently valid). Written exactly once after creation.
    pub valid_to: Option<DateTime<Utc>>,
    pub scenario_id: String,
    pub confidence: f64,
    /// Prior record this one replaces, if any.
    pub supersedes: Option<String>,
}

impl AssertionRecord {
    /// Whether the record is currently valid (`valid_to = ∞`).
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether this is a property assertion (vs a relationship assertion).
    pub fn is_property(&self) -> bool {
        self.relationship_type == HAS_PROPERTY
    }

    /// The hash used for change detection under the given mode.
    pub fn comparison_hash(&self, strict: bool) -> &str {
        if strict {
            &self.raw_hash
        } else {
            &self.normalized_hash
        }
    }
}

/// Typed value object, only created via property assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property_value_id: String,
    pub workspace_id: String,
    pub property_key: String,
    pub value: Option<String>,
    pub value_type: crate::value::ValueType,
}

/// Counters attached to a ChangeEvent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub created: u64,
    pub closed: u64,
    pub unchanged: u64,
}

/// Causal container making a batch of assertion mutations visible.
///
/// Exactly one per ingestion run; exactly one per other atomic mutation.
/// `ts` and `descr` are deliberately not named `timestamp`/`desc`, which
/// are reserved words in the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub change_event_id: String,
    pub workspace_id: String,
    pub event_type: EventType,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub stats: ChangeStats,
    pub descr: String,
    pub import_run_id: Option<String>,
}

/// Metadata for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub import_run_id: String,
    pub workspace_id: String,
    pub spec_name: String,
    pub source_filename: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ImportStatus,
    pub stats: Option<ChangeStats>,
    pub error_message: Option<String>,
}

/// A registered source of claims.
///
/// Lower `authority_rank` means higher priority during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source_id: String,
    pub workspace_id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub authority_rank: i64,
    /// Entity/relationship types this source is authoritative for.
    pub authority_domains: Vec<String>,
}
