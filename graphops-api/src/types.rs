//! Response shapes of the query surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use graphops_core::{ChangeStats, LossReason};

/// How an entity's claims are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Resolved,
    AllClaims,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Resolved => "resolved",
            ViewMode::AllClaims => "all_claims",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceInfo {
    pub workspace_id: String,
    pub schema_version: String,
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub entity_type: String,
    pub primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One property claim in an entity detail view.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyView {
    pub property_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub value_type: String,
    pub assertion_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub confidence: f64,
    pub is_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost: Option<LossReason>,
}

/// One relationship claim in an entity detail view.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipView {
    pub relationship_type: String,
    pub target_entity_id: String,
    pub target_entity_type: String,
    pub target_primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_display_name: Option<String>,
    pub assertion_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub confidence: f64,
    pub is_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost: Option<LossReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDetail {
    pub entity_id: String,
    pub entity_type: String,
    pub primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub view_mode: ViewMode,
    pub scenario_id: String,
    pub as_of: DateTime<Utc>,
    pub properties: Vec<PropertyView>,
    pub relationships: Vec<RelationshipView>,
}

/// One assertion in an import diff, dereferenced for display.
#[derive(Debug, Clone, Serialize)]
pub struct ImportDiffEntry {
    pub assertion_id: String,
    pub assertion_key: String,
    pub relationship_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_key: Option<String>,
    /// Property value for property assertions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Object entity reference for relationship assertions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EntitySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub valid_from: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDiff {
    pub import_run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChangeStats>,
    pub created_assertions: Vec<ImportDiffEntry>,
    pub closed_assertions: Vec<ImportDiffEntry>,
}
