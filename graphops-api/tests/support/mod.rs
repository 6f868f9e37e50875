//! Shared harness for query-surface integration tests.
//!
//! Kept centralized; individual test files intentionally do not use
//! every helper.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use graphops_api::GraphOps;
use graphops_core::id::mint;
use graphops_core::model::BASE_SCENARIO;
use graphops_core::{
    AssertionRecord, ChangeEvent, ChangeStats, EventType, IdKind, PropertyValue, SourceType,
    ValueType, HAS_PROPERTY,
};
use graphops_graph::{GraphGateway, MemoryGateway};
use graphops_spec::{DomainSchema, SchemaRegistry, SpecStore};

pub const SCHEMA_YAML: &str = r#"
workspace: datacenter
version: "1"
entity_types:
  Location:
    primary_key: loc_id
    properties:
      loc_id: { type: string, required: true }
      region: { type: string }
  Connection:
    primary_key: conn_id
    properties:
      conn_id: { type: string, required: true }
      speed: { type: string }
relationship_types:
  TERMINATES_AT:
    from: Connection
    to: Location
"#;

fn locations_spec_yaml() -> String {
    r#"
spec_name: locations_v1
spec_version: "1"
workspace_id: datacenter
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: "<NULL>"
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: normalized
  normalization_rules:
    trim_whitespace: true
    lowercase_strings: true
    normalize_nulls: [""]
source_authority:
  source_name: facilities_sheet
  authority_rank: 1
  authority_domains: [Location]
sheets:
  - sheet_name: locations
    entities:
      location:
        entity_type: Location
        key_columns: [loc_id]
        key_template: "{loc_id}"
        properties:
          - { source_column: region, target_property: region }
"#
    .to_string()
}

fn connections_spec_yaml(spec_name: &str, source_name: &str, rank: i64) -> String {
    format!(
        r#"
spec_name: {spec_name}
spec_version: "1"
workspace_id: datacenter
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: "<NULL>"
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: normalized
  normalization_rules:
    trim_whitespace: true
    lowercase_strings: true
    normalize_nulls: [""]
source_authority:
  source_name: {source_name}
  authority_rank: {rank}
  authority_domains: [Connection]
sheets:
  - sheet_name: connections
    entities:
      connection:
        entity_type: Connection
        key_columns: [conn_id]
        key_template: "{{conn_id}}"
        properties:
          - {{ source_column: speed, target_property: speed }}
      location:
        entity_type: Location
        key_columns: [loc_id]
        key_template: "{{loc_id}}"
        properties: []
    relationships:
      - {{ relationship_type: TERMINATES_AT, from_entity: connection, to_entity: location }}
"#
    )
}

pub struct ApiHarness {
    pub gateway: Arc<MemoryGateway>,
    pub ops: GraphOps,
    pub dir: tempfile::TempDir,
}

impl ApiHarness {
    pub fn write_csv(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    /// Record a manually-entered property claim the way a manual-edit
    /// action would: assertion + value vertex + its own change event.
    pub async fn insert_manual_property(
        &self,
        workspace_id: &str,
        entity_id: &str,
        entity_type: &str,
        primary_key: &str,
        property_key: &str,
        value: &str,
    ) -> AssertionRecord {
        let now = Utc::now();
        let pv = PropertyValue {
            property_value_id: mint(IdKind::PropertyValue),
            workspace_id: workspace_id.to_string(),
            property_key: property_key.to_string(),
            value: Some(value.to_string()),
            value_type: ValueType::String,
        };
        self.gateway.insert_property_value(&pv).await.unwrap();

        let assertion = AssertionRecord {
            assertion_id: mint(IdKind::Assertion),
            workspace_id: workspace_id.to_string(),
            assertion_key: format!("{workspace_id}:{entity_type}:{primary_key}:prop:{property_key}"),
            relationship_type: HAS_PROPERTY.to_string(),
            property_key: Some(property_key.to_string()),
            raw_hash: graphops_core::hash::digest(value),
            normalized_hash: graphops_core::hash::digest(value),
            source_type: SourceType::Manual,
            source_ref: Some("manual:operator".to_string()),
            source_id: None,
            import_run_id: None,
            recorded_at: now,
            valid_from: now,
            valid_to: None,
            scenario_id: BASE_SCENARIO.to_string(),
            confidence: 1.0,
            supersedes: None,
        };
        self.gateway
            .insert_assertion(&assertion, entity_id, &pv.property_value_id)
            .await
            .unwrap();

        let event = ChangeEvent {
            change_event_id: mint(IdKind::ChangeEvent),
            workspace_id: workspace_id.to_string(),
            event_type: EventType::ManualEdit,
            ts: now,
            actor: "operator".to_string(),
            stats: ChangeStats {
                created: 1,
                closed: 0,
                unchanged: 0,
            },
            descr: format!("manual edit of {property_key}"),
            import_run_id: None,
        };
        self.gateway
            .insert_change_event(&event, &[assertion.assertion_id.clone()], &[])
            .await
            .unwrap();
        assertion
    }
}

/// Gateway + facade over an in-memory registry, with spec fixtures on
/// disk for the by-name import path.
pub fn api() -> ApiHarness {
    let dir = tempfile::tempdir().unwrap();
    let specs_dir = dir.path().join("specs");
    std::fs::create_dir(&specs_dir).unwrap();
    std::fs::write(specs_dir.join("locations_v1.yaml"), locations_spec_yaml()).unwrap();
    std::fs::write(
        specs_dir.join("conn_a.yaml"),
        connections_spec_yaml("conn_a", "vendor_a", 1),
    )
    .unwrap();
    std::fs::write(
        specs_dir.join("conn_b.yaml"),
        connections_spec_yaml("conn_b", "vendor_b", 2),
    )
    .unwrap();

    let registry = Arc::new(SchemaRegistry::in_memory());
    registry
        .register(DomainSchema::from_yaml(SCHEMA_YAML).unwrap())
        .unwrap();

    let gateway = Arc::new(MemoryGateway::new());
    let ops = GraphOps::new(
        gateway.clone() as Arc<dyn GraphGateway>,
        registry,
        Arc::new(SpecStore::new(&specs_dir)),
    );
    ApiHarness { gateway, ops, dir }
}
