//! Shared harness for import-pipeline integration tests.
//!
//! Builds a memory-gateway importer plus on-disk CSV/spec fixtures. Kept
//! centralized; individual test files intentionally do not use every
//! helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use graphops_graph::{GraphGateway, MemoryGateway};
use graphops_ingest::Importer;
use graphops_spec::{DomainSchema, IngestSpec};

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
"#;

pub fn schema() -> DomainSchema {
    DomainSchema::from_yaml(SCHEMA_YAML).unwrap()
}

/// The locations spec of the walkthrough scenarios: one sheet, Location
/// entities keyed on `loc_id`, a single `region` property.
pub fn locations_spec(mode: &str) -> IngestSpec {
    let yaml = format!(
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
  mode: {mode}
  normalization_rules:
    trim_whitespace: true
    lowercase_strings: true
    normalize_nulls: ["", "N/A", "n/a", "-"]
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
        key_template: "{{loc_id}}"
        properties:
          - {{ source_column: region, target_property: region }}
"#
    );
    IngestSpec::from_yaml(&yaml).unwrap()
}

/// A second spec claiming Connection speed, with configurable name and
/// authority rank, for multi-source scenarios.
pub fn connections_spec(spec_name: &str, source_name: &str, rank: i64) -> IngestSpec {
    let yaml = format!(
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
"#
    );
    IngestSpec::from_yaml(&yaml).unwrap()
}

pub fn write_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

pub struct Harness {
    pub gateway: Arc<MemoryGateway>,
    pub importer: Importer,
    pub dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    let gateway = Arc::new(MemoryGateway::new());
    let importer = Importer::new(gateway.clone() as Arc<dyn GraphGateway>);
    Harness {
        gateway,
        importer,
        dir: tempfile::tempdir().unwrap(),
    }
}
