//! Ingest specs: how one tabular source maps onto the graph.
//!
//! A spec names its target workspace, declares which sheets to read and
//! how rows become entity/relationship/property candidates, fixes the
//! canonical hash serialization (fully specified, so imports are
//! reproducible), and optionally registers the source's authority.
//! Unknown fields are rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use graphops_core::hash::{ChangeDetectionMode, NormalizationRules, RawHashSerialization};
use graphops_core::{Error, Result, ValueType};

use crate::schema::DomainSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestSpec {
    /// Unique name; the "previous import by same spec" lookup keys on it.
    pub spec_name: String,
    pub spec_version: String,
    pub workspace_id: String,
    pub raw_hash_serialization: RawHashSerialization,
    pub change_detection: ChangeDetection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_authority: Option<SourceAuthority>,
    pub sheets: Vec<SheetSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeDetection {
    pub mode: ChangeDetectionMode,
    pub normalization_rules: NormalizationRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceAuthority {
    pub source_name: String,
    /// Lower rank = higher priority during resolution.
    pub authority_rank: i64,
    #[serde(default)]
    pub authority_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_index: Option<usize>,
    /// 0-based row holding the column headers.
    #[serde(default)]
    pub header_row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rows: Option<Vec<usize>>,
    /// Entity extractions, keyed by alias (referenced by relationships).
    pub entities: BTreeMap<String, EntityMapping>,
    #[serde(default)]
    pub relationships: Vec<RelationshipMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityMapping {
    pub entity_type: String,
    /// Source columns whose values must be present for the candidate to
    /// exist; they are the only columns a key template may reference.
    pub key_columns: Vec<String>,
    /// Format string composing the primary key from key columns, e.g.
    /// `"{loc_id}"` or `"{site}_{rack}"`.
    pub key_template: String,
    pub properties: Vec<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Strip,
    Lower,
    Upper,
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipMapping {
    pub relationship_type: String,
    /// Alias of the subject entity within the same sheet.
    pub from_entity: String,
    /// Alias of the object entity within the same sheet.
    pub to_entity: String,
}

impl IngestSpec {
    /// Parse a spec from YAML text. Structural validation only; call
    /// [`IngestSpec::validate_against`] with the workspace schema before
    /// running an import.
    pub fn from_yaml(content: &str) -> Result<IngestSpec> {
        let spec: IngestSpec = serde_yaml::from_str(content)
            .map_err(|e| Error::validation(format!("invalid ingest spec YAML: {e}")))?;
        spec.validate_structure()?;
        Ok(spec)
    }

    /// Checks that do not need the domain schema: non-empty key columns,
    /// key-template placeholders resolvable, relationship aliases
    /// declared.
    pub fn validate_structure(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.sheets.is_empty() {
            errors.push("spec declares no sheets".to_string());
        }

        for (i, sheet) in self.sheets.iter().enumerate() {
            for (alias, entity) in &sheet.entities {
                if entity.key_columns.is_empty() {
                    errors.push(format!("entity '{alias}': key_columns must be non-empty"));
                }
                for placeholder in template_placeholders(&entity.key_template) {
                    if !entity.key_columns.contains(&placeholder) {
                        errors.push(format!(
                            "entity '{alias}': key_template placeholder '{{{placeholder}}}' \
                             is not listed in key_columns"
                        ));
                    }
                }
            }
            for rel in &sheet.relationships {
                for alias in [&rel.from_entity, &rel.to_entity] {
                    if !sheet.entities.contains_key(alias) {
                        errors.push(format!(
                            "sheet {i}: relationship '{}' references undeclared entity \
                             alias '{alias}'",
                            rel.relationship_type
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "spec '{}': {}",
                self.spec_name,
                errors.join("; ")
            )))
        }
    }

    /// Cross-validate against the workspace's domain schema: every
    /// referenced entity type and relationship type must be declared,
    /// and relationship endpoints must match the schema's declaration.
    pub fn validate_against(&self, schema: &DomainSchema) -> Result<()> {
        if schema.workspace != self.workspace_id {
            return Err(Error::validation(format!(
                "spec '{}' targets workspace '{}' but was validated against schema for '{}'",
                self.spec_name, self.workspace_id, schema.workspace
            )));
        }

        let mut errors = Vec::new();
        for sheet in &self.sheets {
            for (alias, entity) in &sheet.entities {
                if !schema.has_entity_type(&entity.entity_type) {
                    errors.push(format!(
                        "entity '{alias}': type '{}' is not declared in the workspace schema",
                        entity.entity_type
                    ));
                }
            }
            for rel in &sheet.relationships {
                let Some(def) = schema.relationship_types.get(&rel.relationship_type) else {
                    errors.push(format!(
                        "relationship type '{}' is not declared in the workspace schema",
                        rel.relationship_type
                    ));
                    continue;
                };
                let from_type = sheet
                    .entities
                    .get(&rel.from_entity)
                    .map(|e| e.entity_type.as_str());
                let to_type = sheet
                    .entities
                    .get(&rel.to_entity)
                    .map(|e| e.entity_type.as_str());
                if let Some(t) = from_type {
                    if t != def.from_type {
                        errors.push(format!(
                            "relationship '{}': from alias '{}' has type '{t}', schema expects '{}'",
                            rel.relationship_type, rel.from_entity, def.from_type
                        ));
                    }
                }
                if let Some(t) = to_type {
                    if t != def.to_type {
                        errors.push(format!(
                            "relationship '{}': to alias '{}' has type '{t}', schema expects '{}'",
                            rel.relationship_type, rel.to_entity, def.to_type
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "spec '{}': {}",
                self.spec_name,
                errors.join("; ")
            )))
        }
    }

    /// Whether change detection compares raw hashes.
    pub fn strict_mode(&self) -> bool {
        self.change_detection.mode.is_strict()
    }
}

/// Extract `{placeholder}` names from a key template.
fn template_placeholders(template: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        out.push(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + 1 + len + 1..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SPEC_YAML: &str = r#"
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
    normalize_nulls: ["", "N/A", "n/a", "-"]
source_authority:
  source_name: facilities_sheet
  authority_rank: 1
  authority_domains: [Location]
sheets:
  - sheet_name: Locations
    entities:
      location:
        entity_type: Location
        key_columns: [loc_id]
        key_template: "{loc_id}"
        properties:
          - { source_column: loc_id, target_property: loc_id }
          - { source_column: region, target_property: region }
"#;

    fn schema() -> DomainSchema {
        DomainSchema::from_yaml(
            r#"
workspace: datacenter
version: "1"
entity_types:
  Location:
    primary_key: loc_id
    properties:
      loc_id: { type: string, required: true }
      region: { type: string }
"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_and_validates_spec() {
        let spec = IngestSpec::from_yaml(SPEC_YAML).unwrap();
        assert_eq!(spec.spec_name, "locations_v1");
        assert!(!spec.strict_mode());
        spec.validate_against(&schema()).unwrap();
    }

    #[test]
    fn rejects_unknown_fields() {
        let with_extra = SPEC_YAML.replace("spec_version: \"1\"", "spec_version: \"1\"\nbogus: 1");
        assert!(IngestSpec::from_yaml(&with_extra).is_err());
    }

    #[test]
    fn rejects_missing_hash_settings() {
        // reproducibility rule: no implicit defaults for the serialization
        let without_delim = SPEC_YAML.replace("  delimiter: \"|\"\n", "");
        assert!(IngestSpec::from_yaml(&without_delim).is_err());
    }

    #[test]
    fn rejects_empty_key_columns() {
        let bad = SPEC_YAML.replace("key_columns: [loc_id]", "key_columns: []");
        let err = IngestSpec::from_yaml(&bad).unwrap_err();
        assert!(err.to_string().contains("key_columns"));
    }

    #[test]
    fn rejects_unresolvable_template_placeholder() {
        let bad = SPEC_YAML.replace("key_template: \"{loc_id}\"", "key_template: \"{nope}\"");
        let err = IngestSpec::from_yaml(&bad).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn rejects_types_missing_from_schema() {
        let spec = IngestSpec::from_yaml(&SPEC_YAML.replace("entity_type: Location", "entity_type: Rack"))
            .unwrap();
        let err = spec.validate_against(&schema()).unwrap_err();
        assert!(err.to_string().contains("Rack"));
    }

    #[test]
    fn rejects_undeclared_relationship_alias() {
        let bad = SPEC_YAML.to_string()
            + r#"    relationships:
      - { relationship_type: LOCATED_IN, from_entity: device, to_entity: location }
"#;
        let err = IngestSpec::from_yaml(&bad).unwrap_err();
        assert!(err.to_string().contains("device"));
    }

    #[test]
    fn placeholder_extraction() {
        assert_eq!(template_placeholders("{a}_{b}"), vec!["a", "b"]);
        assert!(template_placeholders("plain").is_empty());
    }
}
