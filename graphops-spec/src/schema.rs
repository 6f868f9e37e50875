//! Domain schemas: the entity and relationship types a workspace admits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use graphops_core::{Error, Result, ValueType};

/// Per-workspace domain schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSchema {
    /// Workspace this schema belongs to.
    pub workspace: String,
    pub version: String,
    #[serde(default)]
    pub entity_types: BTreeMap<String, EntityTypeDef>,
    #[serde(default)]
    pub relationship_types: BTreeMap<String, RelationshipTypeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    /// Property whose value forms the entity's primary key.
    pub primary_key: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    #[serde(rename = "from")]
    pub from_type: String,
    #[serde(rename = "to")]
    pub to_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DomainSchema {
    /// Parse and structurally validate a schema from YAML text.
    pub fn from_yaml(content: &str) -> Result<DomainSchema> {
        let schema: DomainSchema = serde_yaml::from_str(content)
            .map_err(|e| Error::validation(format!("invalid schema YAML: {e}")))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Structural integrity checks: the primary key must be a declared
    /// property, and relationship endpoints must name declared entity
    /// types.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        for (name, etype) in &self.entity_types {
            if !etype.properties.contains_key(&etype.primary_key) {
                errors.push(format!(
                    "entity '{name}': primary_key '{}' not found in properties",
                    etype.primary_key
                ));
            }
        }

        for (name, rel) in &self.relationship_types {
            if !self.entity_types.contains_key(&rel.from_type) {
                errors.push(format!(
                    "relationship '{name}': from '{}' is not a declared entity type",
                    rel.from_type
                ));
            }
            if !self.entity_types.contains_key(&rel.to_type) {
                errors.push(format!(
                    "relationship '{name}': to '{}' is not a declared entity type",
                    rel.to_type
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "schema '{}': {}",
                self.workspace,
                errors.join("; ")
            )))
        }
    }

    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
    }

    pub fn has_relationship_type(&self, name: &str) -> bool {
        self.relationship_types.contains_key(name)
    }
}
