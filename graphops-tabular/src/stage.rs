//! Staged-row extraction: applying an ingest spec to a cell grid.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use graphops_core::hash::{normalized_row_hash, raw_row_hash, select_cells};
use graphops_core::{CellValue, Result, ValueType};
use graphops_spec::{EntityMapping, IngestSpec, SheetSpec, Transform};

use crate::source::Table;

/// One parsed source row with its extraction results and dual hashes.
#[derive(Debug, Clone)]
pub struct StagedRow {
    pub sheet: String,
    /// 1-based row number within the sheet.
    pub row_index: usize,
    pub headers: Arc<Vec<String>>,
    /// Original typed cells, padded to header width.
    pub cells: Vec<CellValue>,
    pub entities: Vec<EntityCandidate>,
    pub relationships: Vec<RelationshipCandidate>,
    pub raw_hash: String,
    pub normalized_hash: String,
    /// Provenance blob stored on every assertion this row produces.
    pub source_ref: String,
}

#[derive(Debug, Clone)]
pub struct EntityCandidate {
    pub alias: String,
    pub entity_type: String,
    pub primary_key: String,
    pub display_name: String,
    pub properties: Vec<PropertyCandidate>,
}

#[derive(Debug, Clone)]
pub struct PropertyCandidate {
    pub property_key: String,
    pub value: CellValue,
    pub value_type: ValueType,
}

#[derive(Debug, Clone)]
pub struct RelationshipCandidate {
    pub relationship_type: String,
    pub from_entity_type: String,
    pub from_primary_key: String,
    pub to_entity_type: String,
    pub to_primary_key: String,
}

/// Apply the spec to the opened tables, producing staged rows across all
/// declared sheets. Sheets the spec names but the source lacks are
/// skipped with a warning; data problems drop candidates, not rows.
pub fn stage_tables(tables: &[Table], spec: &IngestSpec) -> Result<Vec<StagedRow>> {
    let mut out = Vec::new();
    for sheet_spec in &spec.sheets {
        let Some(table) = select_table(tables, sheet_spec) else {
            warn!(
                sheet = sheet_spec.sheet_name.as_deref().unwrap_or("<first>"),
                spec = %spec.spec_name,
                "sheet not found in source, skipping"
            );
            continue;
        };
        stage_sheet(table, sheet_spec, spec, &mut out);
    }
    Ok(out)
}

fn select_table<'a>(tables: &'a [Table], sheet_spec: &SheetSpec) -> Option<&'a Table> {
    if let Some(name) = &sheet_spec.sheet_name {
        // A CSV source exposes a single table whose name is the file
        // stem; a spec addressing its one sheet by name still applies.
        return tables
            .iter()
            .find(|t| &t.name == name)
            .or_else(|| (tables.len() == 1).then(|| &tables[0]));
    }
    if let Some(index) = sheet_spec.sheet_index {
        return tables.get(index);
    }
    tables.first()
}

fn stage_sheet(table: &Table, sheet_spec: &SheetSpec, spec: &IngestSpec, out: &mut Vec<StagedRow>) {
    let Some(header_cells) = table.rows.get(sheet_spec.header_row) else {
        warn!(sheet = %table.name, header_row = sheet_spec.header_row, "header row out of range");
        return;
    };
    let headers: Arc<Vec<String>> = Arc::new(
        header_cells
            .iter()
            .map(|c| c.displayed().trim().to_string())
            .collect(),
    );
    let width = headers.len();

    let mut skip: Vec<usize> = sheet_spec.skip_rows.clone().unwrap_or_default();
    skip.push(sheet_spec.header_row);

    for (idx, row) in table.rows.iter().enumerate() {
        if skip.contains(&idx) {
            continue;
        }
        let mut cells: Vec<CellValue> = row.iter().take(width).cloned().collect();
        cells.resize(width, CellValue::Empty);
        if cells.iter().all(CellValue::is_empty) {
            continue;
        }

        let selected = select_cells(&cells, &headers, &spec.raw_hash_serialization.cell_order);
        let raw_hash = raw_row_hash(&selected, &spec.raw_hash_serialization);
        let normalized_hash = normalized_row_hash(
            &selected,
            &spec.raw_hash_serialization,
            &spec.change_detection.normalization_rules,
        );

        let mut by_alias: BTreeMap<&str, &EntityCandidate> = BTreeMap::new();
        let mut entities = Vec::new();
        for (alias, mapping) in &sheet_spec.entities {
            if let Some(candidate) = extract_entity(alias, mapping, &cells, &headers) {
                entities.push(candidate);
            }
        }
        for candidate in &entities {
            by_alias.insert(candidate.alias.as_str(), candidate);
        }

        let relationships = sheet_spec
            .relationships
            .iter()
            .filter_map(|rel| {
                let from = by_alias.get(rel.from_entity.as_str())?;
                let to = by_alias.get(rel.to_entity.as_str())?;
                Some(RelationshipCandidate {
                    relationship_type: rel.relationship_type.clone(),
                    from_entity_type: from.entity_type.clone(),
                    from_primary_key: from.primary_key.clone(),
                    to_entity_type: to.entity_type.clone(),
                    to_primary_key: to.primary_key.clone(),
                })
            })
            .collect();

        let row_number = idx + 1;
        out.push(StagedRow {
            sheet: table.name.clone(),
            row_index: row_number,
            headers: headers.clone(),
            cells,
            entities,
            relationships,
            raw_hash,
            normalized_hash,
            source_ref: format!("sheet:{},row:{row_number}", table.name),
        });
    }
}

fn extract_entity(
    alias: &str,
    mapping: &EntityMapping,
    cells: &[CellValue],
    headers: &[String],
) -> Option<EntityCandidate> {
    // Key columns are source columns; a missing value drops the
    // candidate. Template substitution uses the trimmed displayed form.
    let mut primary_key = mapping.key_template.clone();
    for key in &mapping.key_columns {
        let cell = cell_by_header(cells, headers, key);
        let displayed = cell.displayed();
        let trimmed = displayed.trim();
        if cell.is_empty() || trimmed.is_empty() {
            return None;
        }
        primary_key = primary_key.replace(&format!("{{{key}}}"), trimmed);
    }

    let properties: Vec<PropertyCandidate> = mapping
        .properties
        .iter()
        .map(|column| {
            let raw = cell_by_header(cells, headers, &column.source_column);
            let value = match column.transform {
                Some(t) => apply_transform(raw, t),
                None => raw,
            };
            let value_type = column.value_type.unwrap_or_else(|| value.value_type());
            PropertyCandidate {
                property_key: column.target_property.clone(),
                value,
                value_type,
            }
        })
        .collect();

    let display_name = mapping
        .properties
        .iter()
        .zip(&properties)
        .filter(|(column, _)| !mapping.key_columns.contains(&column.source_column))
        .find_map(|(_, p)| (!p.value.is_empty()).then(|| p.value.displayed()))
        .unwrap_or_else(|| primary_key.clone());

    Some(EntityCandidate {
        alias: alias.to_string(),
        entity_type: mapping.entity_type.clone(),
        primary_key,
        display_name,
        properties,
    })
}

fn cell_by_header(cells: &[CellValue], headers: &[String], name: &str) -> CellValue {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| cells.get(i))
        .cloned()
        .unwrap_or(CellValue::Empty)
}

fn apply_transform(value: CellValue, transform: Transform) -> CellValue {
    if value.is_empty() {
        return value;
    }
    match transform {
        Transform::Strip => match value {
            CellValue::Text(s) => CellValue::Text(s.trim().to_string()),
            other => other,
        },
        Transform::Lower => match value {
            CellValue::Text(s) => CellValue::Text(s.to_lowercase()),
            other => other,
        },
        Transform::Upper => match value {
            CellValue::Text(s) => CellValue::Text(s.to_uppercase()),
            other => other,
        },
        Transform::Int => match value.displayed().trim().parse::<f64>() {
            Ok(n) => CellValue::Int(n as i64),
            Err(_) => value,
        },
        Transform::Float => match value.displayed().trim().parse::<f64>() {
            Ok(n) => CellValue::Float(n),
            Err(_) => value,
        },
    }
}
