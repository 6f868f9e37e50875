//! Dual-hash engine and assertion-key composition.
//!
//! Every staged row gets two SHA-256 digests, both always stored:
//!
//! - `raw_hash` - canonical serialization of the displayed cell values.
//!   Detects any cell change at all.
//! - `normalized_hash` - same pipeline after per-cell normalization
//!   (trim, whitespace collapse, case-fold, null-token mapping, number
//!   and date formatting). Detects semantic changes only.
//!
//! The ingest spec's change-detection mode decides which digest drives
//! change detection; both are recorded on every assertion regardless.
//!
//! All functions here are deterministic and pure.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value::CellValue;

/// Which cells of a row enter the canonical serialization, in what order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellOrder {
    Preset(CellOrderPreset),
    /// Explicit header-name list; missing columns serialize as null.
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrderPreset {
    ColumnOrder,
}

/// Formatting directive for numbers and dates in the raw serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    AsDisplayed,
}

/// Canonical-serialization settings, all required so runs are
/// reproducible (no implicit defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHashSerialization {
    pub cell_order: CellOrder,
    pub delimiter: String,
    pub null_representation: String,
    pub number_format: DisplayFormat,
    pub date_format: DisplayFormat,
    pub include_formatting: bool,
}

/// Change-detection mode of an ingest spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDetectionMode {
    Strict,
    Normalized,
}

impl ChangeDetectionMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, ChangeDetectionMode::Strict)
    }
}

/// Per-cell normalization rules feeding `normalized_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRules {
    /// Trim leading/trailing whitespace and collapse internal runs.
    pub trim_whitespace: bool,
    /// Case-fold string cells to lowercase.
    pub lowercase_strings: bool,
    /// Tokens all mapped to the fixed null literal (empty string).
    pub normalize_nulls: Vec<String>,
    #[serde(default)]
    pub number_format: Option<NumberFormat>,
    /// Output pattern for dates (`YYYY-MM-DD` tokens). ISO-8601
    /// `YYYY-MM-DD` when absent.
    #[serde(default)]
    pub date_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal_places: u32,
}

/// SHA-256 of a UTF-8 string, 64-hex output.
pub fn digest(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Serialize one cell to its canonical (raw) string form.
pub fn serialize_cell(cell: &CellValue, spec: &RawHashSerialization) -> String {
    match cell {
        CellValue::Empty => spec.null_representation.clone(),
        // Booleans serialize as lowercase literals; numbers and dates
        // keep their displayed formatting (the only recognized directive).
        other => other.displayed(),
    }
}

/// Apply the normalization rules to one cell.
pub fn normalize_cell(cell: &CellValue, rules: &NormalizationRules) -> String {
    if cell.is_empty() {
        return String::new();
    }

    let displayed = cell.displayed();
    if rules.normalize_nulls.iter().any(|t| t == &displayed) {
        return String::new();
    }

    let mut s = displayed;
    if rules.trim_whitespace {
        s = collapse_whitespace(s.trim());
    }
    if rules.lowercase_strings && matches!(cell, CellValue::Text(_)) {
        s = s.to_lowercase();
    }

    match cell {
        CellValue::Int(_) | CellValue::Float(_) => {
            if let Some(nf) = &rules.number_format {
                if let Ok(n) = s.parse::<f64>() {
                    s = format!("{:.*}", nf.decimal_places as usize, n);
                }
            }
        }
        CellValue::Date(d) => {
            s = format_date(rules.date_format.as_deref(), d.format("%Y-%m-%d"));
        }
        CellValue::DateTime(dt) => {
            s = format_date(rules.date_format.as_deref(), dt.format("%Y-%m-%d"));
        }
        _ => {}
    }
    s
}

fn format_date(pattern: Option<&str>, iso: impl std::fmt::Display) -> String {
    let iso = iso.to_string();
    match pattern {
        // Patterns use YYYY/MM/DD tokens; the ISO form already is
        // YYYY-MM-DD, so re-assemble from its parts.
        Some(p) => {
            let mut parts = iso.splitn(3, '-');
            let (y, m, d) = (
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
            );
            p.replace("YYYY", y).replace("MM", m).replace("DD", d)
        }
        None => iso,
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// Select the cells entering the serialization per the declared order.
///
/// `headers` maps 0-based column positions to header names. Explicitly
/// listed columns that are absent from the row yield [`CellValue::Empty`].
pub fn select_cells(cells: &[CellValue], headers: &[String], order: &CellOrder) -> Vec<CellValue> {
    match order {
        CellOrder::Preset(CellOrderPreset::ColumnOrder) => cells.to_vec(),
        CellOrder::Columns(names) => names
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|i| cells.get(i))
                    .cloned()
                    .unwrap_or(CellValue::Empty)
            })
            .collect(),
    }
}

/// `raw_hash` of a staged row: serialized cells joined by the delimiter,
/// digested.
pub fn raw_row_hash(cells: &[CellValue], spec: &RawHashSerialization) -> String {
    let parts: Vec<String> = cells.iter().map(|c| serialize_cell(c, spec)).collect();
    digest(&parts.join(&spec.delimiter))
}

/// `normalized_hash` of a staged row: normalized cells joined by the
/// delimiter, digested.
pub fn normalized_row_hash(
    cells: &[CellValue],
    spec: &RawHashSerialization,
    rules: &NormalizationRules,
) -> String {
    let parts: Vec<String> = cells.iter().map(|c| normalize_cell(c, rules)).collect();
    digest(&parts.join(&spec.delimiter))
}

/// Content hashes of a single property-assertion candidate.
///
/// The content is the `(property_key, serialized value)` pair, isolating
/// per-assertion change detection from per-row noise.
pub fn property_content_hashes(
    property_key: &str,
    value: &CellValue,
    spec: &RawHashSerialization,
    rules: &NormalizationRules,
) -> (String, String) {
    let raw = digest(&format!(
        "{}{}{}",
        property_key,
        spec.delimiter,
        serialize_cell(value, spec)
    ));
    let normalized = digest(&format!(
        "{}{}{}",
        property_key,
        spec.delimiter,
        normalize_cell(value, rules)
    ));
    (raw, normalized)
}

/// Content hash of a relationship-assertion candidate.
///
/// Relationship identity is entirely in its endpoints, which the
/// assertion key already encodes, so raw and normalized digests coincide.
pub fn relationship_content_hash(assertion_key: &str) -> String {
    digest(assertion_key)
}

/// Assertion key of a property assertion:
/// `{workspace_id}:{entity_type}:{primary_key}:prop:{property_key}`.
pub fn property_assertion_key(
    workspace_id: &str,
    entity_type: &str,
    primary_key: &str,
    property_key: &str,
) -> String {
    format!("{workspace_id}:{entity_type}:{primary_key}:prop:{property_key}")
}

/// Assertion key of a relationship assertion:
/// `{workspace_id}:{from_type}:{from_pk}:{relationship_type}:{to_type}:{to_pk}`.
pub fn relationship_assertion_key(
    workspace_id: &str,
    from_type: &str,
    from_pk: &str,
    relationship_type: &str,
    to_type: &str,
    to_pk: &str,
) -> String {
    format!("{workspace_id}:{from_type}:{from_pk}:{relationship_type}:{to_type}:{to_pk}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw_spec() -> RawHashSerialization {
        RawHashSerialization {
            cell_order: CellOrder::Preset(CellOrderPreset::ColumnOrder),
            delimiter: "|".into(),
            null_representation: "<NULL>".into(),
            number_format: DisplayFormat::AsDisplayed,
            date_format: DisplayFormat::AsDisplayed,
            include_formatting: false,
        }
    }

    fn rules() -> NormalizationRules {
        NormalizationRules {
            trim_whitespace: true,
            lowercase_strings: true,
            normalize_nulls: vec!["".into(), "N/A".into(), "n/a".into(), "-".into()],
            number_format: None,
            date_format: None,
        }
    }

    #[test]
    fn raw_hash_is_deterministic() {
        let cells = vec![CellValue::Int(1001), CellValue::Text("east".into())];
        assert_eq!(raw_row_hash(&cells, &raw_spec()), raw_row_hash(&cells, &raw_spec()));
        assert_eq!(raw_row_hash(&cells, &raw_spec()).len(), 64);
    }

    #[test]
    fn raw_hash_sees_case_and_whitespace() {
        let a = vec![CellValue::Text("WEST".into())];
        let b = vec![CellValue::Text(" west ".into())];
        assert_ne!(raw_row_hash(&a, &raw_spec()), raw_row_hash(&b, &raw_spec()));
    }

    #[test]
    fn normalized_hash_ignores_case_and_whitespace() {
        let a = vec![CellValue::Text("WEST".into())];
        let b = vec![CellValue::Text("  west ".into())];
        let c = vec![CellValue::Text("we  st".into())];
        let d = vec![CellValue::Text("we st".into())];
        assert_eq!(
            normalized_row_hash(&a, &raw_spec(), &rules()),
            normalized_row_hash(&b, &raw_spec(), &rules())
        );
        // internal runs collapse to one space
        assert_eq!(
            normalized_row_hash(&c, &raw_spec(), &rules()),
            normalized_row_hash(&d, &raw_spec(), &rules())
        );
    }

    #[test]
    fn null_tokens_normalize_to_one_literal() {
        let spec = raw_spec();
        let r = rules();
        let na = normalize_cell(&CellValue::Text("N/A".into()), &r);
        let dash = normalize_cell(&CellValue::Text("-".into()), &r);
        let empty = normalize_cell(&CellValue::Empty, &r);
        assert_eq!(na, dash);
        assert_eq!(na, empty);
        // but the raw serialization distinguishes them
        assert_ne!(
            serialize_cell(&CellValue::Text("N/A".into()), &spec),
            serialize_cell(&CellValue::Empty, &spec)
        );
    }

    #[test]
    fn numbers_format_to_decimal_places() {
        let mut r = rules();
        r.number_format = Some(NumberFormat { decimal_places: 2 });
        assert_eq!(normalize_cell(&CellValue::Float(1.5), &r), "1.50");
        assert_eq!(normalize_cell(&CellValue::Int(3), &r), "3.00");
    }

    #[test]
    fn dates_normalize_to_iso() {
        let d = CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(normalize_cell(&d, &rules()), "2024-03-07");
        let mut r = rules();
        r.date_format = Some("DD/MM/YYYY".into());
        assert_eq!(normalize_cell(&d, &r), "07/03/2024");
    }

    #[test]
    fn booleans_serialize_lowercase() {
        assert_eq!(serialize_cell(&CellValue::Bool(true), &raw_spec()), "true");
        assert_eq!(serialize_cell(&CellValue::Bool(false), &raw_spec()), "false");
    }

    #[test]
    fn explicit_cell_order_selects_and_pads() {
        let headers = vec!["loc_id".to_string(), "region".to_string()];
        let cells = vec![CellValue::Int(1001), CellValue::Text("east".into())];
        let order = CellOrder::Columns(vec!["region".into(), "missing".into()]);
        let selected = select_cells(&cells, &headers, &order);
        assert_eq!(selected, vec![CellValue::Text("east".into()), CellValue::Empty]);
    }

    #[test]
    fn property_content_hash_isolates_the_candidate() {
        let spec = raw_spec();
        let r = rules();
        let (raw_a, norm_a) =
            property_content_hashes("region", &CellValue::Text("east".into()), &spec, &r);
        let (raw_b, norm_b) =
            property_content_hashes("region", &CellValue::Text("EAST".into()), &spec, &r);
        assert_ne!(raw_a, raw_b);
        assert_eq!(norm_a, norm_b);
        // a different key is a different conceptual fact
        let (raw_c, _) =
            property_content_hashes("zone", &CellValue::Text("east".into()), &spec, &r);
        assert_ne!(raw_a, raw_c);
    }

    #[test]
    fn assertion_key_formats() {
        assert_eq!(
            property_assertion_key("w1", "Location", "1001", "region"),
            "w1:Location:1001:prop:region"
        );
        assert_eq!(
            relationship_assertion_key("w1", "Device", "d1", "CONNECTS_TO", "Location", "1001"),
            "w1:Device:d1:CONNECTS_TO:Location:1001"
        );
    }
}
