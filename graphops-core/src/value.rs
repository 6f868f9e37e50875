//! Typed source-cell values and the property value-type enum.
//!
//! Source files are read as typed cells (dates are real dates, numbers
//! are real numbers); the hasher and the staging parser both operate on
//! this enum rather than on raw strings.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell read from a tabular source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing or blank cell
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// True for missing/blank cells.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The value as displayed in the source, without normalization.
    ///
    /// Numbers keep their natural formatting (`42`, `1.5`), booleans are
    /// lowercase literals, dates/datetimes use their ISO text form.
    pub fn displayed(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.to_string(),
            CellValue::DateTime(dt) => dt.to_string(),
        }
    }

    /// The property value type this cell would produce.
    pub fn value_type(&self) -> ValueType {
        match self {
            CellValue::Empty | CellValue::Text(_) => ValueType::String,
            CellValue::Int(_) | CellValue::Float(_) => ValueType::Number,
            CellValue::Bool(_) => ValueType::Boolean,
            CellValue::Date(_) | CellValue::DateTime(_) => ValueType::Date,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.displayed())
    }
}

/// Type tag carried on every PropertyValue vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Json => "json",
        }
    }

    /// Parse the lowercase wire form.
    pub fn parse(s: &str) -> Option<ValueType> {
        match s {
            "string" => Some(ValueType::String),
            "number" => Some(ValueType::Number),
            "boolean" => Some(ValueType::Boolean),
            "date" => Some(ValueType::Date),
            "json" => Some(ValueType::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
