//! Reading tabular sources into typed cell grids.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read through calamine,
//! which yields computed cell values (cached formula results, never
//! formula text). CSV files come in as text cells.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Timelike;

use graphops_core::{CellValue, Error, Result};

/// One sheet (or the whole CSV file) as a grid of typed cells.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// Open a source file, dispatching on extension. A workbook yields one
/// [`Table`] per sheet; a CSV yields a single table named after the file.
pub fn open_source(path: &Path) -> Result<Vec<Table>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(vec![read_csv(path)?]),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        other => Err(Error::validation(format!(
            "unsupported source file type '.{other}' (expected spreadsheet or CSV): {}",
            path.display()
        ))),
    }
}

/// Read every sheet of a workbook.
pub fn read_workbook(path: &Path) -> Result<Vec<Table>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::validation(format!("cannot open workbook {}: {e}", path.display())))?;

    let mut tables = Vec::new();
    let names = workbook.sheet_names().to_owned();
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::validation(format!("cannot read sheet '{name}': {e}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();
        tables.push(Table { name, rows });
    }
    Ok(tables)
}

/// Read a CSV file as one table of text cells.
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::validation(format!("cannot open CSV {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::validation(format!("malformed CSV {}: {e}", path.display())))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("csv")
        .to_string();
    Ok(Table { name, rows })
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(edt) => match edt.as_datetime() {
            Some(dt) if dt.time().num_seconds_from_midnight() == 0 => CellValue::Date(dt.date()),
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Text(edt.to_string()),
        },
        Data::DateTimeIso(s) => parse_iso(s),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Cell-level errors (#DIV/0! etc.) are treated as missing values.
        Data::Error(_) => CellValue::Empty,
    }
}

fn parse_iso(s: &str) -> CellValue {
    if let Ok(dt) = s.parse::<chrono::NaiveDateTime>() {
        return CellValue::DateTime(dt);
    }
    if let Ok(d) = s.parse::<chrono::NaiveDate>() {
        return CellValue::Date(d);
    }
    CellValue::Text(s.to_string())
}
