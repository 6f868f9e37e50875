//! graphops-tabular: reads spreadsheet workbooks and CSV files and turns
//! them into *staged rows* according to an ingest spec.
//!
//! Cells are read as typed values (dates are real dates, numbers are real
//! numbers, formulas are pre-computed); the staging pass then extracts
//! entity and relationship candidates per the spec's mappings and attaches
//! the row's dual hashes and provenance.
//!
//! The parser is forgiving about data: a row missing a key-column value
//! drops that entity candidate, never the row, and never errors.

pub mod source;
pub mod stage;

pub use source::{open_source, Table};
pub use stage::{
    stage_tables, EntityCandidate, PropertyCandidate, RelationshipCandidate, StagedRow,
};
