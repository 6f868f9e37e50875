//! graphops-core: the data model and deterministic algorithms of GraphOps.
//!
//! This crate holds everything that is pure computation over the platform's
//! vertex kinds:
//!
//! - [`id`] - time-sortable 128-bit vertex identifiers
//! - [`hash`] - canonical row serialization, dual SHA-256 digests, and
//!   assertion-key composition
//! - [`model`] - the six vertex kinds (Entity, AssertionRecord,
//!   PropertyValue, ChangeEvent, ImportRun, Source)
//! - [`value`] - typed source-cell values shared by the hasher and the
//!   tabular parser
//! - [`resolve`] - the winner-selection algorithm over competing assertions
//!
//! Nothing in here performs I/O; the graph gateway, parsers and server
//! crates build on top.

pub mod error;
pub mod hash;
pub mod id;
pub mod model;
pub mod resolve;
pub mod value;

pub use error::{Error, Result};
pub use id::IdKind;
pub use model::{
    AssertionRecord, ChangeEvent, ChangeStats, Entity, EventType, ImportRun, ImportStatus,
    PropertyValue, Source, SourceType, HAS_PROPERTY,
};
pub use resolve::{annotate, resolve, AnnotatedAssertion, LossReason, ResolveContext};
pub use value::{CellValue, ValueType};
