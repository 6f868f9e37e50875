//! graphops-api: the operations layer the HTTP server is a thin shell
//! around.
//!
//! [`GraphOps`] ties the graph gateway, the schema registry, the spec
//! store and the importer together and exposes workspace management,
//! synchronous import execution, the entity query surface (resolved and
//! all-claims views), and import diffs.

pub mod ops;
pub mod types;

pub use ops::GraphOps;
pub use types::{
    EntityDetail, EntitySummary, ImportDiff, ImportDiffEntry, PropertyView, RelationshipView,
    ViewMode, WorkspaceInfo,
};
