//! graphops-spec: declarative mapping specifications and domain schemas.
//!
//! An *ingest spec* describes how one tabular source becomes entities,
//! relationships, and property assertions; a *domain schema* declares the
//! entity and relationship types a workspace admits. Both are YAML
//! documents, validated structurally at load time and cross-validated
//! against each other before any import may run.

pub mod registry;
pub mod schema;
pub mod spec;
pub mod store;

pub use registry::SchemaRegistry;
pub use schema::{DomainSchema, EntityTypeDef, PropertyDef, RelationshipTypeDef};
pub use spec::{
    ColumnMapping, EntityMapping, IngestSpec, RelationshipMapping, SheetSpec, SourceAuthority,
    Transform,
};
pub use store::SpecStore;
