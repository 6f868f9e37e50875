//! graphops-graph: the only crate that speaks the backing store's query
//! language.
//!
//! The rest of the platform sees [`GraphGateway`], a typed vertex/edge
//! CRUD surface. Two implementations ship:
//!
//! - [`NebulaGateway`] - assembles single-line nGQL statements, executes
//!   them over the NebulaGraph HTTP gateway, and decodes result rows into
//!   typed records. All escaping, reserved-word handling, null-decoding
//!   and datetime-decoding quirks live here and nowhere else.
//! - [`MemoryGateway`] - an in-process store with identical observable
//!   behavior, used by tests and by the server's memory mode.

pub mod gateway;
pub mod memory;
pub mod nebula;
pub mod ngql;

pub use gateway::{EventLink, GraphGateway};
pub use memory::MemoryGateway;
pub use nebula::{NebulaConfig, NebulaGateway};
