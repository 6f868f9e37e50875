//! Error types shared across the GraphOps crates

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Platform error type.
///
/// Five categories, each with a stable machine-readable code surfaced to
/// API callers. `Validation`, `NotFound` and `Conflict` are caller
/// errors and never leave state mutated; `Store` and `Internal` are
/// server-side failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed spec/schema, unknown type reference, inputs outside bounds
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity, import run, or workspace absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate entity, or closing an already-closed assertion
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing graph store failed a call after retries
    #[error("Store error: {0}")]
    Store(String),

    /// Invariant violation detected at runtime
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Stable machine-readable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Store(_) => "store",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {e}"))
    }
}
