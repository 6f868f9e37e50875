//! Server error type with HTTP status mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use graphops_core::Error as CoreError;

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ServerError {
    /// Platform error carrying its own category
    Core(CoreError),
    /// Malformed request (body, query, upload)
    BadRequest(String),
}

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Core(e) => e.code(),
            ServerError::BadRequest(_) => "validation",
        }
    }

    /// HTTP status for the error category.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
            ServerError::Core(CoreError::Store(_)) => StatusCode::BAD_GATEWAY,
            ServerError::Core(CoreError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Core(e) => e.fmt(f),
            ServerError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        ServerError::Core(e)
    }
}

impl From<axum::extract::multipart::MultipartError> for ServerError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        ServerError::BadRequest(format!("invalid multipart upload: {e}"))
    }
}

/// JSON error body: `{error, code, status}`.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, ServerError>;
