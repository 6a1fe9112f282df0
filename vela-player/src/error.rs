//! Error types for vela-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Signal aggregation and level selection cannot fail; everything here sits at
//! the threshold table boundary or the process lifecycle boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for vela-player
#[derive(Error, Debug)]
pub enum Error {
    /// Threshold level outside 1..=max
    #[error("Invalid level: {level} (valid levels are 1..={max})")]
    InvalidLevel { level: usize, max: usize },

    /// No candidate media registered for a level
    #[error("No media for level {0}")]
    NoMediaForLevel(usize),

    /// External playback process failed to start
    #[error("Process spawn failed: {0}")]
    ProcessSpawn(String),

    /// External playback process could not be controlled (alpha, stop)
    #[error("Process control failed: {0}")]
    ProcessControl(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors surfaced by vela-common
    #[error(transparent)]
    Common(#[from] vela_common::Error),
}

/// Convenience Result type using vela-player Error
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request conflicts with the running configuration (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature not available in this process (503)
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidLevel { .. } | Error::Config(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
