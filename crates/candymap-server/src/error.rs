//! Error types for the Candymap server.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use candymap_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the server.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Domain rule rejected the operation
    #[error(transparent)]
    Domain(#[from] candymap_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed field (400)
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate vote (409)
    #[error("already voted")]
    AlreadyVoted,

    /// Storage failure (500)
    #[error("{0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Domain(e) => match e.kind() {
                ErrorKind::Validation => ApiError::BadRequest(e.to_string()),
                ErrorKind::Conflict => ApiError::AlreadyVoted,
                ErrorKind::Persistence => ApiError::Internal(e.to_string()),
            },
            other => {
                tracing::error!("request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": msg }),
            ),
            ApiError::AlreadyVoted => (
                StatusCode::CONFLICT,
                json!({ "ok": false, "message": "already voted" }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "ok": false, "error": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
