//! API error type with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::ports::repository::StoreError;

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data (400).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource already exists (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::InvalidData(_) | StoreError::Database(_) => {
                error!(error = %err, "Trader store failure");
                Self::Internal("trader store failure".to_string())
            }
        }
    }
}
