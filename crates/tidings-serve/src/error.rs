//! API error types and response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Authentication failed (missing or invalid token).
    #[error("unauthorized")]
    Unauthorized,

    /// Invalid request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (store, sync, ...).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<tidings_store::Error> for ApiError {
    fn from(err: tidings_store::Error) -> Self {
        match err {
            tidings_store::Error::InvalidQuery(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.into()),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    Some("An internal error occurred".to_string()),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
