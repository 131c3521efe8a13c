//! Error types for djmx-ap

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for djmx-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queue item could not be fetched, decoded or started
    #[error("Failed to load item {item_id}: {reason}")]
    PlaybackLoad { item_id: String, reason: String },

    /// Remote session rejected the token even after a refresh
    #[error("Remote playback authorization expired")]
    AuthExpired,

    /// Remote control request failed
    #[error("Remote playback error: {0}")]
    RemoteTransport(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generation service failure while fetching DJ content
    #[error("Generation error: {0}")]
    Generation(String),

    #[error(transparent)]
    Common(#[from] djmx_common::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load(item_id: impl Into<String>, reason: impl ToString) -> Self {
        Error::PlaybackLoad {
            item_id: item_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience Result type using djmx-ap Error
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP-facing error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Remote session needs re-authorization (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Command not valid right now (409)
    #[error("{0}")]
    Conflict(String),

    /// Remote playback service failure (502)
    #[error("{0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::AuthExpired => ApiError::Unauthorized(err.to_string()),
            Error::InvalidState(msg) => ApiError::Conflict(msg),
            Error::RemoteTransport(_) | Error::Generation(_) => ApiError::Upstream(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "AUTH_EXPIRED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
