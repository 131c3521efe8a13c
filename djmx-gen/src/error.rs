//! Error types for djmx-gen
//!
//! `GenerationError` is the pipeline taxonomy recorded into experience
//! records; `ApiError` shapes HTTP failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clients::ClientError;

/// Failure of a generation job
///
/// Display text is what pollers see in `ExperienceRecord.error`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// Caller input malformed or empty
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A generative service returned non-success or a malformed payload
    #[error("{0}")]
    UpstreamApi(String),

    /// Model output could not be reduced to a complete DJ script
    #[error("Failed to parse DJ script: {0}")]
    ScriptParse(String),

    /// Music job still running at the wall-clock ceiling
    #[error("Music generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    /// Job cancelled before completion
    #[error("Generation cancelled")]
    Cancelled,
}

impl From<ClientError> for GenerationError {
    fn from(err: ClientError) -> Self {
        GenerationError::UpstreamApi(err.to_string())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Conflict (409) - e.g. cancelling a finished job
    #[error("{0}")]
    Conflict(String),

    /// Upstream service failure (502)
    #[error("{0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
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

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = GenerationError::GenerationTimeout(180);
        assert_eq!(err.to_string(), "Music generation timed out after 180 seconds");
    }

    #[test]
    fn test_client_error_becomes_upstream() {
        let err: GenerationError = ClientError::Api(500, "boom".to_string()).into();
        assert!(matches!(err, GenerationError::UpstreamApi(ref m) if m.contains("boom")));
    }

    #[test]
    fn test_api_error_status_codes() {
        let response = ApiError::NotFound("Experience not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Upstream("down".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
