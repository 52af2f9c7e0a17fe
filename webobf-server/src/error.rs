//! Error types for webobf-server
//!
//! `ApiError` covers the synchronous HTTP surface (upload/download).
//! `JobError` covers everything that can halt a transformation job; each
//! variant is reported to the owning connection as one `error` event.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::IllegalTransition;
use crate::services::engine::TransformationFailed;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload request carried no file (400)
    #[error("No file uploaded")]
    UploadMissing,

    /// Download names a file absent from output storage (404)
    #[error("Not found")]
    ArtifactNotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UploadMissing => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No file uploaded" })),
            )
                .into_response(),
            ApiError::ArtifactNotFound(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Reasons a job ends in FAILED
#[derive(Debug, Error)]
pub enum JobError {
    /// Start request names an upload that does not exist
    #[error("File not found on server.")]
    SourceNotFound(String),

    /// Upload exists but could not be read
    #[error("Failed to read uploaded file: {0}")]
    SourceUnreadable(#[source] std::io::Error),

    /// Engine raised an error or returned nothing usable
    #[error(transparent)]
    TransformationFailed(#[from] TransformationFailed),

    /// Artifact could not be written
    #[error("Failed to write output file: {0}")]
    PersistenceFailed(#[source] std::io::Error),

    /// Pipeline attempted a transition the state machine forbids
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}
