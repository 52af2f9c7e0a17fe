//! Upload endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Multipart field carrying the source file
pub const UPLOAD_FIELD: &str = "file";

/// POST /upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    /// Stored filename without extension
    pub id: String,
    /// Stored filename; send it back as `file` in a `start` event
    pub filename: String,
}

/// POST /upload
///
/// Stores the first file part named `file`. A request without one (including
/// a body that is not multipart at all) is answered with 400.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Upload request is not multipart");
        ApiError::UploadMissing
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // Text fields and empty file inputs carry no usable file name
        let original_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let stored = state.storage().store_upload(&original_name, &bytes).await?;

        info!(
            filename = %stored.filename,
            original = %stored.original_name,
            size = bytes.len(),
            "Upload stored"
        );
        return Ok(Json(UploadResponse {
            ok: true,
            id: stored.id,
            filename: stored.filename,
        }));
    }

    Err(ApiError::UploadMissing)
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}
