//! Artifact download endpoint

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// GET /download/:name
///
/// Streams the artifact from disk as an attachment (range and conditional
/// requests included). Names that are not plain filenames are answered exactly
/// like missing files.
pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let path = state
        .storage()
        .locate_artifact(&name)
        .await
        .ok_or_else(|| ApiError::ArtifactNotFound(name.clone()))?;

    debug!(artifact = %name, "Serving artifact");
    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        let disposition = format!("attachment; filename=\"{}\"", header_safe_name(&name));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}

/// `name` with quotes, backslashes and non-ASCII characters replaced by `_`
fn header_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect()
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new().route("/download/:name", get(download))
}
