//! webobf-server library interface
//!
//! Exposes the router and services for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod presets;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::{JobOrchestrator, Storage};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Runs jobs started on any connection
    pub orchestrator: JobOrchestrator,
    /// Jobs currently in flight, across all connections
    pub active_jobs: Arc<AtomicUsize>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: JobOrchestrator) -> Self {
        Self {
            orchestrator,
            active_jobs: Arc::new(AtomicUsize::new(0)),
            startup_time: Utc::now(),
        }
    }

    pub fn storage(&self) -> &Storage {
        self.orchestrator.storage()
    }

    pub fn active_job_count(&self) -> usize {
        self.active_jobs.load(Ordering::SeqCst)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::upload_routes())
        .merge(api::download_routes())
        .merge(api::channel_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// [`build_router`] plus static files from `public_dir` as the fallback
///
/// The directory is only mounted when it exists; `/` serves its `index.html`.
pub fn build_router_with_public(state: AppState, public_dir: &Path) -> Router {
    let router = build_router(state);
    if public_dir.is_dir() {
        tracing::info!(public_dir = %public_dir.display(), "Serving static files");
        router.fallback_service(ServeDir::new(public_dir))
    } else {
        tracing::debug!(public_dir = %public_dir.display(), "No public directory; static files disabled");
        router
    }
}
