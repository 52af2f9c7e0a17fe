//! webobf-server - JavaScript transformation service
//!
//! Accepts source uploads over HTTP, runs transformation jobs started over a
//! WebSocket channel, and serves the resulting artifacts for download.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webobf_common::config::{self, ConfigOverrides, EngineKind, ServiceConfig};

use webobf_server::services::{CommandEngine, JobOrchestrator, PassthroughEngine, Storage, TransformEngine};
use webobf_server::AppState;

/// Command-line arguments for webobf-server
#[derive(Parser, Debug)]
#[command(name = "webobf-server")]
#[command(about = "JavaScript transformation service with real-time progress")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(long, env = "WEBOBF_HOST")]
    host: Option<String>,

    /// TOML bootstrap file
    #[arg(short, long, env = "WEBOBF_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for uploaded source files
    #[arg(long, env = "WEBOBF_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory for transformed artifacts
    #[arg(long, env = "WEBOBF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory with the browser client
    #[arg(long, env = "WEBOBF_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Transformation engine: command or passthrough
    #[arg(long, env = "WEBOBF_ENGINE")]
    engine: Option<EngineKind>,

    /// Engine program and arguments, whitespace separated
    #[arg(long, env = "WEBOBF_ENGINE_COMMAND")]
    engine_command: Option<String>,

    /// Maximum simultaneous transformations (default: unlimited)
    #[arg(long, env = "WEBOBF_MAX_TRANSFORMS")]
    max_transforms: Option<usize>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            host: self.host.clone(),
            upload_dir: self.upload_dir.clone(),
            output_dir: self.output_dir.clone(),
            public_dir: self.public_dir.clone(),
            engine: self.engine,
            engine_command: self
                .engine_command
                .as_ref()
                .map(|c| c.split_whitespace().map(str::to_string).collect()),
            max_concurrent_transforms: self.max_transforms,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match config::locate_config_file(args.config.as_deref())? {
        Some(path) => Some(config::load_toml_config(&path)?),
        None => None,
    };
    let config = ServiceConfig::resolve(args.overrides(), toml_config)
        .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("webobf_server={0},webobf_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting webobf-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let storage = Storage::new(&config.upload_dir, &config.output_dir);
    storage
        .ensure_directories()
        .await
        .context("Failed to create storage directories")?;

    let engine: Arc<dyn TransformEngine> = match config.engine {
        EngineKind::Command => {
            let engine = CommandEngine::new(config.engine_command.clone())
                .context("Invalid engine command")?;
            info!(program = engine.program(), args = ?&config.engine_command[1..], "Using command engine");
            Arc::new(engine)
        }
        EngineKind::Passthrough => {
            info!("Using passthrough engine; artifacts equal their sources");
            Arc::new(PassthroughEngine)
        }
    };

    let mut orchestrator = JobOrchestrator::new(storage, engine);
    if let Some(limit) = config.max_concurrent_transforms {
        info!(limit, "Limiting concurrent transformations");
        orchestrator = orchestrator.with_transform_limit(limit);
    }

    let app = webobf_server::build_router_with_public(AppState::new(orchestrator), &config.public_dir);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
