//! Bootstrap configuration and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument / environment variable (merged by the binary's `clap` parser)
//! 2. TOML config file
//! 3. Compiled defaults
//!
//! The TOML file is optional. A missing file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Default HTTP port when neither `PORT` nor the TOML file set one
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default external engine command (relative to the working directory)
pub const DEFAULT_ENGINE_COMMAND: &[&str] = &["node", "scripts/js-confuser-bridge.js"];

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Bind address
    #[serde(default)]
    pub host: Option<String>,

    /// Directory receiving uploaded source files
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Directory receiving transformed artifacts
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Directory with the browser client (served as router fallback)
    #[serde(default)]
    pub public_dir: Option<PathBuf>,

    /// Transformation engine selection
    #[serde(default)]
    pub engine: EngineSettings,

    /// Cap on simultaneous transformations (unset = unlimited)
    #[serde(default)]
    pub max_concurrent_transforms: Option<usize>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[engine]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// `command` or `passthrough`
    #[serde(default)]
    pub kind: Option<EngineKind>,

    /// Program and arguments for the command engine
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

/// Which transformation engine implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Spawn an external process per job
    Command,
    /// Return the source unchanged
    Passthrough,
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(EngineKind::Command),
            "passthrough" | "noop" => Ok(EngineKind::Passthrough),
            other => Err(Error::Config(format!(
                "Unknown engine kind '{}' (expected 'command' or 'passthrough')",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through environment variables
///
/// `None` means "not given"; the TOML file and then the compiled defaults fill in.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub upload_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub public_dir: Option<PathBuf>,
    pub engine: Option<EngineKind>,
    pub engine_command: Option<Vec<String>>,
    pub max_concurrent_transforms: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub host: String,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub public_dir: PathBuf,
    pub engine: EngineKind,
    pub engine_command: Vec<String>,
    pub max_concurrent_transforms: Option<usize>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides, optional TOML file contents and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: Option<TomlConfig>) -> Result<Self> {
        let toml = toml.unwrap_or_default();

        let engine_command = overrides
            .engine_command
            .filter(|c| !c.is_empty())
            .or(toml.engine.command)
            .unwrap_or_else(|| {
                DEFAULT_ENGINE_COMMAND
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        if engine_command.is_empty() {
            return Err(Error::Config("engine command must not be empty".to_string()));
        }

        let max_concurrent_transforms = overrides
            .max_concurrent_transforms
            .or(toml.max_concurrent_transforms);
        if max_concurrent_transforms == Some(0) {
            return Err(Error::Config(
                "max_concurrent_transforms must be at least 1 (omit it for no limit)".to_string(),
            ));
        }

        Ok(Self {
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            upload_dir: overrides
                .upload_dir
                .or(toml.upload_dir)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            output_dir: overrides
                .output_dir
                .or(toml.output_dir)
                .unwrap_or_else(|| PathBuf::from("output")),
            public_dir: overrides
                .public_dir
                .or(toml.public_dir)
                .unwrap_or_else(|| PathBuf::from("public")),
            engine: overrides
                .engine
                .or(toml.engine.kind)
                .unwrap_or(EngineKind::Command),
            engine_command,
            max_concurrent_transforms,
            log_level: overrides.log_level.unwrap_or(toml.logging.level),
        })
    }
}

/// Find the TOML config file to use
///
/// An explicit path wins and must exist. Otherwise `~/.config/webobf/config.toml`
/// is used when present.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let user_config = dirs::config_dir().map(|d| d.join("webobf").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Ok(Some(path)),
        _ => {
            debug!("No TOML config file found, using built-in defaults");
            Ok(None)
        }
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
