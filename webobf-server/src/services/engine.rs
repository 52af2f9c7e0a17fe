//! Transformation engine adapter
//!
//! The engine itself is an opaque capability. This module gives it a typed
//! boundary: engines return an [`EngineOutput`] in whatever shape they produce,
//! and [`transform`] resolves that shape to a single string once, so the rest
//! of the pipeline only ever sees text.
//!
//! Implementations:
//! - [`CommandEngine`]: external process speaking JSON over stdin/stdout
//! - [`PassthroughEngine`]: returns the source unchanged

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::presets::PresetConfig;

/// Result shapes an engine may hand back
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    /// Bare string
    PlainText(String),
    /// Result object exposing a `code` field
    WithCode(String),
    /// Scalar that only has a string rendering
    Stringifiable(String),
    /// Anything else; serialized structurally as a last resort
    Structured(Value),
}

impl EngineOutput {
    /// Classify a JSON value by the precedence plain string → `code` field → scalar → structure
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => EngineOutput::PlainText(text),
            Value::Object(mut map) => match map.remove("code") {
                Some(Value::String(code)) => EngineOutput::WithCode(code),
                Some(other) => {
                    map.insert("code".to_string(), other);
                    EngineOutput::Structured(Value::Object(map))
                }
                None => EngineOutput::Structured(Value::Object(map)),
            },
            Value::Number(n) => EngineOutput::Stringifiable(n.to_string()),
            Value::Bool(b) => EngineOutput::Stringifiable(b.to_string()),
            other => EngineOutput::Structured(other),
        }
    }

    /// Collapse to the single text the pipeline persists
    pub fn into_text(self) -> String {
        match self {
            EngineOutput::PlainText(text) => text,
            EngineOutput::WithCode(code) => code,
            EngineOutput::Stringifiable(text) => text,
            EngineOutput::Structured(value) => value.to_string(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            EngineOutput::PlainText(_) => "plain_text",
            EngineOutput::WithCode(_) => "with_code",
            EngineOutput::Stringifiable(_) => "stringifiable",
            EngineOutput::Structured(_) => "structured",
        }
    }
}

/// Engine-internal failure (unsupported syntax, crash, resource exhaustion, ...)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Engine failure as seen by the job pipeline
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransformationFailed {
    /// Engine that failed
    pub engine: &'static str,
    /// Underlying message, passed to the client unchanged
    pub message: String,
}

/// Opaque transformation capability
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Transform `source` according to `config`; may take a long time
    async fn run(&self, source: &str, config: &PresetConfig) -> Result<EngineOutput, EngineError>;
}

/// Run `engine` and normalize its result to text
pub async fn transform(
    engine: &dyn TransformEngine,
    source: &str,
    config: &PresetConfig,
) -> Result<String, TransformationFailed> {
    let output = engine
        .run(source, config)
        .await
        .map_err(|e| TransformationFailed {
            engine: engine.name(),
            message: e.0,
        })?;

    debug!(engine = engine.name(), shape = output.shape(), "Engine returned");

    let text = output.into_text();
    if text.is_empty() {
        warn!(engine = engine.name(), "Engine produced empty output");
    }
    Ok(text)
}

/// Returns the source unchanged
#[derive(Debug, Default, Clone)]
pub struct PassthroughEngine;

#[async_trait]
impl TransformEngine for PassthroughEngine {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn run(&self, source: &str, _config: &PresetConfig) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput::PlainText(source.to_string()))
    }
}

/// Request written to the external engine's stdin
#[derive(Serialize)]
struct CommandRequest<'a> {
    code: &'a str,
    config: &'a PresetConfig,
}

/// Spawns an external program per job
///
/// The program receives `{"code": ..., "config": ...}` on stdin and prints its
/// result on stdout: either JSON (classified by [`EngineOutput::from_json`]) or
/// raw text. A non-zero exit status is an engine failure carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// Build from `[program, args...]`
    pub fn new(command: Vec<String>) -> Result<Self, EngineError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| EngineError("engine command must not be empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl TransformEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn run(&self, source: &str, config: &PresetConfig) -> Result<EngineOutput, EngineError> {
        let request = serde_json::to_vec(&CommandRequest {
            code: source,
            config,
        })
        .map_err(|e| EngineError(format!("Failed to encode engine request: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError(format!("Failed to start engine '{}': {}", self.program, e)))?;

        // Feed stdin while stdout/stderr drain; an engine that streams output
        // before reading all input would otherwise block on a full pipe
        let stdin = child.stdin.take();
        let program = self.program.as_str();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&request).await {
                    Ok(()) => {}
                    // Engine exited without reading everything; its exit status tells the rest
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        debug!(program = %program, "Engine closed stdin early");
                    }
                    Err(e) => {
                        return Err(EngineError(format!("Failed to send source to engine: {}", e)));
                    }
                }
                // Dropping stdin closes the pipe so the engine sees EOF
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| EngineError(format!("Engine did not finish: {}", e)))?;
        fed?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError(if stderr.is_empty() {
                format!("Engine exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(match serde_json::from_str::<Value>(&stdout) {
            Ok(value) => EngineOutput::from_json(value),
            Err(_) => EngineOutput::PlainText(stdout),
        })
    }
}
