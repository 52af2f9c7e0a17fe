//! Test Helper Utilities
//!
//! Shared utilities for testing webobf-server: a recording stub engine, an app
//! wired to temporary storage, a live server on an ephemeral port, and a small
//! WebSocket client.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use webobf_common::events::ChannelEvent;
use webobf_server::presets::PresetConfig;
use webobf_server::services::engine::{EngineError, EngineOutput, TransformEngine};
use webobf_server::services::{JobOrchestrator, Storage};
use webobf_server::AppState;

/// One engine invocation
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub source: String,
    /// Config as the engine bridge would receive it
    pub config: Value,
}

/// Engine returning its input unchanged and remembering every call
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    /// When set, every run waits for one `notify_one`
    gate: Option<Arc<Notify>>,
}

impl RecordingEngine {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransformEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn run(&self, source: &str, config: &PresetConfig) -> Result<EngineOutput, EngineError> {
        self.calls.lock().unwrap().push(EngineCall {
            source: source.to_string(),
            config: serde_json::to_value(config).unwrap(),
        });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(EngineOutput::PlainText(source.to_string()))
    }
}

/// App wired to temporary storage and a recording engine
pub struct TestApp {
    /// Keeps the storage directories alive
    pub temp: TempDir,
    pub state: AppState,
    pub engine: Arc<RecordingEngine>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_engine(RecordingEngine::default()).await
    }

    pub async fn with_engine(engine: RecordingEngine) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let storage = Storage::new(temp.path().join("uploads"), temp.path().join("output"));
        storage.ensure_directories().await.expect("Failed to create storage dirs");

        let engine = Arc::new(engine);
        let orchestrator = JobOrchestrator::new(storage, engine.clone());
        Self {
            temp,
            state: AppState::new(orchestrator),
            engine,
        }
    }

    pub fn router(&self) -> axum::Router {
        webobf_server::build_router(self.state.clone())
    }

    /// Serve the router on 127.0.0.1 with an ephemeral port
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Store an upload directly, returning its stored filename
    pub async fn upload(&self, name: &str, content: &str) -> String {
        self.state
            .storage()
            .store_upload(name, content.as_bytes())
            .await
            .expect("Failed to store upload")
            .filename
    }
}

impl TestApp {
    /// GET `uri` through the router, returning status and body
    pub async fn fetch(&self, uri: &str) -> (axum::http::StatusCode, Vec<u8>) {
        use http_body_util::BodyExt;
        use tower::util::ServiceExt;

        let response = self
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }
}

/// Boundary used by [`multipart_body`]
pub const BOUNDARY: &str = "webobf-test-boundary";

/// Multipart body with one file part
pub fn multipart_body(field: &str, filename: &str, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/javascript\r\n\r\n{content}\r\n--{b}--\r\n",
        b = BOUNDARY,
    )
}

/// WebSocket client for the job channel
pub struct ChannelClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChannelClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect to /ws");
        Self { ws }
    }

    pub async fn send_raw(&mut self, frame: &str) {
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .expect("Failed to send frame");
    }

    pub async fn start(&mut self, file: &str, preset: Option<&str>, password: Option<&str>) {
        let frame = serde_json::json!({
            "event": "start",
            "data": { "file": file, "preset": preset, "password": password },
        });
        self.send_raw(&frame.to_string()).await;
    }

    /// Next event, failing the test after 10 seconds
    pub async fn next_event(&mut self) -> ChannelEvent {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(10), self.ws.next())
                .await
                .expect("Timed out waiting for event")
                .expect("Channel closed")
                .expect("Channel read failed");
            if let Message::Text(frame) = message {
                return serde_json::from_str(&frame).expect("Invalid event frame");
            }
        }
    }

    /// Events up to and including the first `done` or `error`
    pub async fn until_terminal(&mut self) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        loop {
            let event = self.next_event().await;
            let terminal = matches!(event, ChannelEvent::Done { .. } | ChannelEvent::Error { .. });
            events.push(event);
            if terminal {
                return events;
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Percentages of the progress events in `events`
pub fn percents(events: &[ChannelEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}
