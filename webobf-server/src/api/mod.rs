//! HTTP and WebSocket handlers for webobf-server
//!
//! - `POST /upload`: store a source file
//! - `GET /download/:name`: fetch a finished artifact
//! - `GET /ws`: real-time job channel
//! - `GET /health`: liveness and uptime

pub mod channel;
pub mod download;
pub mod health;
pub mod upload;

pub use channel::channel_routes;
pub use download::download_routes;
pub use health::health_routes;
pub use upload::upload_routes;
