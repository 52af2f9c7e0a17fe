//! Real-time job channel over WebSocket
//!
//! Each connection gets its own [`ChannelSession`] and outbound queue. A writer
//! task drains the queue into the socket while the reader loop feeds inbound
//! frames to the session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webobf_common::events::ChannelEvent;

use crate::services::ChannelSession;
use crate::AppState;

/// GET /ws
pub async fn channel_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelEvent>();
    let mut session = ChannelSession::new(state.orchestrator.clone(), tx, state.active_jobs.clone());
    let session_id = session.session_id();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(frame)) => session.handle_frame(&frame),
            Ok(Message::Binary(_)) => session.reject("Binary frames are not supported"),
            Ok(Message::Close(_)) => break,
            // Ping/pong handled by axum
            Ok(_) => {}
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Channel read failed");
                break;
            }
        }
    }

    session.close();
    writer.abort();
}

/// Build channel routes
pub fn channel_routes() -> Router<AppState> {
    Router::new().route("/ws", get(channel_upgrade))
}
