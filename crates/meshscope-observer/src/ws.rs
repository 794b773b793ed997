//! `WebSocket` stream of topology events.
//!
//! `GET /ws/events` upgrades to a socket that speaks JSON text frames, one
//! [`TopologyEvent`] per frame:
//!
//! 1. A snapshot of the topology at connect time: `node_created` for every
//!    node in registration order, then `activity_changed` with
//!    `active: false` for every stale node.
//! 2. Every later change, in the order the topology service made it.
//!
//! The two parts join without gaps or repeats, so a client can build its
//! whole view from this socket alone. A client that falls behind skips
//! the events it missed and carries on from the newest one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use meshscope_types::TopologyEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` carrying the snapshot and then live events.
///
/// # Route
///
/// `GET /ws/events`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: Arc<AppState>) {
    let (snapshot, rx) = state.subscribe_with_snapshot().await;
    debug!(snapshot = snapshot.len(), "WebSocket client connected");

    for event in &snapshot {
        if !send_event(&mut socket, event).await {
            return;
        }
    }
    forward_live(socket, rx).await;
}

async fn forward_live(mut socket: WebSocket, mut rx: broadcast::Receiver<TopologyEvent>) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => {
                    if !send_event(&mut socket, &event).await {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagged, skipping ahead");
                }
                Err(RecvError::Closed) => {
                    debug!("Topology event channel closed");
                    return;
                }
            },
            frame = socket.recv() => {
                if !answer_client(&mut socket, frame).await {
                    return;
                }
            }
        }
    }
}

/// Send one event as a text frame. Returns `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &TopologyEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        // Skip the event, keep the client.
        Err(e) => {
            warn!(error = %e, "Failed to serialize topology event");
            return true;
        }
    };
    let sent = socket.send(Message::Text(json.into())).await.is_ok();
    if !sent {
        debug!("WebSocket client disconnected");
    }
    sent
}

/// Handle a frame from the client. Returns `false` when the socket should
/// close. Clients are not expected to send anything but control frames.
async fn answer_client(
    socket: &mut WebSocket,
    frame: Option<Result<Message, axum::Error>>,
) -> bool {
    match frame {
        Some(Ok(Message::Ping(data))) => socket.send(Message::Pong(data)).await.is_ok(),
        Some(Ok(Message::Close(_))) | None => {
            debug!("WebSocket client closed the connection");
            false
        }
        Some(Err(e)) => {
            debug!(error = %e, "WebSocket receive failed");
            false
        }
        Some(Ok(_)) => true,
    }
}
