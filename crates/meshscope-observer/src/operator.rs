//! Operator command endpoint.
//!
//! Commands are forwarded to the leader device over the transport. The
//! endpoint does not wait for a reply; the device's answer shows up in
//! `/api/console` like any other line.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/command` | Send one command line to the leader |

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use meshscope_core::command::frame_command;
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/command`.
#[derive(Debug, serde::Deserialize)]
pub struct CommandRequest {
    /// The command text, without a line terminator.
    pub command: String,
}

// ---------------------------------------------------------------------------
// POST /api/command
// ---------------------------------------------------------------------------

/// Queue a command for the leader device.
///
/// Returns `202 Accepted` once the framed command is handed to the
/// transport writer.
pub async fn send_command(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CommandRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let framed = frame_command(&body.command)
        .ok_or_else(|| ObserverError::InvalidCommand("command is blank".to_owned()))?;

    let command_tx = state
        .command_tx
        .as_ref()
        .ok_or_else(|| ObserverError::Unavailable("no transport attached".to_owned()))?;

    command_tx
        .send(framed)
        .map_err(|e| ObserverError::Unavailable(format!("transport writer has stopped: {e}")))?;

    let sent = body.command.trim().to_owned();
    info!(command = %sent, "Command queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "ok": true,
            "sent": sent,
        })),
    ))
}
