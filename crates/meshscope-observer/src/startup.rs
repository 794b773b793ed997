//! Observer server startup helper for embedding in the engine.
//!
//! Provides [`spawn_observer`] which launches the Observer HTTP +
//! `WebSocket` server on a background Tokio task, so the API runs
//! alongside the ingest loop.
//!
//! # Usage
//!
//! ```rust,ignore
//! use meshscope_observer::startup::spawn_observer;
//! use meshscope_observer::state::AppState;
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(&config));
//! let handle = spawn_observer(&config.observer, state).await?;
//! ```

use std::sync::Arc;

use meshscope_core::config::ObserverConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the Observer HTTP server on a background Tokio task.
///
/// The listener is bound before the task is spawned, so an address
/// already in use is reported to the caller instead of being logged from
/// the background. The caller should hold the returned handle and abort
/// it during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address is invalid
/// or cannot be bound.
pub async fn spawn_observer(
    config: &ObserverConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let server = ServerConfig::from(config);
    let addr = server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(handle)
}
