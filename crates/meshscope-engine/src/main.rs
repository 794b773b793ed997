//! Engine binary for Meshscope.
//!
//! This is the main entry point that wires together the telemetry
//! transport, the topology service, the activity timer and the observer
//! server. It runs until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `meshscope-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Create the shared topology and seed the leader and known nodes
//! 4. Start the Observer API server
//! 5. Open the transport and spawn the line reader
//! 6. Run the ingest loop

mod error;
mod ingest;
mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use meshscope_core::config::{LoggingConfig, MeshConfig};
use meshscope_observer::AppState;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_PATH: &str = "meshscope-config.yaml";

/// How long shutdown waits for blocking reads still in flight. Standard
/// input has no read timeout, so a silent pipe would otherwise keep the
/// process alive after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(start());
    shut_down(runtime);
    result
}

/// Stop the runtime, abandoning blocking reads after [`SHUTDOWN_GRACE`].
fn shut_down(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

async fn start() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so failures here are
    //    reported by the returned error alone.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, loaded_from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("meshscope-engine starting");
    if loaded_from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        leader = config.topology.leader.as_deref().unwrap_or("(first heard)"),
        max_nodes = config.topology.max_nodes,
        capacity_policy = ?config.topology.capacity_policy,
        inactive_timeout_secs = config.activity.inactive_timeout_secs,
        device = %config.transport.device,
        baud_rate = config.transport.baud_rate,
        "Topology configuration"
    );

    run(config).await?;

    info!("meshscope-engine shutdown complete");
    Ok(())
}

/// Steps 3 to 6 of the startup sequence.
async fn run(config: MeshConfig) -> Result<(), EngineError> {
    // 3. Shared topology.
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<String>();
    let state = Arc::new(AppState::new(&config).with_command_channel(command_tx));
    state
        .topology
        .write()
        .await
        .bootstrap(&config.topology)?;
    info!(
        nodes = state.topology.read().await.store().len(),
        "Topology seeded"
    );

    // 4. Observer API server.
    let observer_handle = if config.observer.enabled {
        let handle =
            meshscope_observer::spawn_observer(&config.observer, Arc::clone(&state)).await?;
        info!(port = config.observer.port, "Observer API server started");
        Some(handle)
    } else {
        info!("Observer disabled");
        None
    };

    // 5. Transport.
    let transport::Transport { reader, writer } = transport::open(&config.transport)?;
    let (lines_tx, mut lines_rx) = mpsc::channel(transport::LINE_CHANNEL_CAPACITY);
    let _reader = transport::spawn_reader(reader, lines_tx);

    // 6. Ingest loop.
    let mut activity = tokio::time::interval(Duration::from_millis(
        config.activity.check_interval_ms,
    ));
    activity.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // The observer keeps serving after the input ends, so a replayed
    // capture can still be inspected.
    let mut lines_open = true;

    info!("Entering ingest loop");
    loop {
        tokio::select! {
            line = lines_rx.recv(), if lines_open => {
                match line {
                    Some(line) => ingest::ingest_line(&state, &line, Utc::now()).await,
                    None => {
                        info!("Transport closed, still serving until Ctrl-C");
                        lines_open = false;
                    }
                }
            }
            _ = activity.tick() => {
                ingest::activity_tick(&state, Utc::now()).await;
            }
            Some(command) = command_rx.recv() => {
                match writer.send(&command).await {
                    Ok(()) => info!(command = command.trim_end(), "Sent"),
                    Err(e) => warn!(error = %e, "Command dropped"),
                }
            }
            result = &mut shutdown => {
                result.map_err(|source| EngineError::Signal { source })?;
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    // The serial reader exits on its next read timeout once this is gone.
    drop(lines_rx);
    if let Some(handle) = observer_handle {
        handle.abort();
    }
    Ok(())
}

/// Load configuration from `path`, falling back to defaults (with
/// environment overrides) when the file does not exist.
fn load_config(path: &Path) -> Result<(MeshConfig, bool), EngineError> {
    if path.exists() {
        Ok((MeshConfig::from_file(path)?, true))
    } else {
        Ok((MeshConfig::parse("")?, false))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence
/// over the configured level.
fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    // Stdout carries commands when the device is `-`.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn shutdown_does_not_wait_for_a_stuck_blocking_read() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        // A writer that never writes, like a pipe on standard input.
        let (_silent_writer, pipe) = std::sync::mpsc::channel::<Vec<u8>>();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        runtime.spawn_blocking(move || {
            started_tx.send(()).unwrap();
            pipe.recv().ok()
        });
        started_rx.recv().unwrap();

        let begun = Instant::now();
        shut_down(runtime);
        assert!(begun.elapsed() < SHUTDOWN_GRACE.saturating_mul(3));
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let (config, loaded) = load_config(Path::new("/nonexistent/meshscope.yaml")).unwrap();
        assert!(!loaded);
        assert_eq!(config.topology.max_nodes, 12);
    }
}
