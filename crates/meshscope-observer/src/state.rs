//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the one and only [`TopologyService`] behind a
//! read-write lock. The engine takes the write lock for every ingest and
//! activity tick; REST handlers take the read lock. Every change the
//! service makes is forwarded to `WebSocket` clients through a broadcast
//! channel.

use std::sync::Arc;

use meshscope_core::config::MeshConfig;
use meshscope_core::service::TopologyService;
use meshscope_core::sink::EventSink;
use meshscope_types::TopologyEvent;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::console::ConsoleLog;

/// Capacity of the broadcast channel for topology events.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// Event sink that fans topology events out to `WebSocket` clients.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TopologyEvent>,
}

impl BroadcastSink {
    /// Wrap a broadcast sender.
    pub const fn new(tx: broadcast::Sender<TopologyEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&mut self, event: TopologyEvent) {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        let _ = self.tx.send(event);
    }
}

/// The topology service as shared between the engine and the handlers.
pub type SharedTopology = Arc<RwLock<TopologyService<BroadcastSink>>>;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for topology events.
    pub tx: broadcast::Sender<TopologyEvent>,
    /// The topology, guarded by the single lock all mutations go through.
    pub topology: SharedTopology,
    /// Recently received raw transport lines.
    pub console: Arc<RwLock<ConsoleLog>>,
    /// Framed outbound commands, present when a transport is attached.
    pub command_tx: Option<mpsc::UnboundedSender<String>>,
}

impl AppState {
    /// Create state with an empty topology built from `config`.
    ///
    /// The topology is not bootstrapped; the engine seeds the leader.
    pub fn new(config: &MeshConfig) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let service = TopologyService::from_config(config, BroadcastSink::new(tx.clone()));
        Self {
            tx,
            topology: Arc::new(RwLock::new(service)),
            console: Arc::new(RwLock::new(ConsoleLog::new(
                config.observer.console_retention_secs,
            ))),
            command_tx: None,
        }
    }

    /// Attach the channel outbound commands are forwarded to.
    #[must_use]
    pub fn with_command_channel(mut self, command_tx: mpsc::UnboundedSender<String>) -> Self {
        self.command_tx = Some(command_tx);
        self
    }

    /// Subscribe to the topology event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.tx.subscribe()
    }

    /// Subscribe and capture the current topology as events in one step.
    ///
    /// Events are only published under the topology write lock, so
    /// subscribing under the read lock leaves no window in which a change
    /// is missed by both the snapshot and the receiver.
    pub async fn subscribe_with_snapshot(
        &self,
    ) -> (Vec<TopologyEvent>, broadcast::Receiver<TopologyEvent>) {
        let topology = self.topology.read().await;
        let rx = self.tx.subscribe();
        (topology.snapshot(), rx)
    }
}
