//! Observer API server for the Meshscope topology.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/events`) streaming every topology
//!   change via [`tokio::sync::broadcast`]
//! - **REST endpoints** for the node table, message histories, star edges
//!   and the recent raw console
//! - **Operator endpoint** (`POST /api/command`) forwarding a command line
//!   to the leader device
//! - **Minimal HTML page** (`GET /`) with node counts and API links
//!
//! # Architecture
//!
//! The engine and the handlers share one
//! [`TopologyService`](meshscope_core::service::TopologyService) behind a
//! single `RwLock` in [`AppState`]. The engine writes, handlers read. The
//! service publishes into a [`BroadcastSink`], which fans events out to
//! every connected `WebSocket` client with automatic lag handling.

pub mod console;
pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{serve, ServerConfig, ServerError};
pub use startup::{spawn_observer, StartupError};
pub use state::{AppState, BroadcastSink, SharedTopology};
