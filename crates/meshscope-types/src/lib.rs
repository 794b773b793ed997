//! Shared type definitions for Meshscope.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace. Types flow downstream to `TypeScript` via `ts-rs` so a
//! topology dashboard can consume the observer's JSON directly.
//!
//! # Modules
//!
//! - [`address`] -- Node addresses and the synthetic simulation namespace
//! - [`enums`] -- Node liveness classification
//! - [`structs`] -- Nodes, layout points, edges and message records
//! - [`events`] -- Change notifications for the presentation layer

pub mod address;
pub mod enums;
pub mod events;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use address::{NodeAddress, SIM_PREFIX};
pub use enums::NodeActivity;
pub use events::TopologyEvent;
pub use structs::{Edge, MessageRecord, Node, Point};
