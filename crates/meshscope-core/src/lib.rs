//! Telemetry ingestion and topology tracking for Meshscope.
//!
//! This crate turns the leader's line-oriented status output into a live
//! model of the mesh: which nodes exist, where they sit in the star layout,
//! whether they are still talking, and everything each one has said. It
//! performs no I/O; the engine binary feeds it lines and timer ticks.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `meshscope-config.yaml` into
//!   strongly-typed structs.
//! - [`parser`] -- Sender/message extraction and the simulated-node directive.
//! - [`layout`] -- Deterministic circle layout around the leader.
//! - [`store`] -- [`TopologyStore`], the authoritative node table.
//! - [`monitor`] -- [`ActivityMonitor`], the staleness classification pass.
//! - [`sink`] -- [`EventSink`] trait for change notifications.
//! - [`service`] -- [`TopologyService`], the single owner of all mutations.
//! - [`command`] -- Framing of outbound operator commands.
//!
//! [`TopologyStore`]: store::TopologyStore
//! [`ActivityMonitor`]: monitor::ActivityMonitor
//! [`EventSink`]: sink::EventSink
//! [`TopologyService`]: service::TopologyService

pub mod command;
pub mod config;
pub mod layout;
pub mod monitor;
pub mod parser;
pub mod service;
pub mod sink;
pub mod store;
