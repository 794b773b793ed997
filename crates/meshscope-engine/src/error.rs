//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the ingest loop.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: meshscope_core::config::ConfigError,
    },

    /// Seeding the leader or known nodes failed.
    #[error("topology error: {source}")]
    Topology {
        /// The underlying store error.
        #[from]
        source: meshscope_core::store::StoreError,
    },

    /// The telemetry device could not be opened.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: crate::transport::TransportError,
    },

    /// Observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: meshscope_observer::StartupError,
    },

    /// Installing the Ctrl-C handler failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
