//! Configuration loading and typed config structures for Meshscope.
//!
//! The canonical configuration lives in `meshscope-config.yaml` in the
//! engine's working directory. Every field has a default matching the
//! reference deployment (12 nodes, 15 second timeout, a 200 unit circle
//! around `(450, 300)`), so an empty or missing file yields a working setup.

use std::path::Path;

use meshscope_types::Point;
use serde::Deserialize;

/// Address of the leader on the reference deployment.
pub const DEFAULT_LEADER: &str = "fd58:47f8:cd8:54c4:0:ff:fe00:fc00";

/// Device path that selects standard input as the transport.
pub const STDIN_DEVICE: &str = "-";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Meshscope configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Leader, node cap and layout.
    pub topology: TopologyConfig,

    /// Staleness detection.
    pub activity: ActivityConfig,

    /// Telemetry line source and command sink.
    pub transport: TransportConfig,

    /// Observer HTTP server.
    pub observer: ObserverConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl MeshConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `MESHSCOPE_DEVICE` overrides `transport.device`
    /// - `MESHSCOPE_OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `MESHSCOPE_OBSERVER_PORT` is not
    /// a valid port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("MESHSCOPE_DEVICE") {
            self.transport.device = val;
        }
        if let Ok(val) = std::env::var("MESHSCOPE_OBSERVER_PORT") {
            self.observer.port = val.parse().map_err(|_err| ConfigError::Invalid {
                reason: format!("MESHSCOPE_OBSERVER_PORT is not a port number: {val}"),
            })?;
        }
        Ok(())
    }

    /// Reject values the core cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.topology.max_nodes == 0 {
            return invalid("topology.max_nodes must be at least 1");
        }
        let layout = &self.topology.layout;
        if !(layout.radius.is_finite() && layout.radius > 0.0) {
            return invalid("topology.layout.radius must be a positive number");
        }
        if !(layout.center.x.is_finite() && layout.center.y.is_finite()) {
            return invalid("topology.layout.center must be finite");
        }
        if layout.spacing_deg.is_some_and(|deg| !deg.is_finite()) {
            return invalid("topology.layout.spacing_deg must be finite");
        }
        if self.activity.check_interval_ms == 0 {
            return invalid("activity.check_interval_ms must be at least 1");
        }
        if self.transport.device.trim().is_empty() {
            return invalid("transport.device must not be empty");
        }
        if self.transport.baud_rate == 0 {
            return invalid("transport.baud_rate must be at least 1");
        }
        Ok(())
    }
}

/// What the store does with a new address once the node cap is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Refuse the node with `StoreError::CapacityExceeded`.
    #[default]
    Reject,
    /// Accept the node; its circle position wraps and overlaps earlier nodes.
    Overlap,
}

/// Leader, node cap and layout settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologyConfig {
    /// Leader address seeded at startup. `None` makes the first node heard
    /// from the leader.
    #[serde(default = "default_leader")]
    pub leader: Option<String>,

    /// Addresses registered right after the leader, before any input.
    #[serde(default)]
    pub known_nodes: Vec<String>,

    /// Maximum number of distinct nodes, leader included.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Behavior once `max_nodes` is reached.
    #[serde(default)]
    pub capacity_policy: CapacityPolicy,

    /// Circle layout parameters.
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            leader: default_leader(),
            known_nodes: Vec::new(),
            max_nodes: default_max_nodes(),
            capacity_policy: CapacityPolicy::default(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Geometry of the star layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutConfig {
    /// Leader position.
    #[serde(default = "default_center")]
    pub center: Point,

    /// Distance of leaf nodes from the center.
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Angle between consecutive slots in degrees. Defaults to
    /// `360 / max_nodes` when absent.
    #[serde(default)]
    pub spacing_deg: Option<f64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            radius: default_radius(),
            spacing_deg: None,
        }
    }
}

/// Staleness detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivityConfig {
    /// Seconds of silence after which a node is stale.
    #[serde(default = "default_inactive_timeout_secs")]
    pub inactive_timeout_secs: u64,

    /// Milliseconds between activity checks.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            inactive_timeout_secs: default_inactive_timeout_secs(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

/// Telemetry transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Serial port to read lines from and write commands to. A regular
    /// file is replayed as a capture, and `-` reads standard input and
    /// writes commands to standard output.
    #[serde(default = "default_device")]
    pub device: String,

    /// Line speed applied when opening the serial port (8N1, no flow
    /// control).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
        }
    }
}

/// Observer HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to start the observer at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind to.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_observer_port")]
    pub port: u16,

    /// How long raw transport lines stay visible on the console endpoint.
    #[serde(default = "default_console_retention_secs")]
    pub console_retention_secs: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
            console_retention_secs: default_console_retention_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[allow(clippy::unnecessary_wraps)]
fn default_leader() -> Option<String> {
    Some(DEFAULT_LEADER.to_owned())
}

const fn default_max_nodes() -> usize {
    12
}

const fn default_center() -> Point {
    Point::new(450.0, 300.0)
}

const fn default_radius() -> f64 {
    200.0
}

const fn default_inactive_timeout_secs() -> u64 {
    15
}

const fn default_check_interval_ms() -> u64 {
    1_000
}

fn default_device() -> String {
    "/dev/ttyACM0".to_owned()
}

const fn default_baud_rate() -> u32 {
    115_200
}

const fn default_true() -> bool {
    true
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

const fn default_console_retention_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}
