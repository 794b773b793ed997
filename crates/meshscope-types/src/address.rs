//! Node addresses as reported by the mesh leader.
//!
//! Real addresses are IPv6-like literals made of lowercase hex digits and
//! colons. Simulated nodes get a synthetic address under [`SIM_PREFIX`],
//! which contains non-hex characters and therefore can never collide with
//! an address read off the wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Prefix for synthetic addresses created by the `simulate:<id>` directive.
pub const SIM_PREFIX: &str = "fd58:sim::";

/// Number of trailing characters shown as a node's label.
const SHORT_LABEL_LEN: usize = 4;

/// Opaque identifier of a mesh participant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct NodeAddress(pub String);

impl NodeAddress {
    /// Wrap an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Build the synthetic address for a simulated node id.
    pub fn simulated(id: &str) -> Self {
        Self(format!("{SIM_PREFIX}{id}"))
    }

    /// Whether this address belongs to the synthetic namespace.
    pub fn is_simulated(&self) -> bool {
        self.0.starts_with(SIM_PREFIX)
    }

    /// Return the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last four characters of the address, used as its display label.
    pub fn short_label(&self) -> &str {
        self.0
            .char_indices()
            .rev()
            .nth(SHORT_LABEL_LEN.saturating_sub(1))
            .and_then(|(idx, _)| self.0.get(idx..))
            .unwrap_or(&self.0)
    }
}

impl core::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(address: &str) -> Self {
        Self(address.to_owned())
    }
}

impl From<String> for NodeAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}
