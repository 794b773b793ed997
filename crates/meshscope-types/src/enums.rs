//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Liveness classification of a node.
///
/// Non-leader nodes move `Unseen -> Active` on their first message,
/// `Active -> Stale` once the inactivity timeout elapses, and back to
/// `Active` on any later message. The leader is always `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeActivity {
    /// Registered but no message received yet.
    Unseen,
    /// Heard from within the inactivity timeout.
    Active,
    /// Silent for longer than the inactivity timeout.
    Stale,
}

impl NodeActivity {
    /// Whether the node counts as active. Only `Stale` is inactive.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Stale)
    }
}
