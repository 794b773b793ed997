//! Core entity structs: nodes, their positions, edges and message records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::address::NodeAddress;
use crate::enums::NodeActivity;

/// A position in the schematic layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One mesh participant.
///
/// `position`, `is_leader` and `order` are fixed at creation. The store
/// only mutates `last_seen` and `activity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Node {
    /// Unique address of the node.
    pub address: NodeAddress,
    /// Layout position assigned at creation.
    pub position: Point,
    /// Whether this node is the star's center.
    pub is_leader: bool,
    /// Insertion index; the leader is 0.
    pub order: usize,
    /// Time of the most recent message, absent until the first one.
    pub last_seen: Option<DateTime<Utc>>,
    /// Current liveness classification.
    pub activity: NodeActivity,
}

impl Node {
    /// Whether the node is currently considered active.
    pub const fn is_active(&self) -> bool {
        self.is_leader || self.activity.is_active()
    }
}

/// A message received from a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MessageRecord {
    /// Wall-clock time of arrival.
    pub received_at: DateTime<Utc>,
    /// Message text with any simulation directive removed.
    pub text: String,
}

impl MessageRecord {
    /// Create a record.
    pub fn new(received_at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            received_at,
            text: text.into(),
        }
    }

    /// `HH:MM:SS` rendering of the arrival time (UTC).
    pub fn clock_label(&self) -> String {
        self.received_at.format("%H:%M:%S").to_string()
    }
}

/// A star edge from a leaf node to the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Edge {
    /// The leaf node.
    pub from: NodeAddress,
    /// The leader.
    pub to: NodeAddress,
}
