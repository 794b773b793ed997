//! Change notifications pushed to the presentation layer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::address::NodeAddress;
use crate::structs::{MessageRecord, Point};

/// A state change in the topology.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type":"activity_changed","address":"fd00::1","active":false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TopologyEvent {
    /// A node was registered for the first time.
    NodeCreated {
        /// Address of the new node.
        address: NodeAddress,
        /// Its fixed layout position.
        position: Point,
        /// Whether it is the leader.
        is_leader: bool,
    },
    /// A message was appended to a node's history.
    MessageAppended {
        /// Sender of the message.
        address: NodeAddress,
        /// The appended record.
        record: MessageRecord,
    },
    /// A node's active flag flipped.
    ActivityChanged {
        /// The reclassified node.
        address: NodeAddress,
        /// New value of the flag.
        active: bool,
    },
}
