//! The authoritative in-memory topology.
//!
//! [`TopologyStore`] owns every known node, its layout position, its
//! liveness classification and its full message history. Nodes are kept
//! in insertion order so listing them is stable and layout replay is
//! deterministic.
//!
//! # Invariants
//!
//! - The first node ever registered is the leader, and no other node can
//!   become one.
//! - Every other node has exactly one edge, to the leader. Edges are
//!   derived from the leader flag, never stored, so peer edges cannot exist.
//! - A position is computed once, at creation.
//! - Histories only grow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meshscope_types::{Edge, MessageRecord, Node, NodeActivity, NodeAddress};

use crate::config::{CapacityPolicy, LayoutConfig, TopologyConfig};
use crate::layout;

/// Errors raised by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The node cap is reached and the policy is [`CapacityPolicy::Reject`].
    #[error("node cap of {cap} reached, refusing {address}")]
    CapacityExceeded {
        /// Configured cap.
        cap: usize,
        /// The address that was refused.
        address: NodeAddress,
    },

    /// A leader already exists.
    #[error("leader already registered: {existing}")]
    LeaderAlreadySeeded {
        /// The current leader.
        existing: NodeAddress,
    },
}

/// Outcome of a successful [`TopologyStore::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    /// Whether the node was registered by this call.
    pub created: bool,
    /// Whether the node was stale before this message.
    pub reactivated: bool,
    /// The node after the update.
    pub node: Node,
    /// The appended record.
    pub record: MessageRecord,
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    history: Vec<MessageRecord>,
}

impl Entry {
    fn append(&mut self, record: MessageRecord, created: bool) -> Ingested {
        let reactivated = self.node.activity == NodeActivity::Stale;
        self.node.last_seen = Some(record.received_at);
        self.node.activity = NodeActivity::Active;
        self.history.push(record.clone());
        Ingested {
            created,
            reactivated,
            node: self.node.clone(),
            record,
        }
    }
}

/// Known nodes, their layout and their message histories.
#[derive(Debug, Clone)]
pub struct TopologyStore {
    entries: Vec<Entry>,
    index: HashMap<NodeAddress, usize>,
    leader: Option<usize>,
    max_nodes: usize,
    capacity_policy: CapacityPolicy,
    layout: LayoutConfig,
}

impl TopologyStore {
    /// Create an empty store.
    pub fn new(max_nodes: usize, capacity_policy: CapacityPolicy, layout: LayoutConfig) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            leader: None,
            max_nodes: max_nodes.max(1),
            capacity_policy,
            layout,
        }
    }

    /// Create an empty store from the topology section of the config.
    pub fn from_config(config: &TopologyConfig) -> Self {
        Self::new(
            config.max_nodes,
            config.capacity_policy,
            config.layout.clone(),
        )
    }

    /// Register `address` as the leader, placed at the layout center.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LeaderAlreadySeeded`] if any node exists,
    /// since the first registered node is already the leader.
    pub fn seed_leader(&mut self, address: NodeAddress) -> Result<Node, StoreError> {
        if let Some(existing) = self.leader() {
            return Err(StoreError::LeaderAlreadySeeded {
                existing: existing.address.clone(),
            });
        }
        let entry = self.new_entry(address)?;
        let node = entry.node.clone();
        self.insert(entry);
        Ok(node)
    }

    /// Register `address` without a message. Returns the new node, or
    /// `None` if the address was already known.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] when the cap is reached
    /// under the reject policy.
    pub fn register(&mut self, address: NodeAddress) -> Result<Option<Node>, StoreError> {
        if self.index.contains_key(&address) {
            return Ok(None);
        }
        let entry = self.new_entry(address)?;
        let node = entry.node.clone();
        self.insert(entry);
        Ok(Some(node))
    }

    /// Record a message from `address` received at `now`.
    ///
    /// Registers the node if unknown, appends the message to its history
    /// and marks it active.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] for a new address when the
    /// cap is reached under the reject policy. The store is unchanged.
    pub fn ingest(
        &mut self,
        address: &NodeAddress,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Ingested, StoreError> {
        let record = MessageRecord::new(now, message);

        if let Some(entry) = self
            .index
            .get(address)
            .and_then(|&idx| self.entries.get_mut(idx))
        {
            return Ok(entry.append(record, false));
        }

        let mut entry = self.new_entry(address.clone())?;
        let ingested = entry.append(record, true);
        self.insert(entry);
        Ok(ingested)
    }

    /// Look up a node by address.
    pub fn get_node(&self, address: &NodeAddress) -> Option<&Node> {
        let idx = *self.index.get(address)?;
        self.entries.get(idx).map(|entry| &entry.node)
    }

    /// All nodes in insertion order.
    pub fn list_nodes(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|entry| &entry.node)
    }

    /// Message history of a node, oldest first.
    pub fn get_history(&self, address: &NodeAddress) -> Option<&[MessageRecord]> {
        let idx = *self.index.get(address)?;
        self.entries.get(idx).map(|entry| entry.history.as_slice())
    }

    /// The leader, if one is registered.
    pub fn leader(&self) -> Option<&Node> {
        self.entries.get(self.leader?).map(|entry| &entry.node)
    }

    /// One edge per non-leader node, pointing at the leader.
    pub fn edges(&self) -> Vec<Edge> {
        let Some(leader) = self.leader() else {
            return Vec::new();
        };
        self.list_nodes()
            .filter(|node| !node.is_leader)
            .map(|node| Edge {
                from: node.address.clone(),
                to: leader.address.clone(),
            })
            .collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no node is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured node cap.
    pub const fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Mutable access to nodes for the activity pass.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.entries.iter_mut().map(|entry| &mut entry.node)
    }

    /// Build the entry for a new node without inserting it.
    fn new_entry(&self, address: NodeAddress) -> Result<Entry, StoreError> {
        let order = self.entries.len();
        if order >= self.max_nodes && self.capacity_policy == CapacityPolicy::Reject {
            return Err(StoreError::CapacityExceeded {
                cap: self.max_nodes,
                address,
            });
        }

        let is_leader = self.leader.is_none();
        let activity = if is_leader {
            NodeActivity::Active
        } else {
            NodeActivity::Unseen
        };

        Ok(Entry {
            node: Node {
                address,
                position: layout::assign(order, is_leader, &self.layout, self.max_nodes),
                is_leader,
                order,
                last_seen: None,
                activity,
            },
            history: Vec::new(),
        })
    }

    fn insert(&mut self, entry: Entry) {
        let idx = self.entries.len();
        if entry.node.is_leader {
            self.leader = Some(idx);
        }
        self.index.insert(entry.node.address.clone(), idx);
        self.entries.push(entry);
    }
}
