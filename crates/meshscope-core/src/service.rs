//! The topology service: store, monitor and event sink behind one owner.
//!
//! Every mutation of the topology goes through a [`TopologyService`], which
//! turns store results into [`TopologyEvent`]s for the sink. Callers that
//! share the service across tasks wrap it in a single lock, so ingest calls
//! and activity ticks are serialized and a node's `last_seen` and activity
//! are always updated together.

use chrono::{DateTime, Utc};
use meshscope_types::{Node, NodeAddress, TopologyEvent};
use tracing::{debug, info, warn};

use crate::config::{MeshConfig, TopologyConfig};
use crate::monitor::{ActivityChange, ActivityMonitor};
use crate::parser;
use crate::sink::EventSink;
use crate::store::{Ingested, StoreError, TopologyStore};

/// Owns the topology and reports every change to an [`EventSink`].
pub struct TopologyService<S> {
    store: TopologyStore,
    monitor: ActivityMonitor,
    sink: S,
}

impl<S: EventSink> TopologyService<S> {
    /// Assemble a service from its parts.
    pub const fn new(store: TopologyStore, monitor: ActivityMonitor, sink: S) -> Self {
        Self {
            store,
            monitor,
            sink,
        }
    }

    /// Build an empty service from configuration. Call
    /// [`bootstrap`](Self::bootstrap) before feeding it lines.
    pub fn from_config(config: &MeshConfig, sink: S) -> Self {
        Self::new(
            TopologyStore::from_config(&config.topology),
            ActivityMonitor::from_config(&config.activity),
            sink,
        )
    }

    /// Seed the configured leader and register the configured known nodes.
    ///
    /// Without a configured leader the first node registered here, or the
    /// first one heard from, becomes the leader.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the leader is already seeded or the known
    /// nodes exceed the cap under the reject policy.
    pub fn bootstrap(&mut self, config: &TopologyConfig) -> Result<(), StoreError> {
        if let Some(leader) = &config.leader {
            self.seed_leader(NodeAddress::new(leader.as_str()))?;
        }
        for known in &config.known_nodes {
            self.register(NodeAddress::new(known.as_str()))?;
        }
        Ok(())
    }

    /// Register the leader explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LeaderAlreadySeeded`] if a leader exists.
    pub fn seed_leader(&mut self, address: NodeAddress) -> Result<(), StoreError> {
        let node = self.store.seed_leader(address)?;
        self.announce(&node);
        Ok(())
    }

    /// Register a node that has not sent anything yet. Returns `true` if
    /// it was new.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] when the cap is reached
    /// under the reject policy.
    pub fn register(&mut self, address: NodeAddress) -> Result<bool, StoreError> {
        match self.store.register(address)? {
            Some(node) => {
                self.announce(&node);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parse one telemetry line and ingest it. Lines that carry no report
    /// are skipped with `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] if the line comes from a
    /// new node that does not fit.
    pub fn handle_line(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Ingested>, StoreError> {
        let Some(parsed) = parser::parse(line) else {
            debug!(line, "Skipping line without sender");
            return Ok(None);
        };
        if parsed.simulated {
            debug!(address = %parsed.address, "Simulated node directive");
        }
        self.ingest(&parsed.address, &parsed.message, now).map(Some)
    }

    /// Record a message from `address`.
    ///
    /// Publishes `NodeCreated` for a new node, then `MessageAppended`, then
    /// `ActivityChanged` if the node was stale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] if the node is new and does
    /// not fit.
    pub fn ingest(
        &mut self,
        address: &NodeAddress,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Ingested, StoreError> {
        let ingested = self.store.ingest(address, message, now)?;

        if ingested.created {
            self.announce(&ingested.node);
        }
        debug!(address = %address, text = message, "Message appended");
        self.sink.publish(TopologyEvent::MessageAppended {
            address: address.clone(),
            record: ingested.record.clone(),
        });
        if ingested.reactivated {
            info!(address = %address, "Node active again");
            self.sink.publish(TopologyEvent::ActivityChanged {
                address: address.clone(),
                active: true,
            });
        }
        Ok(ingested)
    }

    /// Run one activity pass and publish an `ActivityChanged` per flip.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<ActivityChange> {
        let changes = self.monitor.tick(&mut self.store, now);
        for change in &changes {
            if change.active {
                info!(address = %change.address, "Node active again");
            } else {
                info!(
                    address = %change.address,
                    timeout_secs = self.monitor.timeout().num_seconds(),
                    "Node went stale"
                );
            }
            self.sink.publish(TopologyEvent::ActivityChanged {
                address: change.address.clone(),
                active: change.active,
            });
        }
        changes
    }

    /// Events that bring an empty view up to the current topology: one
    /// `NodeCreated` per node in registration order, then an
    /// `ActivityChanged { active: false }` for every stale node.
    ///
    /// Taken under the same lock that orders live events, so a consumer
    /// that subscribes while holding it sees no gap and no duplicates.
    pub fn snapshot(&self) -> Vec<TopologyEvent> {
        let created = self.store.list_nodes().map(created_event);
        let stale = self
            .store
            .list_nodes()
            .filter(|node| !node.is_active())
            .map(|node| TopologyEvent::ActivityChanged {
                address: node.address.clone(),
                active: false,
            });
        created.chain(stale).collect()
    }

    /// Read access to the topology.
    pub const fn store(&self) -> &TopologyStore {
        &self.store
    }

    /// The event sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the event sink.
    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn announce(&mut self, node: &Node) {
        info!(
            address = %node.address,
            label = node.address.short_label(),
            is_leader = node.is_leader,
            x = node.position.x,
            y = node.position.y,
            "Node created"
        );
        if node.order >= self.store.max_nodes() {
            warn!(
                address = %node.address,
                cap = self.store.max_nodes(),
                "Node cap exceeded, layout position overlaps an earlier node"
            );
        }
        self.sink.publish(created_event(node));
    }
}

fn created_event(node: &Node) -> TopologyEvent {
    TopologyEvent::NodeCreated {
        address: node.address.clone(),
        position: node.position,
        is_leader: node.is_leader,
    }
}
