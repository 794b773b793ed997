//! Staleness detection.
//!
//! [`ActivityMonitor::tick`] is a pure classification pass: it compares
//! each non-leader node's `last_seen` with the current time and flips the
//! node between `Active` and `Stale`. Positions and histories are never
//! touched, and running it twice with the same `now` changes nothing the
//! second time.

use chrono::{DateTime, TimeDelta, Utc};
use meshscope_types::{NodeActivity, NodeAddress};

use crate::config::ActivityConfig;
use crate::store::TopologyStore;

/// A node whose active flag flipped during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityChange {
    /// The reclassified node.
    pub address: NodeAddress,
    /// New value of the active flag.
    pub active: bool,
}

/// Reclassifies nodes against an inactivity timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityMonitor {
    timeout: TimeDelta,
}

impl ActivityMonitor {
    /// Create a monitor with the given timeout.
    pub const fn new(timeout: TimeDelta) -> Self {
        Self { timeout }
    }

    /// Create a monitor from the activity section of the config.
    pub fn from_config(config: &ActivityConfig) -> Self {
        let timeout = i64::try_from(config.inactive_timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self::new(timeout)
    }

    /// The configured timeout.
    pub const fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Classification for a node last heard from at `last_seen`.
    ///
    /// A node is active while `now - last_seen <= timeout`. Nodes that
    /// have never sent a message stay `Unseen`.
    pub fn classify(&self, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> NodeActivity {
        match last_seen {
            None => NodeActivity::Unseen,
            Some(seen) if now.signed_duration_since(seen) <= self.timeout => NodeActivity::Active,
            Some(_) => NodeActivity::Stale,
        }
    }

    /// Reclassify every non-leader node and report the ones whose
    /// active flag changed.
    pub fn tick(&self, store: &mut TopologyStore, now: DateTime<Utc>) -> Vec<ActivityChange> {
        let mut changes = Vec::new();
        for node in store.nodes_mut() {
            if node.is_leader {
                continue;
            }
            let next = self.classify(node.last_seen, now);
            if next == node.activity {
                continue;
            }
            let was_active = node.activity.is_active();
            node.activity = next;
            if was_active != next.is_active() {
                changes.push(ActivityChange {
                    address: node.address.clone(),
                    active: next.is_active(),
                });
            }
        }
        changes
    }
}
