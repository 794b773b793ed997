//! Change notification sinks.
//!
//! The presentation layer learns about topology changes through an
//! [`EventSink`]. The observer server implements it with a broadcast
//! channel; [`RecordingSink`] keeps events in memory for tests and replay.

use meshscope_types::TopologyEvent;

/// Receives every state change produced by the topology service.
pub trait EventSink: Send {
    /// Called once per change, in the order the changes happened.
    fn publish(&mut self, event: TopologyEvent);
}

/// A sink that keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<TopologyEvent>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[TopologyEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<TopologyEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: TopologyEvent) {
        self.events.push(event);
    }
}
