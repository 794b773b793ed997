//! Glue between the transport and the shared topology.
//!
//! Every function here takes the topology write lock for exactly one
//! operation, so a line ingest and an activity tick never interleave.

use chrono::{DateTime, Utc};
use meshscope_core::store::StoreError;
use meshscope_observer::AppState;
use tracing::{debug, warn};

/// Record a raw line on the console and feed it to the topology service.
pub async fn ingest_line(state: &AppState, line: &str, now: DateTime<Utc>) {
    state.console.write().await.push(line, now);

    let result = state.topology.write().await.handle_line(line, now);
    match result {
        Ok(Some(ingested)) => debug!(
            address = %ingested.node.address,
            created = ingested.created,
            "Line ingested"
        ),
        Ok(None) => {}
        Err(StoreError::CapacityExceeded { cap, address }) => warn!(
            %address,
            cap,
            "Node cap reached, message dropped"
        ),
        Err(e) => warn!(error = %e, "Line rejected"),
    }
}

/// Run one activity pass. Returns the number of nodes that flipped.
pub async fn activity_tick(state: &AppState, now: DateTime<Utc>) -> usize {
    state.topology.write().await.tick(now).len()
}
