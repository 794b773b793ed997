//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::operator;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/events` -- `WebSocket` topology event stream
/// - `GET /api/nodes` -- list nodes
/// - `GET /api/nodes/{address}` -- single node
/// - `GET /api/nodes/{address}/messages` -- message history
/// - `GET /api/edges` -- star edges
/// - `GET /api/console` -- recent raw lines
/// - `POST /api/command` -- send a command to the leader
///
/// CORS allows any origin so a dashboard served elsewhere can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/events", get(ws::ws_events))
        // REST API
        .route("/api/nodes", get(handlers::list_nodes))
        .route("/api/nodes/{address}", get(handlers::get_node))
        .route("/api/nodes/{address}/messages", get(handlers::get_history))
        .route("/api/edges", get(handlers::list_edges))
        .route("/api/console", get(handlers::console))
        // Operator
        .route("/api/command", post(operator::send_command))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
