//! REST API endpoint handlers for the Observer server.
//!
//! All handlers take the read lock on the shared topology and never
//! mutate it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/nodes` | List all nodes in arrival order |
//! | `GET` | `/api/nodes/{address}` | Single node with its edge |
//! | `GET` | `/api/nodes/{address}/messages` | Message history of a node |
//! | `GET` | `/api/edges` | All star edges |
//! | `GET` | `/api/console` | Raw lines received recently |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use chrono::Utc;
use meshscope_types::{Node, NodeAddress};

use crate::error::ObserverError;
use crate::state::AppState;

/// JSON view of a node, with derived fields the dashboard needs.
fn node_json(node: &Node, message_count: usize) -> serde_json::Value {
    serde_json::json!({
        "address": node.address,
        "label": node.address.short_label(),
        "position": node.position,
        "is_leader": node.is_leader,
        "order": node.order,
        "last_seen": node.last_seen,
        "activity": node.activity,
        "active": node.is_active(),
        "simulated": node.address.is_simulated(),
        "message_count": message_count,
    })
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the topology summary and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let topology = state.topology.read().await;
    let store = topology.store();
    let node_count = store.len();
    let active_count = store.list_nodes().filter(|n| n.is_active()).count();
    let leader = store
        .leader()
        .map_or_else(|| String::from("(none yet)"), |n| n.address.to_string());
    let max_nodes = store.max_nodes();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Meshscope Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Meshscope Observer</h1>
    <p class="subtitle">Live mesh topology</p>

    <p>Leader: <code>{leader}</code></p>

    <div>
        <div class="metric">
            <div class="label">Nodes</div>
            <div class="value">{node_count} / {max_nodes}</div>
        </div>
        <div class="metric">
            <div class="label">Active</div>
            <div class="value">{active_count}</div>
        </div>
    </div>

    <h2>API</h2>
    <ul>
        <li><a href="/api/nodes">/api/nodes</a></li>
        <li><a href="/api/edges">/api/edges</a></li>
        <li><a href="/api/console">/api/console</a></li>
        <li>/api/nodes/{{address}}/messages</li>
        <li>/ws/events (WebSocket)</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/nodes -- list nodes
// ---------------------------------------------------------------------------

/// List every node in arrival order.
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let topology = state.topology.read().await;
    let store = topology.store();

    let nodes: Vec<serde_json::Value> = store
        .list_nodes()
        .map(|node| {
            let count = store.get_history(&node.address).map_or(0, <[_]>::len);
            node_json(node, count)
        })
        .collect();

    Json(serde_json::json!({
        "count": nodes.len(),
        "max_nodes": store.max_nodes(),
        "nodes": nodes,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/nodes/{address} -- single node
// ---------------------------------------------------------------------------

/// Return one node and its edge to the leader.
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let address = NodeAddress::new(address);
    let topology = state.topology.read().await;
    let store = topology.store();

    let node = store
        .get_node(&address)
        .ok_or_else(|| ObserverError::NotFound(format!("node {address}")))?;
    let count = store.get_history(&address).map_or(0, <[_]>::len);
    let edge = store.edges().into_iter().find(|e| e.from == address);

    Ok(Json(serde_json::json!({
        "node": node_json(node, count),
        "edge": edge,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/nodes/{address}/messages -- message history
// ---------------------------------------------------------------------------

/// Return a node's full message history, oldest first.
///
/// This is the lookup a dashboard performs when a node is clicked.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let address = NodeAddress::new(address);
    let topology = state.topology.read().await;

    let history = topology
        .store()
        .get_history(&address)
        .ok_or_else(|| ObserverError::NotFound(format!("node {address}")))?;

    let messages: Vec<serde_json::Value> = history
        .iter()
        .map(|record| {
            serde_json::json!({
                "time": record.clock_label(),
                "received_at": record.received_at,
                "text": record.text,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "address": address,
        "title": format!("Messages from {}", address.short_label()),
        "count": messages.len(),
        "messages": messages,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/edges -- star edges
// ---------------------------------------------------------------------------

/// List the edge from every non-leader node to the leader.
pub async fn list_edges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let topology = state.topology.read().await;
    let edges = topology.store().edges();
    Json(serde_json::json!({
        "count": edges.len(),
        "edges": edges,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/console -- recent raw lines
// ---------------------------------------------------------------------------

/// Return the raw transport lines still inside the retention window.
pub async fn console(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let lines = state.console.write().await.recent(Utc::now());
    Json(serde_json::json!({
        "count": lines.len(),
        "lines": lines,
    }))
}
