//! Integration tests for the Observer API endpoints.
//!
//! REST tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The `WebSocket` stream is checked against a
//! server bound to a loopback port.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use meshscope_core::config::{MeshConfig, DEFAULT_LEADER};
use meshscope_observer::router::build_router;
use meshscope_observer::state::AppState;
use meshscope_types::TopologyEvent;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tower::ServiceExt;

const NODE_A: &str = "fd58:47f8:cd8:54c4:0:ff:fe00:a001";

async fn make_test_state() -> Arc<AppState> {
    let config = MeshConfig::default();
    let state = AppState::new(&config);
    {
        let mut topology = state.topology.write().await;
        topology.bootstrap(&config.topology).unwrap();
        let now = Utc::now();
        topology
            .handle_line(&format!("Received from {NODE_A} temp=21"), now)
            .unwrap();
        topology
            .handle_line(
                &format!("Received from {NODE_A} temp=22"),
                now + TimeDelta::seconds(1),
            )
            .unwrap();
    }
    state
        .console
        .write()
        .await
        .push("> ipaddr", Utc::now());
    Arc::new(state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn command_request(body: &str) -> Request<Body> {
    Request::post("/api/command")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_list_nodes() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/nodes").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["max_nodes"], 12);

    let leader = &json["nodes"][0];
    assert_eq!(leader["address"], DEFAULT_LEADER);
    assert_eq!(leader["is_leader"], true);
    assert_eq!(leader["label"], "fc00");
    assert_eq!(leader["position"]["x"], 450.0);
    assert_eq!(leader["position"]["y"], 300.0);

    let node = &json["nodes"][1];
    assert_eq!(node["address"], NODE_A);
    assert_eq!(node["order"], 1);
    assert_eq!(node["active"], true);
    assert_eq!(node["activity"], "active");
    assert_eq!(node["message_count"], 2);
}

#[tokio::test]
async fn test_get_node_by_address() {
    let state = make_test_state().await;
    let router = build_router(state);

    let path = format!("/api/nodes/{NODE_A}");
    let response = router
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["node"]["address"], NODE_A);
    assert_eq!(json["edge"]["from"], NODE_A);
    assert_eq!(json["edge"]["to"], DEFAULT_LEADER);
}

#[tokio::test]
async fn test_leader_has_no_edge() {
    let state = make_test_state().await;
    let router = build_router(state);

    let path = format!("/api/nodes/{DEFAULT_LEADER}");
    let response = router
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["node"]["is_leader"], true);
    assert!(json["edge"].is_null());
}

#[tokio::test]
async fn test_get_node_not_found() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/nodes/fd00::dead").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_history_in_arrival_order() {
    let state = make_test_state().await;
    let router = build_router(state);

    let path = format!("/api/nodes/{NODE_A}/messages");
    let response = router
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["title"], "Messages from a001");
    assert_eq!(json["messages"][0]["text"], "temp=21");
    assert_eq!(json["messages"][1]["text"], "temp=22");
    assert_eq!(json["messages"][0]["time"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn test_leader_history_is_empty() {
    let state = make_test_state().await;
    let router = build_router(state);

    let path = format!("/api/nodes/{DEFAULT_LEADER}/messages");
    let response = router
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_history_not_found() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::get("/api/nodes/fd00::dead/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_edges() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/edges").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["edges"][0]["to"], DEFAULT_LEADER);
}

#[tokio::test]
async fn test_console_returns_recent_lines() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/console").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["lines"][0], "> ipaddr");
}

#[tokio::test]
async fn test_command_without_transport_is_unavailable() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(command_request(r#"{"command":"ipaddr"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_command_is_framed_and_forwarded() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = MeshConfig::default();
    let state = Arc::new(AppState::new(&config).with_command_channel(tx));
    let router = build_router(state);

    let response = router
        .oneshot(command_request(r#"{"command":"  ping fd00::1 "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["sent"], "ping fd00::1");
    assert_eq!(rx.recv().await.unwrap(), "ping fd00::1\r\n");
}

#[tokio::test]
async fn test_blank_command_is_rejected() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = MeshConfig::default();
    let state = Arc::new(AppState::new(&config).with_command_channel(tx));
    let router = build_router(state);

    let response = router
        .oneshot(command_request(r#"{"command":"   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_channel() {
    let config = MeshConfig::default();
    let state = AppState::new(&config);
    let mut rx = state.subscribe();

    state
        .topology
        .write()
        .await
        .bootstrap(&config.topology)
        .unwrap();
    state
        .topology
        .write()
        .await
        .handle_line("Received from fd00::7 hello", Utc::now())
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, TopologyEvent::NodeCreated { is_leader: true, .. }));
    let second = rx.recv().await.unwrap();
    assert!(matches!(second, TopologyEvent::NodeCreated { is_leader: false, .. }));
    let third = rx.recv().await.unwrap();
    assert!(matches!(
        third,
        TopologyEvent::MessageAppended { ref record, .. } if record.text == "hello"
    ));
}

#[tokio::test]
async fn test_snapshot_and_subscription_do_not_overlap() {
    let state = make_test_state().await;
    let (snapshot, mut rx) = state.subscribe_with_snapshot().await;

    assert_eq!(snapshot.len(), 2);
    assert!(matches!(
        &snapshot[0],
        TopologyEvent::NodeCreated { address, is_leader: true, .. }
            if address.as_str() == DEFAULT_LEADER
    ));
    assert!(matches!(
        &snapshot[1],
        TopologyEvent::NodeCreated { address, is_leader: false, .. }
            if address.as_str() == NODE_A
    ));
    // Nothing published before the subscription is replayed on it.
    assert!(rx.try_recv().is_err());

    state
        .topology
        .write()
        .await
        .handle_line(&format!("Received from {NODE_A} temp=23"), Utc::now())
        .unwrap();
    assert!(matches!(
        rx.recv().await.unwrap(),
        TopologyEvent::MessageAppended { ref record, .. } if record.text == "temp=23"
    ));
}

// ---------------------------------------------------------------------------
// WebSocket over a real listener
// ---------------------------------------------------------------------------

/// Perform the `WebSocket` handshake on `/ws/events` and return the read
/// half positioned at the first frame. The write half must stay alive for
/// the server to keep the connection.
async fn connect_ws(addr: std::net::SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(
            b"GET /ws/events HTTP/1.1\r\n\
              Host: localhost\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
              Sec-WebSocket-Version: 13\r\n\r\n",
        )
        .await
        .unwrap();

    let mut reader = BufReader::new(read_half);
    let mut status = String::new();
    reader.read_line(&mut status).await.unwrap();
    assert!(status.contains(" 101 "), "unexpected status line: {status}");
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).await.unwrap();
        if header == "\r\n" {
            break;
        }
    }
    (reader, write_half)
}

/// Read one unmasked server text frame and parse its JSON payload.
async fn next_event(reader: &mut BufReader<OwnedReadHalf>) -> Value {
    let read = async {
        let [opcode, len] = {
            let mut head = [0u8; 2];
            reader.read_exact(&mut head).await.unwrap();
            head
        };
        assert_eq!(opcode, 0x81, "expected a final text frame");
        let len = match len & 0x7f {
            126 => {
                let mut ext = [0u8; 2];
                reader.read_exact(&mut ext).await.unwrap();
                usize::from(u16::from_be_bytes(ext))
            }
            short => usize::from(short),
        };
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.unwrap();
        serde_json::from_slice::<Value>(&payload).unwrap()
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ws_sends_snapshot_before_live_events() {
    let state = make_test_state().await;
    // Push NODE_A past the inactivity timeout.
    state
        .topology
        .write()
        .await
        .tick(Utc::now() + TimeDelta::seconds(60));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(meshscope_observer::serve(listener, Arc::clone(&state)));

    let (mut reader, _writer) = connect_ws(addr).await;

    let leader = next_event(&mut reader).await;
    assert_eq!(leader["type"], "node_created");
    assert_eq!(leader["address"], DEFAULT_LEADER);
    assert_eq!(leader["is_leader"], true);

    let node = next_event(&mut reader).await;
    assert_eq!(node["type"], "node_created");
    assert_eq!(node["address"], NODE_A);

    let stale = next_event(&mut reader).await;
    assert_eq!(stale["type"], "activity_changed");
    assert_eq!(stale["address"], NODE_A);
    assert_eq!(stale["active"], false);

    state
        .topology
        .write()
        .await
        .handle_line("Received from fd00::7 hello", Utc::now())
        .unwrap();

    let created = next_event(&mut reader).await;
    assert_eq!(created["type"], "node_created");
    assert_eq!(created["address"], "fd00::7");
    let appended = next_event(&mut reader).await;
    assert_eq!(appended["type"], "message_appended");
    assert_eq!(appended["record"]["text"], "hello");

    server.abort();
}
