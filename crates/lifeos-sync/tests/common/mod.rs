//! In-process fake Life OS backend: REST routes plus the websocket push
//! endpoint, bound to an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use lifeos_core::{ApiNode, NodeId, NodeKind, TreeNode};
use lifeos_sync::SyncConfig;

pub const GOOD_TOKEN: &str = "good";

#[derive(Default)]
pub struct FakeState {
    pub nodes: Vec<ApiNode>,
    pub messages: HashMap<String, Value>,
    /// Replaces the body of `GET /api/tree` when set.
    pub tree_body: Option<Value>,
    /// Every push frame the server received after authentication.
    pub received: Vec<Value>,
}

#[derive(Clone)]
struct Fake {
    state: Arc<Mutex<FakeState>>,
    push: broadcast::Sender<String>,
}

pub struct Backend {
    pub addr: SocketAddr,
    fake: Fake,
}

impl Backend {
    pub async fn spawn(nodes: Vec<ApiNode>) -> Backend {
        let (push, _) = broadcast::channel(32);
        let fake = Fake {
            state: Arc::new(Mutex::new(FakeState {
                nodes,
                ..FakeState::default()
            })),
            push,
        };

        let app = Router::new()
            .route("/health", get(health))
            .route("/api/tree", get(load_tree))
            .route(
                "/api/nodes/{id}",
                get(get_node).post(upsert_node).delete(delete_node),
            )
            .route("/api/nodes/{id}/move", put(move_node))
            .route("/api/nodes/{id}/messages", put(save_messages))
            .route("/ws", get(push_socket))
            .route("/ws-silent", get(silent_socket))
            .route("/ws-slow", get(slow_socket))
            .route("/ws-hangup", get(hangup_socket))
            .route("/ws-close-early", get(close_early_socket))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Backend { addr, fake }
    }

    pub fn config(&self) -> SyncConfig {
        SyncConfig::for_api(&format!("http://{}", self.addr))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.fake.state.lock().unwrap()
    }

    /// Sends a frame to every authenticated socket.
    pub fn push(&self, frame: Value) {
        let _ = self.fake.push.send(frame.to_string());
    }

    pub fn received_events(&self) -> Vec<String> {
        self.state()
            .received
            .iter()
            .filter_map(|frame| frame["event"].as_str().map(str::to_string))
            .collect()
    }
}

/// health (theme) > sleep (subtopic) > naps (topic); work (theme).
pub fn sample_nodes() -> Vec<ApiNode> {
    vec![
        node("health", NodeKind::Theme, None, &["sleep"]),
        node("sleep", NodeKind::Subtopic, Some("health"), &["naps"]),
        node("naps", NodeKind::Topic, Some("sleep"), &[]),
        node("work", NodeKind::Theme, None, &[]),
    ]
}

pub fn node(id: &str, kind: NodeKind, parent: Option<&str>, children: &[&str]) -> ApiNode {
    let mut api = TreeNode::new(id, kind, capitalize(id)).to_api();
    api.parent_id = parent.map(NodeId::from);
    api.children = children.iter().map(|c| NodeId::from(*c)).collect();
    api.date_created = "2026-01-01T00:00:00.000Z".to_string();
    api.date_modified = "2026-01-01T00:00:00.000Z".to_string();
    api
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Polls `check` until it holds, for up to two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// REST handlers
// ---------------------------------------------------------------------------

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

fn authorize(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let expected = format!("Bearer {GOOD_TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(fail(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn load_tree(State(fake): State<Fake>, headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    let state = fake.state.lock().unwrap();
    if let Some(body) = &state.tree_body {
        return Ok(Json(body.clone()));
    }
    Ok(Json(json!({ "nodes": state.nodes, "version": "1" })))
}

async fn get_node(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let state = fake.state.lock().unwrap();
    let node = state
        .nodes
        .iter()
        .find(|n| n.id.as_str() == id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Node not found"))?;
    let mut body = serde_json::to_value(node).unwrap();
    if let Some(messages) = state.messages.get(&id) {
        body["messages"] = messages.clone();
    }
    Ok(Json(json!({ "node": body })))
}

async fn upsert_node(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&headers)?;
    let mut state = fake.state.lock().unwrap();

    if let Some(existing) = state.nodes.iter_mut().find(|n| n.id.as_str() == id) {
        if let Some(label) = body["label"].as_str() {
            existing.label = label.to_string();
        }
        if let Some(icon) = body["icon"].as_str() {
            existing.icon = icon.to_string();
        }
        if let Some(summary) = body["summary"].as_str() {
            existing.summary = Some(summary.to_string());
        }
        existing.date_modified = "2026-02-02T00:00:00.000Z".to_string();
        return Ok(Json(json!({ "node": existing })));
    }

    let mut body = body;
    body["id"] = json!(id);
    let created: ApiNode = serde_json::from_value(body)
        .map_err(|err| fail(StatusCode::BAD_REQUEST, &err.to_string()))?;
    if let Some(parent_id) = &created.parent_id {
        match state.nodes.iter_mut().find(|n| &n.id == parent_id) {
            Some(parent) => parent.children.push(created.id.clone()),
            None => return Err(fail(StatusCode::BAD_REQUEST, "Parent not found")),
        }
    }
    state.nodes.push(created.clone());
    Ok(Json(json!({ "node": created })))
}

async fn delete_node(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let mut state = fake.state.lock().unwrap();
    if !state.nodes.iter().any(|n| n.id.as_str() == id) {
        return Err(fail(StatusCode::NOT_FOUND, "Node not found"));
    }

    let mut doomed = vec![NodeId::from(id.as_str())];
    let mut i = 0;
    while i < doomed.len() {
        let current = doomed[i].clone();
        doomed.extend(
            state
                .nodes
                .iter()
                .filter(|n| n.parent_id.as_ref() == Some(&current))
                .map(|n| n.id.clone()),
        );
        i += 1;
    }
    state.nodes.retain(|n| !doomed.contains(&n.id));
    for node in &mut state.nodes {
        node.children.retain(|c| !doomed.contains(c));
    }
    Ok(Json(json!({ "deletedCount": doomed.len() })))
}

async fn move_node(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&headers)?;
    let new_parent = body["newParentId"].as_str().map(NodeId::from);
    let mut state = fake.state.lock().unwrap();
    let node_id = NodeId::from(id.as_str());

    for node in &mut state.nodes {
        node.children.retain(|c| c != &node_id);
        if Some(&node.id) == new_parent.as_ref() {
            node.children.push(node_id.clone());
        }
    }
    let node = state
        .nodes
        .iter_mut()
        .find(|n| n.id == node_id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Node not found"))?;
    node.parent_id = new_parent;
    Ok(Json(json!({ "node": node })))
}

async fn save_messages(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&headers)?;
    let mut state = fake.state.lock().unwrap();
    let node = state
        .nodes
        .iter_mut()
        .find(|n| n.id.as_str() == id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Node not found"))?;
    node.has_messages = true;
    state.messages.insert(id, body["messages"].clone());
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

fn frame(value: Value) -> WsMessage {
    WsMessage::Text(value.to_string().into())
}

async fn push_socket(ws: WebSocketUpgrade, State(fake): State<Fake>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, fake))
}

/// Accepts the upgrade and never says anything.
async fn silent_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|socket| async move {
        let _held = socket;
        tokio::time::sleep(Duration::from_secs(30)).await;
    })
}

/// Like `/ws`, but only starts the handshake after 300ms.
async fn slow_socket(ws: WebSocketUpgrade, State(fake): State<Fake>) -> Response {
    ws.on_upgrade(move |socket| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        serve_socket(socket, fake).await;
    })
}

/// Acknowledges any token, then closes the socket.
async fn hangup_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        let _auth = socket.recv().await;
        let _ = socket.send(frame(json!({ "event": "auth:success" }))).await;
        let _ = socket.send(WsMessage::Close(None)).await;
    })
}

/// Reads the auth frame and closes without answering it.
async fn close_early_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        let _auth = socket.recv().await;
        let _ = socket.send(WsMessage::Close(None)).await;
    })
}

async fn serve_socket(mut socket: WebSocket, fake: Fake) {
    let token = match socket.recv().await {
        Some(Ok(WsMessage::Text(text))) => serde_json::from_str::<Value>(text.as_str())
            .ok()
            .and_then(|v| v["data"]["token"].as_str().map(str::to_string)),
        _ => None,
    };
    if token.as_deref() != Some(GOOD_TOKEN) {
        let _ = socket
            .send(frame(json!({
                "event": "auth:error",
                "data": { "message": "Invalid token" }
            })))
            .await;
        return;
    }

    let mut pushes = fake.push.subscribe();
    if socket
        .send(frame(json!({ "event": "auth:success" })))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    let reply = reply_to(&fake, &value);
                    fake.state.lock().unwrap().received.push(value);
                    if let Some(reply) = reply {
                        if socket.send(frame(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            pushed = pushes.recv() => match pushed {
                Ok(text) => {
                    if socket.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }
}

fn reply_to(fake: &Fake, emission: &Value) -> Option<Value> {
    match emission["event"].as_str()? {
        "tree:load" => {
            let state = fake.state.lock().unwrap();
            Some(json!({ "event": "tree:loaded", "data": { "nodes": state.nodes } }))
        }
        "artifact:upload" => {
            let name = emission["data"]["fileName"].as_str().unwrap_or("file");
            Some(json!({
                "event": "artifact:uploaded",
                "data": { "url": format!("https://files.test/{name}") }
            }))
        }
        _ => None,
    }
}
