//! In-process stand-ins for the REST collection and the hosted table store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use todosync_core::{Todo, TodoPatch};

pub const ANON_KEY: &str = "anon-key";

#[derive(Clone, Default)]
pub struct MockState {
    pub rest: Arc<Mutex<Vec<Todo>>>,
    pub table: Arc<Mutex<Vec<Todo>>>,
    /// `postgres_changes` data objects pushed right after a join.
    pub changes: Arc<Mutex<Vec<Value>>>,
    /// Event names received on the websocket, in order.
    pub seen_events: Arc<Mutex<Vec<String>>>,
    /// Never answer `phx_join`.
    pub ignore_joins: bool,
}

impl MockState {
    pub fn with_rest(self, todos: Vec<Todo>) -> Self {
        *self.rest.lock().unwrap() = todos;
        self
    }

    pub fn with_table(self, todos: Vec<Todo>) -> Self {
        *self.table.lock().unwrap() = todos;
        self
    }

    pub fn push_after_join(self, data: Value) -> Self {
        self.changes.lock().unwrap().push(data);
        self
    }

    pub fn ignoring_joins(mut self) -> Self {
        self.ignore_joins = true;
        self
    }

    pub fn table_rows(&self) -> Vec<Todo> {
        self.table.lock().unwrap().clone()
    }

    pub fn rest_rows(&self) -> Vec<Todo> {
        self.rest.lock().unwrap().clone()
    }

    /// Polls until the websocket saw `event`, for at most two seconds.
    pub async fn wait_for_event(&self, event: &str) -> bool {
        for _ in 0..40 {
            if self.seen_events.lock().unwrap().iter().any(|e| e == event) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }
}

/// Starts the mock server and returns its base URL.
pub async fn spawn_server(state: MockState) -> String {
    let app = Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).patch(patch_todo).delete(delete_todo),
        )
        .route(
            "/rest/v1/todos",
            get(table_select)
                .post(table_insert)
                .patch(table_update)
                .delete(table_delete),
        )
        .route("/realtime/v1/websocket", get(realtime))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

// ============================================================================
// REST collection
// ============================================================================

async fn list_todos(State(state): State<MockState>) -> Json<Vec<Todo>> {
    Json(state.rest_rows())
}

async fn create_todo(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Todo>) {
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let completed = body["completed"].as_bool().unwrap_or(false);

    let mut rest = state.rest.lock().unwrap();
    let id = 201 + rest.iter().filter(|t| t.id > 200).count() as i64;
    let todo = Todo::new(id, title).with_completed(completed);
    rest.push(todo.clone());

    (StatusCode::CREATED, Json(todo))
}

async fn get_todo(
    State(state): State<MockState>,
    Path(id): Path<i64>,
) -> Result<Json<Todo>, StatusCode> {
    state
        .rest_rows()
        .into_iter()
        .find(|t| t.id == id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn patch_todo(
    State(state): State<MockState>,
    Path(id): Path<i64>,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<Todo>, StatusCode> {
    let mut rest = state.rest.lock().unwrap();
    let todo = rest
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    todo.apply(&patch);
    Ok(Json(todo.clone()))
}

async fn delete_todo(State(state): State<MockState>, Path(id): Path<i64>) -> Json<Value> {
    state.rest.lock().unwrap().retain(|t| t.id != id);
    Json(json!({}))
}

// ============================================================================
// Table store
// ============================================================================

fn authorized(headers: &HeaderMap) -> bool {
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
    apikey == Some(ANON_KEY) && bearer == Some(&format!("Bearer {}", ANON_KEY))
}

/// Parses a PostgREST `eq.N` / `neq.N` filter.
fn id_filter(query: &HashMap<String, String>) -> Option<(bool, i64)> {
    let raw = query.get("id")?;
    if let Some(n) = raw.strip_prefix("eq.") {
        return n.parse().ok().map(|n| (true, n));
    }
    raw.strip_prefix("neq.")
        .and_then(|n| n.parse().ok())
        .map(|n| (false, n))
}

fn matches_filter(todo: &Todo, filter: Option<(bool, i64)>) -> bool {
    match filter {
        Some((true, id)) => todo.id == id,
        Some((false, id)) => todo.id != id,
        None => false,
    }
}

async fn table_select(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let limit = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(usize::MAX);
    let rows: Vec<Todo> = state.table_rows().into_iter().take(limit).collect();

    let body = if query.get("select").map(String::as_str) == Some("id") {
        Value::Array(rows.iter().map(|t| json!({ "id": t.id })).collect())
    } else {
        json!(rows)
    };
    Ok(Json(body))
}

async fn table_insert(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(items): Json<Vec<Todo>>,
) -> Result<(StatusCode, Json<Vec<Todo>>), StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let mut table = state.table.lock().unwrap();
    if items.iter().any(|item| table.iter().any(|t| t.id == item.id)) {
        return Err(StatusCode::CONFLICT);
    }
    table.extend(items.iter().cloned());

    let prefer = headers.get("prefer").and_then(|v| v.to_str().ok());
    if prefer == Some("return=representation") {
        Ok((StatusCode::CREATED, Json(items)))
    } else {
        Ok((StatusCode::CREATED, Json(Vec::new())))
    }
}

async fn table_update(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(patch): Json<TodoPatch>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }

    let filter = id_filter(&query);
    for todo in state.table.lock().unwrap().iter_mut() {
        if matches_filter(todo, filter) {
            todo.apply(&patch);
        }
    }
    StatusCode::NO_CONTENT
}

async fn table_delete(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }

    let filter = id_filter(&query);
    if filter.is_none() {
        // PostgREST refuses unfiltered deletes.
        return StatusCode::BAD_REQUEST;
    }
    state
        .table
        .lock()
        .unwrap()
        .retain(|t| !matches_filter(t, filter));
    StatusCode::NO_CONTENT
}

// ============================================================================
// Realtime
// ============================================================================

async fn realtime(
    ws: WebSocketUpgrade,
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("apikey").map(String::as_str) != Some(ANON_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| run_socket(socket, state))
}

async fn run_socket(mut socket: WebSocket, state: MockState) {
    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame: Value = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(_) => continue,
        };
        let event = frame["event"].as_str().unwrap_or_default().to_string();
        state.seen_events.lock().unwrap().push(event.clone());

        if event != "phx_join" || state.ignore_joins {
            continue;
        }

        let topic = frame["topic"].clone();
        let reply = json!({
            "topic": topic,
            "event": "phx_reply",
            "payload": {
                "status": "ok",
                "response": {
                    "postgres_changes": [
                        { "id": 1, "event": "*", "schema": "public", "table": "todos" }
                    ]
                }
            },
            "ref": frame["ref"].clone()
        });
        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            break;
        }

        let changes = state.changes.lock().unwrap().clone();
        for data in changes {
            let frame = json!({
                "topic": topic,
                "event": "postgres_changes",
                "payload": { "data": data, "ids": [1] },
                "ref": null
            });
            if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                return;
            }
        }
    }
}
