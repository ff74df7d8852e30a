//! In-process HTTP stub for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Latency of `/ok` and `/health`.
pub const OK_DELAY: Duration = Duration::from_millis(10);
/// Latency of `/slow`; longer than any timeout the tests use.
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Start the stub on an ephemeral port and return its base URL.
pub async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/ok", get(ok))
        .route("/health", get(ok))
        .route("/slow", get(slow))
        .route("/fail", get(fail))
        .route("/items", post(create_item))
        .route("/items/{id}", get(get_item));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn ok() -> &'static str {
    tokio::time::sleep(OK_DELAY).await;
    "ok"
}

async fn slow() -> &'static str {
    tokio::time::sleep(SLOW_DELAY).await;
    "late"
}

async fn fail() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn create_item(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(json!({ "item": { "id": id, "name": body.get("name").cloned().unwrap_or(Value::Null) } })),
    )
}

async fn get_item(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "item": { "id": id } }))
}
