#![allow(dead_code)]

use std::{io::ErrorKind, net::SocketAddr, path::Path};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const TEST_KEY: &str = "sk-test";

/// Listing served by the fake gateway and written to snapshot files.
pub fn catalog_json() -> Value {
    json!({
        "data": [
            {"id": "zeta/model", "pricing": {"prompt": "0.000003", "completion": "0.000004"}},
            {"id": "openai/gpt-4o", "description": "Flagship omni model",
             "pricing": {"prompt": "0.0000025", "completion": "0.00001"}},
            {"id": "openai/gpt-4o-mini", "description": "",
             "pricing": {"prompt": "0.000001", "completion": "0.000002"}}
        ]
    })
}

pub fn write_snapshot(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("models.json");
    std::fs::write(&path, catalog_json().to_string()).expect("write snapshot");
    path
}

pub fn write_config(dir: &Path, addr: SocketAddr) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(
        &path,
        format!(
            "gateway:\n  base_url: http://{addr}/api/v1\ndefaults:\n  model: openai/gpt-4o-mini\n  temperature: 0.5\n"
        ),
    )
    .expect("write config");
    path
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_KEY}"))
}

/// Echoes the last message with an inline math span; model `fail/500` answers 500.
async fn fake_chat(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["model"] == "fail/500" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let last = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": format!("echo {last} \\(x\\)")}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

async fn fake_models(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(catalog_json()).into_response()
}

/// Binds a fake OpenRouter-style gateway on an ephemeral port. `None` when the
/// sandbox forbids binding sockets.
pub async fn spawn_fake_gateway() -> anyhow::Result<Option<SocketAddr>> {
    let listener = match TcpListener::bind(("127.0.0.1", 0)).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            eprintln!("skipping: cannot bind fake gateway: {e}");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let addr = listener.local_addr()?;
    let router = Router::new()
        .route("/api/v1/chat/completions", post(fake_chat))
        .route("/api/v1/models", get(fake_models));
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            eprintln!("fake gateway exited: {err:?}");
        }
    });
    Ok(Some(addr))
}
