use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};

pub const PROCEDURES: [&str; 3] = ["users.get", "users.create", "posts.list"];

/// What the mock saw for one procedure call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub procedure: String,
    pub query: Option<String>,
    pub body: Option<Value>,
    pub cookie: Option<String>,
    pub content_type: Option<String>,
}

pub type Log = Arc<RwLock<Vec<Echo>>>;

pub fn app() -> Router {
    let log: Log = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/api/trpc", get(list_procedures))
        .route("/api/trpc/{procedure}", any(call_procedure))
        .route("/login", post(login))
        .route("/status/{code}", any(fixed_status))
        .route("/slow", any(slow))
        .route("/_requests", get(received))
        .with_state(log)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_procedures() -> Json<Vec<&'static str>> {
    Json(PROCEDURES.to_vec())
}

async fn call_procedure(
    State(log): State<Log>,
    Path(procedure): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !PROCEDURES.contains(&procedure.as_str()) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": {"code": "NOT_FOUND", "path": procedure}})),
        )
            .into_response();
    }
    let body = if body.is_empty() {
        None
    } else {
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
    };
    let echo = Echo {
        method: method.to_string(),
        procedure,
        query,
        body,
        cookie: header_text(&headers, header::COOKIE),
        content_type: header_text(&headers, header::CONTENT_TYPE),
    };
    log.write().await.push(echo.clone());
    Json(serde_json::json!({"result": {"data": echo}})).into_response()
}

async fn login() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, "mock_session=granted; Path=/")],
    )
}

async fn fixed_status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "finally"
}

async fn received(State(log): State<Log>) -> Json<Vec<Echo>> {
    Json(log.read().await.clone())
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
