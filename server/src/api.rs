//! JSON API over a shared `Tester`.
//!
//! Failed operations are answered with HTTP 200 and an `{"error": ...}` body;
//! only a request that is missing its procedure path gets a 400.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;
use trpc_tester_core::{
    ConfigUpdate, HealthStatus, HttpMethod, TestRequest, TestSettings, TestSettingsUpdate, Tester,
    TesterConfig,
};

pub type SharedTester = Arc<Tester>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RunTestBody {
    #[serde(default)]
    pub procedure_path: String,
    #[serde(default = "empty_object")]
    pub input_data: Value,
    #[serde(default)]
    pub method: Option<String>,
    /// Falls back to the configured timeout when absent.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn empty_object() -> Value {
    json!({})
}

pub fn app(tester: SharedTester) -> Router {
    Router::new()
        .route("/api/config", get(get_config).post(update_config))
        .route(
            "/api/test-settings",
            get(get_test_settings).post(update_test_settings),
        )
        .route("/api/test", post(run_test))
        .route("/api/procedures", get(procedures))
        .route("/api/health", get(health))
        .route("/api/reset", post(reset))
        .with_state(tester)
}

pub async fn run(listener: TcpListener, tester: SharedTester) -> Result<(), std::io::Error> {
    axum::serve(listener, app(tester)).await
}

async fn get_config(State(tester): State<SharedTester>) -> Json<TesterConfig> {
    Json(tester.config().await)
}

async fn update_config(
    State(tester): State<SharedTester>,
    Json(update): Json<ConfigUpdate>,
) -> Json<Ack> {
    tester.update_config(update).await;
    Ack::ok("Configuration updated")
}

async fn get_test_settings(State(tester): State<SharedTester>) -> Json<TestSettings> {
    Json(tester.test_settings().await)
}

async fn update_test_settings(
    State(tester): State<SharedTester>,
    Json(update): Json<TestSettingsUpdate>,
) -> Json<Ack> {
    tester.update_test_settings(update).await;
    Ack::ok("Test settings updated")
}

async fn run_test(State(tester): State<SharedTester>, Json(body): Json<RunTestBody>) -> Response {
    if body.procedure_path.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Procedure path is required"})),
        )
            .into_response();
    }
    let method = body
        .method
        .as_deref()
        .map(HttpMethod::parse)
        .unwrap_or_default();
    let request = TestRequest {
        procedure_path: body.procedure_path,
        input: body.input_data,
        method,
        timeout: body.timeout,
    };
    match tester.run_test(request).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => Json(json!({"error": err.to_string()})).into_response(),
    }
}

async fn procedures(State(tester): State<SharedTester>) -> Json<Value> {
    match tester.fetch_procedure_list().await {
        Ok(procedures) => Json(json!({"procedures": procedures})),
        Err(err) => Json(json!({"error": err.to_string()})),
    }
}

async fn health(State(tester): State<SharedTester>) -> Json<HealthStatus> {
    Json(tester.health_check().await)
}

async fn reset(State(tester): State<SharedTester>) -> Json<Ack> {
    tester.reset_config().await;
    info!("configuration reset through the API");
    Ack::ok("Configuration reset to defaults")
}
