//! End-to-end tests against the live mock tRPC endpoint.
//!
//! # Design
//! Starts the mock server on a random port and drives a `Tester` wired to the
//! real reqwest transport and a JSON file store, so encoding, cookies,
//! timeouts and persistence are all exercised over real HTTP. The last test
//! also serves the tester API itself and calls it with ureq, the way a front
//! end would.

use std::sync::Arc;

use mock_server::Echo;
use serde_json::{json, Value};
use trpc_tester_core::{
    decode_query, HttpMethod, TestRequest, Tester, TesterError, TrpcFormat,
};
use trpc_tester_server::{JsonFileStore, ReqwestTransport};

async fn spawn_mock() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}")
}

fn live_tester(dir: &tempfile::TempDir) -> Tester {
    let transport = Arc::new(ReqwestTransport::new().unwrap());
    let store = Arc::new(JsonFileStore::new(dir.path().join("config.json")));
    Tester::new(transport, store)
}

fn echo_of(response: &str) -> Echo {
    let json: Value = serde_json::from_str(response).unwrap();
    serde_json::from_value(json["result"]["data"].clone()).unwrap()
}

#[tokio::test]
async fn every_format_reaches_the_server_intact() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&format!("{base}/")).await;

    let payload = json!({"a": 1, "b": "x"});
    for format in TrpcFormat::ALL {
        tester.set_trpc_format(format.as_str()).await;

        let post = tester
            .run_test(TestRequest::new("api/trpc/users.get", payload.clone(), HttpMethod::Post))
            .await
            .unwrap();
        assert_eq!(post.status_code, 200, "{format}");
        let echo = echo_of(&post.response);
        assert_eq!(echo.method, "POST");
        assert_eq!(echo.body.as_ref(), post.sent_body.as_ref(), "{format}");
        assert_eq!(echo.content_type.as_deref(), Some("application/json"));

        let get = tester
            .run_test(TestRequest::new("api/trpc/users.get", payload.clone(), HttpMethod::Get))
            .await
            .unwrap();
        let echo = echo_of(&get.response);
        assert_eq!(echo.method, "GET");
        assert_eq!(echo.query, get.sent_query_params, "{format}");
        let query = echo.query.unwrap();
        assert_eq!(decode_query(&query, format), Some(payload.clone()), "{format}");
    }
}

#[tokio::test]
async fn configured_and_server_cookies_are_sent() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;
    tester.set_auth_cookie(Some("sid=abc123; Path=/; HttpOnly".to_string())).await;

    let result = tester
        .run_test(TestRequest::new("api/trpc/users.get", json!({}), HttpMethod::Post))
        .await
        .unwrap();
    let cookie = echo_of(&result.response).cookie.unwrap();
    assert!(cookie.contains("sid=abc123"), "{cookie}");

    let login = tester
        .run_test(TestRequest::new("login", json!({}), HttpMethod::Post))
        .await
        .unwrap();
    assert_eq!(login.status_code, 204);
    assert!(login.headers["set-cookie"].starts_with("mock_session=granted"));

    let result = tester
        .run_test(TestRequest::new("api/trpc/users.get", json!({}), HttpMethod::Post))
        .await
        .unwrap();
    let cookie = echo_of(&result.response).cookie.unwrap();
    assert!(cookie.contains("mock_session=granted"), "{cookie}");
    assert!(cookie.contains("sid=abc123"), "{cookie}");
}

async fn echoed_cookie(tester: &Tester) -> Option<String> {
    let result = tester
        .run_test(TestRequest::new("api/trpc/users.get", json!({}), HttpMethod::Post))
        .await
        .unwrap();
    echo_of(&result.response).cookie
}

#[tokio::test]
async fn replaced_or_cleared_cookie_is_no_longer_sent() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    tester.set_auth_cookie(Some("sid=abc123".to_string())).await;
    assert_eq!(echoed_cookie(&tester).await.as_deref(), Some("sid=abc123"));

    tester.set_auth_cookie(Some("malformed".to_string())).await;
    assert!(tester.session_cookie().await.is_none());
    assert_eq!(echoed_cookie(&tester).await, None);

    tester.set_auth_cookie(Some("sid=abc123".to_string())).await;
    tester.set_auth_cookie(None).await;
    assert_eq!(echoed_cookie(&tester).await, None);

    tester.set_auth_cookie(Some("token=t1".to_string())).await;
    assert_eq!(echoed_cookie(&tester).await.as_deref(), Some("token=t1"));

    tester.set_auth_cookie(Some("token=t2".to_string())).await;
    assert_eq!(echoed_cookie(&tester).await.as_deref(), Some("token=t2"));
}

#[tokio::test]
async fn server_cookie_with_configured_name_is_overridden() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    tester
        .run_test(TestRequest::new("login", json!({}), HttpMethod::Post))
        .await
        .unwrap();
    tester.set_auth_cookie(Some("mock_session=mine".to_string())).await;

    assert_eq!(echoed_cookie(&tester).await.as_deref(), Some("mock_session=mine"));
}

#[tokio::test]
async fn https_to_a_plain_http_server_is_a_tls_error() {
    let base = spawn_mock().await.replacen("http://", "https://", 1);
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    for verify in [true, false] {
        tester.set_ssl_verify(verify).await;
        let err = tester
            .run_test(TestRequest::new("api/trpc/users.get", json!({}), HttpMethod::Post))
            .await
            .unwrap_err();
        assert!(matches!(err, TesterError::Tls { .. }), "verify={verify}: {err}");
        assert!(err.to_string().starts_with("SSL Error: "));
    }

    let err = tester.fetch_procedure_list().await.unwrap_err();
    assert!(matches!(err, TesterError::Tls { .. }), "{err}");
}

#[tokio::test]
async fn non_2xx_is_a_result_not_an_error() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    let result = tester
        .run_test(TestRequest::new("api/trpc/missing.proc", json!({"a": 1}), HttpMethod::Post))
        .await
        .unwrap();
    assert_eq!(result.status_code, 404);
    assert!(result.response.contains("NOT_FOUND"));
}

#[tokio::test]
async fn discovery_lists_mock_procedures() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    let procedures = tester.fetch_procedure_list().await.unwrap();
    assert_eq!(procedures, json!(["users.get", "users.create", "posts.list"]));

    tester.set_base_url(&format!("{base}/nowhere")).await;
    let err = tester.fetch_procedure_list().await.unwrap_err();
    assert_eq!(err, TesterError::Discovery { status: 404 });
}

#[tokio::test]
async fn timeout_is_a_transport_error() {
    let base = spawn_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&base).await;

    let err = tester
        .run_test(TestRequest::new("slow", json!({}), HttpMethod::Get).with_timeout(1))
        .await
        .unwrap_err();
    assert!(matches!(err, TesterError::Transport { .. }), "{err}");
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let tester = live_tester(&dir);
    tester.set_base_url(&format!("http://127.0.0.1:{port}")).await;

    let err = tester
        .run_test(TestRequest::new("api/trpc/users.get", json!({}), HttpMethod::Post))
        .await
        .unwrap_err();
    assert!(matches!(err, TesterError::Transport { .. }), "{err}");
    assert!(err.to_string().starts_with("Request failed: "));
}

#[tokio::test]
async fn configuration_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let tester = live_tester(&dir);
        tester.set_base_url("https://api.test/").await;
        tester.set_trpc_format("legacy").await;
        tester.set_auth_cookie(Some("sid=1".to_string())).await;
    }

    let tester = live_tester(&dir);
    let config = tester.config().await;
    assert_eq!(config.base_url, "https://api.test");
    assert_eq!(config.trpc_format, TrpcFormat::Legacy);
    assert_eq!(tester.session_cookie().await.unwrap().to_string(), "sid=1");
}

/// POST a JSON body to the tester API with ureq and parse the JSON reply.
fn call(agent: &ureq::Agent, method: &str, url: &str, body: Option<Value>) -> (u16, Value) {
    let mut response = match (method, body) {
        ("POST", Some(body)) => agent
            .post(url)
            .content_type("application/json")
            .send(body.to_string().as_bytes()),
        ("POST", None) => agent.post(url).send_empty(),
        _ => agent.get(url).call(),
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string().unwrap_or_default();
    (status, serde_json::from_str(&text).unwrap())
}

#[test]
fn api_over_http() {
    // Step 1: start the mock endpoint and the tester API, each on a random port.
    let mock_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mock_addr = mock_listener.local_addr().unwrap();
    mock_listener.set_nonblocking(true).unwrap();

    let api_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let api_addr = api_listener.local_addr().unwrap();
    api_listener.set_nonblocking(true).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let mock = tokio::net::TcpListener::from_std(mock_listener).unwrap();
            tokio::spawn(mock_server::run(mock));

            let transport = Arc::new(ReqwestTransport::new().unwrap());
            let store = Arc::new(JsonFileStore::new(config_path));
            let tester = Arc::new(Tester::new(transport, store));
            let api = tokio::net::TcpListener::from_std(api_listener).unwrap();
            trpc_tester_server::run(api, tester).await
        })
        .unwrap();
    });

    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let api = format!("http://{api_addr}");

    // Step 2: health before configuration.
    let (status, health) = call(&agent, "GET", &format!("{api}/api/health"), None);
    assert_eq!(status, 200);
    assert_eq!(health, json!({"status": "healthy", "base_url": ""}));

    // Step 3: point the tester at the mock endpoint.
    let (_, ack) = call(
        &agent,
        "POST",
        &format!("{api}/api/config"),
        Some(json!({"base_url": format!("http://{mock_addr}/api/trpc/")})),
    );
    assert_eq!(ack["success"], true);
    let (_, ack) = call(
        &agent,
        "POST",
        &format!("{api}/api/test-settings"),
        Some(json!({"trpc_format": "batch"})),
    );
    assert_eq!(ack["success"], true);

    // Step 4: run a batch-format GET through the API.
    let (status, result) = call(
        &agent,
        "POST",
        &format!("{api}/api/test"),
        Some(json!({"procedure_path": "users.get", "input_data": {"id": 7}, "method": "GET"})),
    );
    assert_eq!(status, 200);
    assert_eq!(result["status_code"], 200);
    assert_eq!(result["method"], "GET");
    let echo = echo_of(result["response"].as_str().unwrap());
    assert_eq!(
        decode_query(echo.query.as_deref().unwrap(), TrpcFormat::Batch),
        Some(json!({"id": 7}))
    );

    // Step 5: a missing procedure path is rejected by the API.
    let (status, error) = call(&agent, "POST", &format!("{api}/api/test"), Some(json!({})));
    assert_eq!(status, 400);
    assert_eq!(error["error"], "Procedure path is required");

    // Step 6: reset and confirm the persisted file holds the defaults.
    let (_, ack) = call(&agent, "POST", &format!("{api}/api/reset"), None);
    assert_eq!(ack["message"], "Configuration reset to defaults");
    let (_, config) = call(&agent, "GET", &format!("{api}/api/config"), None);
    assert_eq!(config["base_url"], "");
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(saved, config);
}
