//! The `Tester` service: configuration state plus test execution.
//!
//! # Design
//! A `Tester` is constructed explicitly with the transport and store it
//! should use, so several independent testers can live in one process. Its
//! mutable state (configuration and the session cookie derived from it) sits
//! behind one async `RwLock`:
//!
//! - requests take a snapshot under the read lock and release it before
//!   awaiting the transport, so a slow endpoint never blocks configuration
//!   changes;
//! - setters take the write lock, mutate one field and persist the full
//!   record before releasing it, so saves land in the order the changes
//!   were made.
//!
//! Persistence failures are logged and otherwise ignored: the in-memory
//! configuration stays authoritative for the life of the process.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{
    default_headers, join_url, normalize_base_url, ConfigUpdate, TestSettings, TestSettingsUpdate,
    TesterConfig, CONTENT_TYPE, DEFAULT_TIMEOUT_SECS, JSON_CONTENT_TYPE,
};
use crate::cookie::SessionCookie;
use crate::encoder::{encode_request, EncodedRequest, TrpcFormat};
use crate::error::TesterError;
use crate::http::{HttpMethod, Transport, TransportRequest, TransportResponse};
use crate::store::ConfigStore;
use crate::types::{DebugInfo, HealthStatus, TestRequest, TestResult};

/// Discovery endpoint, relative to the base URL.
pub const DISCOVERY_PATH: &str = "api/trpc";
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Session {
    config: TesterConfig,
    cookie: Option<SessionCookie>,
}

impl Session {
    fn from_config(config: TesterConfig) -> Self {
        let cookie = config.auth_cookie.as_deref().and_then(SessionCookie::parse);
        Self { config, cookie }
    }
}

pub struct Tester {
    transport: Arc<dyn Transport>,
    store: Arc<dyn ConfigStore>,
    session: RwLock<Session>,
}

impl Tester {
    /// Build a tester from whatever `store` holds, falling back to defaults
    /// when it is empty or unreadable.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn ConfigStore>) -> Self {
        let config = match store.load() {
            Ok(Some(config)) => {
                info!(base_url = %config.base_url, "configuration loaded");
                config.normalized()
            }
            Ok(None) => TesterConfig::default(),
            Err(err) => {
                warn!(error = %err, "could not load configuration, using defaults");
                TesterConfig::default()
            }
        };
        Self {
            transport,
            store,
            session: RwLock::new(Session::from_config(config)),
        }
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub async fn config(&self) -> TesterConfig {
        self.session.read().await.config.clone()
    }

    pub async fn test_settings(&self) -> TestSettings {
        self.session.read().await.config.test_settings()
    }

    /// The cookie currently presented with every request.
    pub async fn session_cookie(&self) -> Option<SessionCookie> {
        self.session.read().await.cookie.clone()
    }

    pub async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            base_url: self.session.read().await.config.base_url.clone(),
        }
    }

    /// Apply each present field through its setter.
    pub async fn update_config(&self, update: ConfigUpdate) {
        if let Some(base_url) = update.base_url {
            self.set_base_url(&base_url).await;
        }
        if let Some(headers) = update.headers {
            self.set_headers(headers).await;
        }
        if let Some(ssl_verify) = update.ssl_verify {
            self.set_ssl_verify(ssl_verify).await;
        }
        if let Some(auth_cookie) = update.auth_cookie {
            self.set_auth_cookie(auth_cookie).await;
        }
    }

    pub async fn update_test_settings(&self, update: TestSettingsUpdate) {
        if let Some(path) = update.procedure_path {
            self.set_test_procedure_path(path).await;
        }
        if let Some(method) = update.http_method {
            self.set_test_http_method(&method).await;
        }
        if let Some(input) = update.input_data {
            self.set_test_input_data(input).await;
        }
        if let Some(timeout) = update.timeout {
            self.set_test_timeout(timeout).await;
        }
        if let Some(format) = update.trpc_format {
            self.set_trpc_format(&format).await;
        }
        if let Some(fields) = update.form_fields {
            self.set_form_fields(fields).await;
        }
    }

    /// Store the base URL without trailing slashes. Seeds the default
    /// `Content-Type` header if no headers are configured yet.
    pub async fn set_base_url(&self, url: &str) {
        self.mutate(|session| {
            session.config.base_url = normalize_base_url(url);
            if session.config.headers.is_empty() {
                session.config.headers = default_headers();
            }
        })
        .await;
    }

    /// Merge `headers` into the configured headers.
    pub async fn set_headers(&self, headers: BTreeMap<String, String>) {
        self.mutate(|session| session.config.headers.extend(headers)).await;
    }

    pub async fn set_ssl_verify(&self, verify: bool) {
        self.mutate(|session| session.config.ssl_verify = verify).await;
    }

    /// Store the raw cookie and replace the session cookie with its leading
    /// `name=value` pair. A cookie without `=` is kept in the configuration
    /// but leaves the session without a cookie.
    pub async fn set_auth_cookie(&self, cookie: Option<String>) {
        self.mutate(|session| {
            session.cookie = cookie.as_deref().and_then(SessionCookie::parse);
            if cookie.is_some() && session.cookie.is_none() {
                debug!("auth cookie has no name=value pair; no session cookie installed");
            }
            session.config.auth_cookie = cookie;
        })
        .await;
    }

    pub async fn set_test_procedure_path(&self, path: String) {
        self.mutate(|session| session.config.test_procedure_path = path).await;
    }

    pub async fn set_test_http_method(&self, method: &str) {
        let method = HttpMethod::parse(method);
        self.mutate(|session| session.config.test_http_method = method).await;
    }

    pub async fn set_test_input_data(&self, input: Value) {
        self.mutate(|session| session.config.test_input_data = input).await;
    }

    /// Zero restores the default timeout.
    pub async fn set_test_timeout(&self, seconds: u64) {
        let seconds = if seconds == 0 { DEFAULT_TIMEOUT_SECS } else { seconds };
        self.mutate(|session| session.config.test_timeout = seconds).await;
    }

    pub async fn set_trpc_format(&self, name: &str) {
        let format = TrpcFormat::parse(name);
        info!(requested = name, format = %format, "request format changed");
        self.mutate(|session| session.config.trpc_format = format).await;
    }

    pub async fn set_form_fields(&self, fields: Vec<Value>) {
        self.mutate(|session| session.config.form_fields = fields).await;
    }

    /// Restore defaults, drop all session state and persist.
    pub async fn reset_config(&self) {
        let mut session = self.session.write().await;
        *session = Session::default();
        self.transport.reset_session();
        self.persist(&session.config).await;
        info!("configuration reset to defaults");
    }

    async fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.session.write().await;
        apply(&mut session);
        self.persist(&session.config).await;
    }

    async fn persist(&self, config: &TesterConfig) {
        match self.store.save(config).await {
            Ok(()) => debug!("configuration saved"),
            Err(err) => warn!(error = %err, "could not save configuration"),
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Encode `request` with the configured format and send it.
    pub async fn run_test(&self, request: TestRequest) -> Result<TestResult, TesterError> {
        let (config, cookie) = self.snapshot().await;
        if config.base_url.is_empty() {
            return Err(TesterError::missing_base_url());
        }

        let format = config.trpc_format;
        let mut url = join_url(&config.base_url, &request.procedure_path);
        let mut headers = config.effective_headers();

        let (sent_body, sent_query_params, body) =
            match encode_request(&request.input, format, &request.procedure_path, request.method) {
                EncodedRequest::Query(query) => {
                    if let Some(query) = &query {
                        url.push('?');
                        url.push_str(query);
                    }
                    (None, query, None)
                }
                EncodedRequest::Body(body) => {
                    if !has_header(&headers, CONTENT_TYPE) {
                        headers.insert(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string());
                    }
                    let text = body.to_string();
                    (Some(body), None, Some(text))
                }
            };

        let seconds = request
            .timeout
            .filter(|seconds| *seconds > 0)
            .unwrap_or(config.test_timeout);

        debug!(method = %request.method, %url, %format, timeout_secs = seconds, "sending test request");

        let response = self
            .transport
            .send(TransportRequest {
                method: request.method,
                url: url.clone(),
                headers: header_pairs(&headers),
                body,
                cookie,
                timeout: Duration::from_secs(seconds),
                verify_tls: config.ssl_verify,
            })
            .await
            .inspect_err(|failure| warn!(%url, error = %failure, "test request failed"))?;

        debug!(status = response.status, "test response received");

        Ok(TestResult {
            status_code: response.status,
            headers: header_map(&response),
            response: response.body,
            url: url.clone(),
            method: request.method,
            sent_body,
            sent_query_params,
            debug_info: DebugInfo {
                input_data_received: request.input,
                trpc_format_used: format,
                final_url: url,
                request_headers: headers,
            },
        })
    }

    /// Ask the discovery endpoint for the procedure list.
    ///
    /// Servers are not required to support this. A body that is not JSON is
    /// returned as a JSON string.
    pub async fn fetch_procedure_list(&self) -> Result<Value, TesterError> {
        let (config, cookie) = self.snapshot().await;
        if config.base_url.is_empty() {
            return Err(TesterError::missing_base_url());
        }

        let url = join_url(&config.base_url, DISCOVERY_PATH);
        let response = self
            .transport
            .send(TransportRequest {
                method: HttpMethod::Get,
                url: url.clone(),
                headers: header_pairs(&config.effective_headers()),
                body: None,
                cookie,
                timeout: DISCOVERY_TIMEOUT,
                verify_tls: config.ssl_verify,
            })
            .await
            .inspect_err(|failure| warn!(%url, error = %failure, "discovery request failed"))?;

        if response.status != 200 {
            return Err(TesterError::Discovery {
                status: response.status,
            });
        }
        Ok(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
    }

    async fn snapshot(&self) -> (TesterConfig, Option<SessionCookie>) {
        let session = self.session.read().await;
        (session.config.clone(), session.cookie.clone())
    }
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

fn header_pairs(headers: &BTreeMap<String, String>) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Collapse repeated response headers into one comma-separated value.
fn header_map(response: &TransportResponse) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &response.headers {
        map.entry(name.clone())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    map
}
