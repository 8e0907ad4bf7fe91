//! The persisted tester configuration and its partial-update shapes.
//!
//! # Design
//! `TesterConfig` is both the in-memory state and the on-disk record, so the
//! serde field names are the record's field names. Every field has a default
//! and missing fields in a stored record are filled in, which lets older or
//! hand-written config files load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoder::TrpcFormat;
use crate::http::HttpMethod;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Connection settings plus the saved test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// Never ends with `/`.
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub ssl_verify: bool,
    pub auth_cookie: Option<String>,
    pub test_procedure_path: String,
    pub test_http_method: HttpMethod,
    pub test_input_data: Value,
    pub test_timeout: u64,
    pub trpc_format: TrpcFormat,
    /// UI field descriptors, stored and returned untouched.
    pub form_fields: Vec<Value>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: default_headers(),
            ssl_verify: false,
            auth_cookie: None,
            test_procedure_path: String::new(),
            test_http_method: HttpMethod::Post,
            test_input_data: Value::Null,
            test_timeout: DEFAULT_TIMEOUT_SECS,
            trpc_format: TrpcFormat::Standard,
            form_fields: Vec::new(),
        }
    }
}

impl TesterConfig {
    /// Restore the invariants a hand-edited record may have broken.
    pub fn normalized(mut self) -> Self {
        self.base_url = normalize_base_url(&self.base_url);
        if self.test_timeout == 0 {
            self.test_timeout = DEFAULT_TIMEOUT_SECS;
        }
        self
    }

    /// Headers to send: the configured ones, or the JSON content type when
    /// none are configured.
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        if self.headers.is_empty() {
            default_headers()
        } else {
            self.headers.clone()
        }
    }

    pub fn test_settings(&self) -> TestSettings {
        TestSettings {
            procedure_path: self.test_procedure_path.clone(),
            http_method: self.test_http_method,
            input_data: self.test_input_data.clone(),
            timeout: self.test_timeout,
            trpc_format: self.trpc_format,
            form_fields: self.form_fields.clone(),
        }
    }
}

/// The saved test case, as presented to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSettings {
    pub procedure_path: String,
    pub http_method: HttpMethod,
    pub input_data: Value,
    pub timeout: u64,
    pub trpc_format: TrpcFormat,
    pub form_fields: Vec<Value>,
}

/// Partial update of the connection settings. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub base_url: Option<String>,
    /// Merged into the existing headers.
    pub headers: Option<BTreeMap<String, String>>,
    pub ssl_verify: Option<bool>,
    /// `Some(None)` clears the cookie.
    #[serde(default, deserialize_with = "present")]
    pub auth_cookie: Option<Option<String>>,
}

/// Partial update of the saved test case. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestSettingsUpdate {
    pub procedure_path: Option<String>,
    pub http_method: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub input_data: Option<Value>,
    pub timeout: Option<u64>,
    pub trpc_format: Option<String>,
    pub form_fields: Option<Vec<Value>>,
}

/// Distinguish an explicit `null` from a missing field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string())])
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Join a base URL and a procedure path with exactly one `/` between them.
pub fn join_url(base_url: &str, procedure_path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        procedure_path.trim_start_matches('/')
    )
}
