//! Inputs and outputs of tester operations.
//!
//! # Design
//! Field names match the JSON the operator sees, so hosts can serialize these
//! directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoder::TrpcFormat;
use crate::http::HttpMethod;

/// One test call.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRequest {
    pub procedure_path: String,
    pub input: Value,
    pub method: HttpMethod,
    /// Per-call timeout in seconds; `None` uses the configured default.
    pub timeout: Option<u64>,
}

impl TestRequest {
    pub fn new(procedure_path: impl Into<String>, input: Value, method: HttpMethod) -> Self {
        Self {
            procedure_path: procedure_path.into(),
            input,
            method,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

/// Everything the server answered plus exactly what was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub response: String,
    pub url: String,
    pub method: HttpMethod,
    /// POST only.
    pub sent_body: Option<Value>,
    /// GET only, without the leading `?`.
    pub sent_query_params: Option<String>,
    pub debug_info: DebugInfo,
}

/// Echo of the inputs that produced a `TestResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub input_data_received: Value,
    pub trpc_format_used: TrpcFormat,
    pub final_url: String,
    pub request_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub base_url: String,
}
