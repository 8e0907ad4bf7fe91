//! Request envelopes for the five tRPC wire conventions.
//!
//! # Design
//! Servers built on different tRPC versions and transport middlewares expect
//! the same logical input wrapped in different envelopes. Everything here is
//! a pure function of `(payload, format, procedure_path)` so the same
//! envelope can be produced for a request, shown back to the operator, and
//! decoded again in tests.
//!
//! | format   | POST body                                 |
//! |----------|-------------------------------------------|
//! | standard | `payload`                                 |
//! | json     | `{"json": payload}`                       |
//! | modern   | `{"input": payload}`                      |
//! | legacy   | `{"0": {"json": payload}}`                |
//! | batch    | `[{"path": procedure_path, "input": payload}]` |
//!
//! GET requests carry the same envelope, serialized compactly and
//! form-encoded into a single `input` parameter. `standard` is the exception:
//! its payload fields become query parameters directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::form_urlencoded;

use crate::http::HttpMethod;

/// The envelope convention applied to a payload before transmission.
///
/// Parsing is case-sensitive and never fails: any unrecognised name selects
/// `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrpcFormat {
    #[default]
    Standard,
    Json,
    Modern,
    Legacy,
    Batch,
}

impl TrpcFormat {
    pub const ALL: [TrpcFormat; 5] = [
        TrpcFormat::Standard,
        TrpcFormat::Json,
        TrpcFormat::Modern,
        TrpcFormat::Legacy,
        TrpcFormat::Batch,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "json" => TrpcFormat::Json,
            "modern" => TrpcFormat::Modern,
            "legacy" => TrpcFormat::Legacy,
            "batch" => TrpcFormat::Batch,
            _ => TrpcFormat::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrpcFormat::Standard => "standard",
            TrpcFormat::Json => "json",
            TrpcFormat::Modern => "modern",
            TrpcFormat::Legacy => "legacy",
            TrpcFormat::Batch => "batch",
        }
    }
}

impl fmt::Display for TrpcFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TrpcFormat {
    fn from(name: String) -> Self {
        TrpcFormat::parse(&name)
    }
}

impl From<TrpcFormat> for String {
    fn from(format: TrpcFormat) -> Self {
        format.as_str().to_string()
    }
}

/// Wire representation of a test call.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedRequest {
    /// GET: query string without the leading `?`, or `None` for a bare URL.
    Query(Option<String>),
    /// POST: JSON body.
    Body(Value),
}

/// Encode a payload for the given method.
pub fn encode_request(
    payload: &Value,
    format: TrpcFormat,
    procedure_path: &str,
    method: HttpMethod,
) -> EncodedRequest {
    match method {
        HttpMethod::Get => EncodedRequest::Query(encode_query(payload, format, procedure_path)),
        HttpMethod::Post => EncodedRequest::Body(encode_body(payload, format, procedure_path)),
    }
}

/// Build the POST body for `payload`.
///
/// A missing, empty or non-object payload becomes `{}`, except for `batch`,
/// which wraps whatever it is given.
pub fn encode_body(payload: &Value, format: TrpcFormat, procedure_path: &str) -> Value {
    match format {
        TrpcFormat::Batch => json!([{ "path": procedure_path, "input": payload }]),
        _ if !is_populated_object(payload) => Value::Object(Map::new()),
        TrpcFormat::Standard => payload.clone(),
        TrpcFormat::Json => json!({ "json": payload }),
        TrpcFormat::Modern => json!({ "input": payload }),
        TrpcFormat::Legacy => json!({ "0": { "json": payload } }),
    }
}

/// Build the GET query string for `payload`, without the leading `?`.
///
/// Returns `None` when there is nothing to send, in which case the procedure
/// URL is requested bare.
pub fn encode_query(payload: &Value, format: TrpcFormat, procedure_path: &str) -> Option<String> {
    if is_empty_payload(payload) {
        return None;
    }
    match format {
        TrpcFormat::Standard => {
            let fields = payload.as_object()?;
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in fields {
                serializer.append_pair(key, &query_value(value));
            }
            Some(serializer.finish())
        }
        TrpcFormat::Batch => Some(input_param(&encode_body(payload, format, procedure_path))),
        TrpcFormat::Json | TrpcFormat::Modern | TrpcFormat::Legacy => {
            if !payload.is_object() {
                return None;
            }
            Some(input_param(&encode_body(payload, format, procedure_path)))
        }
    }
}

/// Strip the envelope from a POST body, returning the original payload.
pub fn decode_body(body: &Value, format: TrpcFormat) -> Option<Value> {
    match format {
        TrpcFormat::Standard => Some(body.clone()),
        TrpcFormat::Json => body.get("json").cloned(),
        TrpcFormat::Modern => body.get("input").cloned(),
        TrpcFormat::Legacy => body.get("0")?.get("json").cloned(),
        TrpcFormat::Batch => body.get(0)?.get("input").cloned(),
    }
}

/// Recover the payload from a query string produced by [`encode_query`].
///
/// `standard` parameters come back as JSON where the text parses as JSON and
/// as strings otherwise, so a string field holding `"1"` reads back as `1`.
pub fn decode_query(query: &str, format: TrpcFormat) -> Option<Value> {
    let mut pairs = form_urlencoded::parse(query.trim_start_matches('?').as_bytes());
    match format {
        TrpcFormat::Standard => {
            let fields: Map<String, Value> = pairs
                .map(|(key, value)| (key.into_owned(), parse_query_value(&value)))
                .collect();
            if fields.is_empty() {
                None
            } else {
                Some(Value::Object(fields))
            }
        }
        _ => {
            let (_, raw) = pairs.find(|(key, _)| key == "input")?;
            let envelope: Value = serde_json::from_str(&raw).ok()?;
            decode_body(&envelope, format)
        }
    }
}

fn is_populated_object(payload: &Value) -> bool {
    payload.as_object().is_some_and(|fields| !fields.is_empty())
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn input_param(envelope: &Value) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("input", &envelope.to_string())
        .finish()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_query_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
