//! Transport-facing HTTP types and the `Transport` port.
//!
//! # Design
//! Requests and responses are plain data. The core builds a
//! `TransportRequest` with the exact body or query string it wants on the
//! wire and hands it to whatever `Transport` the host injected. The host owns
//! connections, TLS and the cookie jar; the core only classifies what came
//! back.
//!
//! All fields use owned types so requests can be logged, recorded by test
//! doubles and moved across tasks without lifetime concerns.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cookie::SessionCookie;

/// HTTP method for a test call.
///
/// Only GET is recognised by name; anything else is sent as POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl HttpMethod {
    /// Case-insensitive parse. Unknown methods fall back to POST.
    pub fn parse(method: &str) -> Self {
        if method.trim().eq_ignore_ascii_case("GET") {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for HttpMethod {
    fn from(method: String) -> Self {
        HttpMethod::parse(&method)
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// A fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL, including any encoded query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body for POST; `None` for GET.
    pub body: Option<String>,
    /// Session cookie to present for this URL, if one is configured.
    pub cookie: Option<SessionCookie>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

/// A response as returned by the transport, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Broad classification of a failed round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Certificate validation or TLS handshake failed.
    Tls,
    /// The per-call timeout elapsed.
    Timeout,
    /// DNS resolution or TCP connect failed.
    Connect,
    Other,
}

/// A transport-level failure. No HTTP response was received.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Executes `TransportRequest`s on behalf of a `Tester`.
///
/// Implementations keep one session (connection pool and cookie jar) alive
/// across calls. They must not retry on their own; a failed call is reported
/// straight back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure>;

    /// Drop all session state (cookies received from servers included).
    fn reset_session(&self) {}
}
