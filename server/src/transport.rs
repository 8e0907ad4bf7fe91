//! `Transport` implementation backed by reqwest.
//!
//! # Design
//! One session is two `reqwest::Client`s sharing a cookie jar: one verifies
//! certificates, one does not, and each request picks by its `verify_tls`
//! flag. Cookies set by servers land in the shared jar and are replayed on
//! later calls whichever client is used.
//!
//! The configured session cookie never enters the jar. Each request carries
//! one `Cookie` header merged from the jar's cookies for the URL, any
//! configured `Cookie` header and the session cookie, which wins over a
//! stored cookie of the same name. Replacing or clearing the session cookie
//! therefore takes effect on the next request.
//!
//! Resetting the session swaps in a fresh jar and fresh clients; requests
//! already in flight finish on the clients they started with.

use std::error::Error as StdError;
use std::io;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::COOKIE;
use reqwest::{Client, Method, Url};
use tracing::{debug, warn};
use trpc_tester_core::{
    FailureKind, HttpMethod, SessionCookie, Transport, TransportFailure, TransportRequest,
    TransportResponse,
};

#[derive(Clone)]
struct Session {
    jar: Arc<Jar>,
    verifying: Client,
    insecure: Client,
}

impl Session {
    fn build() -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        let verifying = Client::builder().cookie_provider(jar.clone()).build()?;
        let insecure = Client::builder()
            .cookie_provider(jar.clone())
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            jar,
            verifying,
            insecure,
        })
    }
}

pub struct ReqwestTransport {
    session: RwLock<Session>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            session: RwLock::new(Session::build()?),
        })
    }

    fn session(&self) -> Session {
        match self.session.read() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let session = self.session();
        let client = if request.verify_tls {
            &session.verifying
        } else {
            &session.insecure
        };

        let url = Url::parse(&request.url).map_err(|err| {
            TransportFailure::new(FailureKind::Other, format!("invalid URL '{}': {err}", request.url))
        })?;
        let stored = session.jar.cookies(&url);
        let configured = request
            .headers
            .iter()
            .filter(|(name, _)| is_cookie_header(name))
            .map(|(_, value)| value.as_str());
        let cookie = cookie_header(
            stored
                .as_ref()
                .and_then(|value| value.to_str().ok())
                .into_iter()
                .chain(configured),
            request.cookie.as_ref(),
        );

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = client.request(method, url).timeout(request.timeout);
        for (name, value) in request.headers.iter().filter(|(name, _)| !is_cookie_header(name)) {
            builder = builder.header(name, value);
        }
        // An explicit Cookie header stops reqwest from adding the jar's own.
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(classify)?;
        debug!(status, bytes = body.len(), "response read");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn reset_session(&self) {
        let fresh = match Session::build() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not rebuild HTTP session; keeping the old one");
                return;
            }
        };
        match self.session.write() {
            Ok(mut session) => *session = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

fn classify(err: reqwest::Error) -> TransportFailure {
    let kind = if is_tls_error(&err) {
        FailureKind::Tls
    } else if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connect
    } else {
        FailureKind::Other
    };
    TransportFailure::new(kind, error_chain(&err))
}

fn is_cookie_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(COOKIE.as_str())
}

/// Merge `stored` cookie headers and the session cookie into one header value.
///
/// Pairs are kept in order, except that a stored pair with the session
/// cookie's name is dropped and the session cookie goes last.
fn cookie_header<'a>(
    stored: impl IntoIterator<Item = &'a str>,
    session: Option<&SessionCookie>,
) -> Option<String> {
    let mut pairs: Vec<String> = stored
        .into_iter()
        .flat_map(|header| header.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let name = pair.split_once('=').map_or(*pair, |(name, _)| name).trim();
            session.map_or(true, |cookie| cookie.name != name)
        })
        .map(str::to_string)
        .collect();
    if let Some(cookie) = session {
        pairs.push(cookie.to_string());
    }
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Whether anything below the top-level error comes from the TLS layer.
///
/// rustls errors reach us wrapped in `io::Error`, whose `source` skips the
/// wrapped error, so each layer is also unwrapped by hand. The top-level
/// message is skipped because it contains the request URL.
fn is_tls_error(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if is_rustls_error(cause) || mentions_tls(&cause.to_string()) {
            return true;
        }
        source = cause.source();
    }
    false
}

fn is_rustls_error(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<rustls::Error>() {
        return true;
    }
    err.downcast_ref::<io::Error>()
        .and_then(io::Error::get_ref)
        .is_some_and(|inner| inner.is::<rustls::Error>())
}

fn mentions_tls(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    [
        "certificate",
        "handshake",
        "tls",
        "ssl",
        "corrupt message",
        "alert",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
