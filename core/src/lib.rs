//! Core of the tRPC endpoint tester.
//!
//! # Overview
//! Encodes a logical input payload into one of five tRPC wire envelopes and
//! executes test calls against a configured endpoint. Network and disk access
//! are injected through the `Transport` and `ConfigStore` traits, so the core
//! itself performs no I/O and is fully testable with in-memory doubles.
//!
//! # Design
//! - `encoder` is a set of pure functions; it is safe to call from anywhere.
//! - `Tester` owns one configuration and one session. It is constructed
//!   explicitly and shared by the host (e.g. as `Arc<Tester>`).
//! - Every fallible operation returns `TesterError`; nothing here aborts the
//!   process.
//! - Diagnostics are emitted as `tracing` events; the host decides where they
//!   go.

pub mod config;
pub mod cookie;
pub mod encoder;
pub mod error;
pub mod http;
pub mod store;
pub mod tester;
pub mod types;

pub use config::{ConfigUpdate, TestSettings, TestSettingsUpdate, TesterConfig};
pub use cookie::SessionCookie;
pub use encoder::{decode_body, decode_query, encode_body, encode_query, encode_request, EncodedRequest, TrpcFormat};
pub use error::{StoreError, TesterError};
pub use http::{FailureKind, HttpMethod, Transport, TransportFailure, TransportRequest, TransportResponse};
pub use store::{ConfigStore, MemoryStore};
pub use tester::Tester;
pub use types::{DebugInfo, HealthStatus, TestRequest, TestResult};
