//! Host for the tRPC endpoint tester.
//!
//! # Overview
//! Supplies the I/O the core leaves out: a reqwest-backed `Transport`, a
//! JSON-file `ConfigStore`, and an axum JSON API that exposes the `Tester`
//! operations to a front end.
//!
//! # Design
//! - The binary is the composition root: it reads `HostSettings`, installs
//!   the tracing subscriber, builds one `Tester` and serves it.
//! - Nothing in this crate decides how a request is encoded; that stays in
//!   `trpc-tester-core`.

pub mod api;
pub mod settings;
pub mod store;
pub mod transport;

pub use api::{app, run, SharedTester};
pub use settings::HostSettings;
pub use store::JsonFileStore;
pub use transport::ReqwestTransport;
