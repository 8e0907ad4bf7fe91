//! Error types for the tester core.
//!
//! # Design
//! None of these are fatal. `TesterError` is what the host reports back to
//! the operator; `StoreError` never leaves the core because persistence
//! failures are only logged.

use thiserror::Error;

use crate::http::{FailureKind, TransportFailure};

/// Errors returned by `Tester` operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TesterError {
    /// A precondition on the configuration is not met (e.g. no base URL).
    #[error("{0}")]
    Config(String),

    /// Certificate validation failed.
    #[error("SSL Error: {message}. Try enabling 'Disable SSL Verification' in settings.")]
    Tls { message: String },

    /// Connection, DNS or timeout failure. No response was received.
    #[error("Request failed: {message}")]
    Transport { message: String },

    /// The discovery endpoint answered with a non-200 status.
    #[error("Failed to get procedures: {status}")]
    Discovery { status: u16 },
}

impl TesterError {
    pub(crate) fn missing_base_url() -> Self {
        TesterError::Config("Base URL not set".to_string())
    }
}

impl From<TransportFailure> for TesterError {
    fn from(failure: TransportFailure) -> Self {
        match failure.kind {
            FailureKind::Tls => TesterError::Tls {
                message: failure.message,
            },
            FailureKind::Timeout | FailureKind::Connect | FailureKind::Other => {
                TesterError::Transport {
                    message: failure.message,
                }
            }
        }
    }
}

/// Errors raised by `ConfigStore` implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
