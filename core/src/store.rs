//! The `ConfigStore` port and an in-memory implementation.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::TesterConfig;
use crate::error::StoreError;

/// Durable storage for a `TesterConfig` record.
///
/// `load` returns `Ok(None)` when nothing has been saved yet; that is the
/// normal first-run case, not an error. It runs once, while the `Tester` is
/// built. `save` runs on the async runtime for every change, so file-backed
/// stores must do their I/O asynchronously.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Option<TesterConfig>, StoreError>;
    async fn save(&self, config: &TesterConfig) -> Result<(), StoreError>;
}

/// Keeps the record in memory. Useful for tests and for hosts that do not
/// persist anything.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<TesterConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(config: TesterConfig) -> Self {
        Self {
            record: Mutex::new(Some(config)),
        }
    }

    /// The last saved record.
    pub fn record(&self) -> Option<TesterConfig> {
        self.record.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Option<TesterConfig>, StoreError> {
        Ok(self.record())
    }

    async fn save(&self, config: &TesterConfig) -> Result<(), StoreError> {
        if let Ok(mut guard) = self.record.lock() {
            *guard = Some(config.clone());
        }
        Ok(())
    }
}
