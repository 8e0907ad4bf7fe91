//! `ConfigStore` that keeps the record in a pretty-printed JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use trpc_tester_core::{ConfigStore, StoreError, TesterConfig};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    /// A missing file is a first run, not an error.
    fn load(&self) -> Result<Option<TesterConfig>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn save(&self, config: &TesterConfig) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, text).await?;
        debug!(path = %self.path.display(), "configuration written");
        Ok(())
    }
}
