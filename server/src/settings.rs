//! Host settings read from the environment.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub host: String,
    pub port: u16,
    pub config_path: PathBuf,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            json_logs: false,
        }
    }
}

impl HostSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("TRPC_TESTER_HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            config_path: lookup("TRPC_TESTER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            json_logs: lookup("TRPC_TESTER_LOG_FORMAT").is_some_and(|format| format == "json"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
