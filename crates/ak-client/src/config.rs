//! Client configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Action client configuration, usually read from `actionkit.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Longest single wait on the completion condition, in milliseconds.
    /// Blocked waiters check for shutdown at least this often.
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,

    /// How long to wait for the action server before giving up, in
    /// milliseconds. 0 waits forever.
    #[serde(default)]
    pub server_timeout_ms: u64,

    /// Append lifecycle events as JSON lines to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_log: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wait_slice_ms: default_wait_slice_ms(),
            server_timeout_ms: 0,
            events_log: None,
        }
    }
}

fn default_wait_slice_ms() -> u64 {
    100
}

impl ClientConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path).map_err(|source| ClientError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ClientError::ConfigError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Try to load config, returning the default if the file is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ClientError::IoError { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => {
                tracing::warn!("ignoring config: {}", e);
                Self::default()
            }
        }
    }

    /// The wait slice as a duration, never shorter than one millisecond.
    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice_ms.max(1))
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.server_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.wait_slice(), Duration::from_millis(100));
        assert_eq!(config.server_timeout(), Duration::ZERO);
        assert!(config.events_log.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actionkit.toml");
        std::fs::write(&path, "server_timeout_ms = 2500\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.server_timeout(), Duration::from_millis(2500));
        assert_eq!(config.wait_slice_ms, 100);
    }

    #[test]
    fn zero_wait_slice_is_clamped() {
        let config = ClientConfig {
            wait_slice_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.wait_slice(), Duration::from_millis(1));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actionkit.toml");
        std::fs::write(&path, "wait_slice_ms = \"soon\"\n").unwrap();

        assert!(matches!(
            ClientConfig::load(&path),
            Err(ClientError::ConfigError { .. })
        ));
        assert_eq!(ClientConfig::load_or_default(&path).wait_slice_ms, 100);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.wait_slice_ms, 100);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = ClientConfig {
            events_log: Some(PathBuf::from("/tmp/events.jsonl")),
            ..ClientConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let restored: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored.events_log, config.events_log);
    }
}
