//! Configuration resolution for chatrelay.
//!
//! The relay resolves its settings in three layers:
//! 1. Built-in defaults
//! 2. JSON config file (`--config`, or `~/.config/chatrelay/relay.json` when present)
//! 3. CLI arguments (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Size of one read, in bytes. A chunk is whatever one read returns.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Usable client slots (12 descriptors minus the monitor pipe and listener).
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Number of client slots in the connection table.
    pub max_clients: usize,
    /// Upper bound on bytes read per readiness event.
    pub chunk_size: usize,
    /// Bounded wait of one relay cycle, in milliseconds.
    pub tick_ms: u64,
    /// Pending-connection backlog passed to `listen`.
    pub listen_backlog: u32,
    /// How long shutdown waits for the monitor to finish, in milliseconds.
    pub monitor_grace_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tick_ms: 100,
            listen_backlog: 50,
            monitor_grace_ms: 500,
        }
    }
}

impl RelayConfig {
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub const fn monitor_grace(&self) -> Duration {
        Duration::from_millis(self.monitor_grace_ms)
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(Error::Config("max_clients must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Client program settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub chunk_size: usize,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Load the relay configuration.
///
/// An explicit path must exist. Without one, the global config file is used
/// if present, otherwise the built-in defaults.
pub fn load_relay_config(explicit: Option<&Path>) -> Result<RelayConfig> {
    let config = match explicit {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => RelayConfig::default(),
        },
    };
    config.validate()?;
    Ok(config)
}

/// Path of the global relay config file.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatrelay").join("relay.json"))
}

fn load_config_file(path: &Path) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_ten_client_slots() {
        let config = RelayConfig::default();
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.tick(), Duration::from_millis(100));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, r#"{"max_clients": 3}"#).unwrap();

        let config = load_relay_config(Some(&path)).unwrap();
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.listen_backlog, 50);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_relay_config(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_relay_config(Some(&path)).is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = RelayConfig {
            max_clients: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = RelayConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
