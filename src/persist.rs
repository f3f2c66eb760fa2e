//! Last-used configuration persistence
//!
//! The last successful `ConnectionConfig` is written to the state directory
//! under a fixed namespaced key so a relaunch can resume without
//! re-provisioning. Persistence is best-effort: load failures are logged
//! and treated as "no saved config", never fatal. The file carries a schema
//! version so future layout changes can be detected instead of misparsed.

use crate::config::ConnectionConfig;
use crate::error::{VpnctlError, VpnctlResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Fixed namespace key; the file name is derived from it
const LAST_CONFIG_KEY: &str = "vpnctl.last-connection";

/// Current on-disk schema version
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    version: u32,
    config: ConnectionConfig,
}

/// Durable store for the last successful connection configuration
pub struct ConfigStore {
    state_dir: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", LAST_CONFIG_KEY))
    }

    /// Persist the given configuration, creating the state directory if needed
    pub async fn save(&self, config: &ConnectionConfig) -> VpnctlResult<()> {
        fs::create_dir_all(&self.state_dir).await?;

        let stored = StoredConfig {
            version: SCHEMA_VERSION,
            config: config.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        let path = self.config_path();
        fs::write(&path, json).await?;
        info!("Saved last connection config to {}", path.display());
        Ok(())
    }

    /// Load the persisted configuration, if any
    ///
    /// Missing file, malformed JSON, and schema version mismatches all
    /// yield `None` with a log entry; they are never surfaced as errors.
    pub async fn load(&self) -> Option<ConnectionConfig> {
        let path = self.config_path();
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved connection config at {}", path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read saved config {}: {}", path.display(), e);
                return None;
            }
        };

        let stored: StoredConfig = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring malformed saved config {}: {}", path.display(), e);
                return None;
            }
        };

        if stored.version != SCHEMA_VERSION {
            warn!(
                "Ignoring saved config with schema version {} (expected {})",
                stored.version, SCHEMA_VERSION
            );
            return None;
        }

        Some(stored.config)
    }

    /// Remove the persisted configuration if present
    pub async fn clear(&self) -> VpnctlResult<()> {
        let path = self.config_path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Cleared saved connection config");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VpnctlError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::wireguard_config;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let config = wireguard_config();

        store.save(&config).await.unwrap();

        // Simulated relaunch: a fresh store over the same directory
        let reloaded = ConfigStore::new(dir.path()).load().await;
        assert_eq!(reloaded, Some(config));
    }

    #[tokio::test]
    async fn test_load_without_saved_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        store.save(&wireguard_config()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);

        // Clearing again with nothing saved is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        tokio::fs::write(store.config_path(), "not json at all").await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_version_mismatch_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let stored = serde_json::json!({
            "version": 99,
            "config": wireguard_config(),
        });
        tokio::fs::write(store.config_path(), stored.to_string()).await.unwrap();
        assert_eq!(store.load().await, None);
    }
}
