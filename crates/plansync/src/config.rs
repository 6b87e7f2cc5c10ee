//! Engine configuration
//!
//! Loaded from TOML; every section and field is optional:
//!
//! ```toml
//! [remote]
//! deployment = "production"
//! origin = "https://plans.example.com"
//!
//! [store]
//! data_dir = "/var/lib/plansync"
//!
//! [backup]
//! interval_secs = 300
//! max_auto_backups = 10
//! ```

use crate::error::SyncError;
use crate::identity::DEFAULT_MAX_OBSERVERS;
use crate::telemetry::TelemetryConfig;
use plansync_remote::{RemoteConfig, API_URL_ENV};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the local data directory
pub const DATA_DIR_ENV: &str = "PLANSYNC_DATA_DIR";

/// Local store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the file-backed store
    pub data_dir: PathBuf,
    /// Size limit of the store in bytes
    pub quota_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".plansync"),
            quota_bytes: Some(5 * 1024 * 1024),
        }
    }
}

/// Backup engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Period of the automatic timer
    pub interval_secs: u64,
    /// Automatic backups kept after pruning
    pub max_auto_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_auto_backups: 10,
        }
    }
}

impl BackupConfig {
    /// Period of the automatic timer
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Identity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Bound on identity observers
    pub max_observers: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_observers: DEFAULT_MAX_OBSERVERS,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlansyncConfig {
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub backup: BackupConfig,
    pub identity: IdentityConfig,
    pub telemetry: TelemetryConfig,
}

impl PlansyncConfig {
    /// Parse TOML
    ///
    /// # Errors
    /// `SyncError::Config` on invalid TOML or field types
    pub fn from_toml_str(source: &str) -> Result<Self, SyncError> {
        toml::from_str(source).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// `SyncError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Apply `PLANSYNC_API_URL` and `PLANSYNC_DATA_DIR`
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`; blank values are ignored
    #[must_use]
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = read(API_URL_ENV) {
            self.remote.base_url_override = Some(url);
        }
        if let Some(dir) = read(DATA_DIR_ENV) {
            self.store.data_dir = PathBuf::from(dir);
        }
        self
    }
}
