//! Configuration management for vscode-chat-insights.
//!
//! Handles:
//! - Scanner tuning (size limit, batch size, debounce interval, extra roots)
//! - Analytics cache limits
//! - Location of the persisted state file
//!
//! User-facing settings (retention, privacy) are persisted through
//! [`crate::store`] instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};
use crate::util::atomic_write;

/// Default maximum transcript size (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default number of files parsed concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default debounce interval for file-watch notifications.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default cache time-to-live (five minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default maximum number of entries per cache tier.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Persisted state location.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        let config_path = default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InsightsError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| InsightsError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.batch_size == 0 {
            return Err(InsightsError::InvalidConfig {
                message: "scanner.batch_size must be at least 1".to_string(),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(InsightsError::InvalidConfig {
                message: "cache.max_entries must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    ///
    /// Uses atomic file writes: the config is written to a temporary file
    /// first, then renamed over the target path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| InsightsError::InvalidConfig {
            message: format!("Failed to serialize config: {e}"),
        })?;

        atomic_write(path, content.as_bytes())?;

        Ok(())
    }

    /// Path of the persisted state file, falling back to the data directory.
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => default_state_path(),
        }
    }
}

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Transcripts larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Number of files parsed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Debounce interval for watch notifications, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Additional `workspaceStorage` directories to scan.
    #[serde(default)]
    pub storage_roots: Vec<PathBuf>,
    /// Whether the platform default roots are scanned as well.
    #[serde(default = "default_true")]
    pub include_default_roots: bool,
}

impl ScannerConfig {
    /// Debounce interval as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            storage_roots: Vec::new(),
            include_default_roots: true,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entry time-to-live in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum entries per cache tier.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

/// Persisted state configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Explicit state file; defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

/// Get the default configuration path.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| InsightsError::Unsupported {
        feature: "config directory discovery".to_string(),
    })?;

    Ok(config_dir.join(crate::NAME).join("config.toml"))
}

/// Get the default persisted state path.
pub fn default_state_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| InsightsError::Unsupported {
        feature: "data directory discovery".to_string(),
    })?;

    Ok(data_dir.join(crate::NAME).join("state.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.scanner.batch_size, 10);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert!(config.cache.enabled);
        assert!(config.scanner.include_default_roots);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.scanner.debounce_ms, config.scanner.debounce_ms);
        assert_eq!(parsed.cache.max_entries, config.cache.max_entries);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[scanner]
batch_size = 4
storage_roots = ["/srv/workspaceStorage"]

[cache]
ttl_seconds = 60
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scanner.batch_size, 4);
        assert_eq!(config.scanner.storage_roots, vec![PathBuf::from("/srv/workspaceStorage")]);
        assert_eq!(config.scanner.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.max_entries, DEFAULT_CACHE_MAX_ENTRIES);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[scanner]\nbatch_size = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, InsightsError::InvalidConfig { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scanner.debounce_ms = 1200;
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.scanner.debounce_ms, 1200);
    }
}
