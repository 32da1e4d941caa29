//! Key/value persistence for settings and scan statistics.
//!
//! Persistence is an injected capability: the service only talks to a
//! [`KeyValueStore`]. Two backends ship with the crate, an in-memory map and
//! a single JSON document on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InsightsError, Result};
use crate::scanner::ScanStatistics;
use crate::util::atomic_write;

/// Key under which [`Settings`] are persisted.
pub const SETTINGS_KEY: &str = "chatInsights.settings";

/// Key under which the last [`ScanStatistics`] are persisted.
pub const SCAN_STATISTICS_KEY: &str = "chatInsights.scanStatistics";

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Minimal key/value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a value, returning whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Read and deserialize a value.
pub fn get_typed<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    store
        .get(key)?
        .map(|value| {
            serde_json::from_value(value).map_err(|e| InsightsError::SerializationError {
                context: format!("Failed to decode stored value '{key}'"),
                source: e,
            })
        })
        .transpose()
}

/// Serialize and write a value.
pub fn set_typed<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|e| InsightsError::SerializationError {
        context: format!("Failed to encode value '{key}'"),
        source: e,
    })?;
    store.set(key, value)
}

/// In-memory store, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.values.write().remove(key).is_some())
    }
}

/// Store backed by one JSON object on disk.
///
/// The whole document is rewritten atomically on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or start) a store at `path`.
    ///
    /// A missing file is an empty store. A corrupt file is an error rather
    /// than silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let file = fs::File::open(&path).map_err(|e| {
                InsightsError::io(format!("Failed to open state file: {}", path.display()), e)
            })?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                InsightsError::SerializationError {
                    context: format!("Failed to parse state file: {}", path.display()),
                    source: e,
                }
            })?
        } else {
            debug!(path = %path.display(), "State file does not exist yet");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        let content = serde_json::to_vec_pretty(values).map_err(|e| InsightsError::SerializationError {
            context: "Failed to serialize state".to_string(),
            source: e,
        })?;
        atomic_write(&self.path, &content)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut values = self.values.write();
        let existed = values.remove(key).is_some();
        if existed {
            self.flush(&values)?;
        }
        Ok(existed)
    }
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Events older than this many days are dropped from scans.
    pub retention_days: u32,
    /// Whether retention is applied at all.
    pub auto_cleanup: bool,
    /// Copy raw prompt text into events.
    pub include_prompt_text: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            auto_cleanup: true,
            include_prompt_text: false,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when absent or unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match get_typed(store, SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable settings");
                Self::default()
            }
        }
    }

    /// Persist settings.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        set_typed(store, SETTINGS_KEY, self)
    }

    /// Apply a `key=value` assignment (`retentionDays=30`).
    pub fn apply(&mut self, assignment: &str) -> Result<()> {
        let invalid = |reason: String| InsightsError::InvalidArgument {
            name: assignment.to_string(),
            reason,
        };
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| invalid("expected key=value".to_string()))?;
        let value = value.trim();

        let parse_bool = |v: &str| {
            v.parse::<bool>()
                .map_err(|_| invalid(format!("'{v}' is not true or false")))
        };

        match key.trim() {
            "retentionDays" | "retention_days" => {
                self.retention_days = value
                    .parse()
                    .map_err(|_| invalid(format!("'{value}' is not a number of days")))?;
            }
            "autoCleanup" | "auto_cleanup" => self.auto_cleanup = parse_bool(value)?,
            "includePromptText" | "include_prompt_text" => self.include_prompt_text = parse_bool(value)?,
            other => return Err(invalid(format!("unknown setting '{other}'"))),
        }
        Ok(())
    }
}

/// Load the last persisted scan statistics.
pub fn load_scan_statistics(store: &dyn KeyValueStore) -> Result<Option<ScanStatistics>> {
    get_typed(store, SCAN_STATISTICS_KEY)
}

/// Persist scan statistics.
pub fn save_scan_statistics(store: &dyn KeyValueStore, stats: &ScanStatistics) -> Result<()> {
    set_typed(store, SCAN_STATISTICS_KEY, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", json!(1)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(1)));
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn test_json_file_store_persists() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("state").join("state.json");

        let store = JsonFileStore::open(&path).unwrap();
        Settings {
            retention_days: 7,
            ..Settings::default()
        }
        .save(&store)
        .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(Settings::load(&reopened).retention_days, 7);

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[SETTINGS_KEY]["retentionDays"], json!(7));
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
    }

    #[test]
    fn test_settings_defaults_and_partial() {
        let store = MemoryStore::new();
        assert_eq!(Settings::load(&store), Settings::default());

        store.set(SETTINGS_KEY, json!({ "includePromptText": true })).unwrap();
        let settings = Settings::load(&store);
        assert!(settings.include_prompt_text);
        assert_eq!(settings.retention_days, DEFAULT_RETENTION_DAYS);

        store.set(SETTINGS_KEY, json!("garbage")).unwrap();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn test_settings_apply() {
        let mut settings = Settings::default();
        settings.apply("retentionDays=30").unwrap();
        settings.apply("auto_cleanup = false").unwrap();
        assert_eq!(settings.retention_days, 30);
        assert!(!settings.auto_cleanup);

        assert!(settings.apply("retentionDays=soon").is_err());
        assert!(settings.apply("color=blue").is_err());
        assert!(settings.apply("novalue").is_err());
    }

    #[test]
    fn test_scan_statistics_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(load_scan_statistics(&store).unwrap(), None);

        let stats = ScanStatistics {
            scanned_files: 3,
            parsed_sessions: 2,
            ..ScanStatistics::default()
        };
        save_scan_statistics(&store, &stats).unwrap();
        assert_eq!(load_scan_statistics(&store).unwrap(), Some(stats));
    }
}
