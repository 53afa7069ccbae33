//! Settings management
//!
//! Settings are the only state that outlives a browser session. They live in
//! a key-value store owned by the host (one key per field); this module
//! provides the model, two store backends and a cached manager.
//! Supports Windows, macOS, and Linux config locations for the file backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Store key for [`Settings::auto_cleanup_enabled`]
pub const KEY_AUTO_CLEANUP_ENABLED: &str = "autoCleanupEnabled";
/// Store key for [`Settings::auto_cleanup_minutes`]
pub const KEY_AUTO_CLEANUP_MINUTES: &str = "autoCleanupMinutes";
/// Store key for [`Settings::token_masking_enabled`]
pub const KEY_TOKEN_MASKING_ENABLED: &str = "tokenMaskingEnabled";

const DEFAULT_CLEANUP_MINUTES: u32 = 15;

/// Errors that can occur while reading or writing settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Cleanup period must be at least one minute
    #[error("Auto-cleanup minutes must be a positive integer, got {0}")]
    InvalidCleanupMinutes(u32),

    /// Could not determine where to keep the settings file
    #[error("Could not determine config path")]
    NoConfigDir,

    /// Reading or writing the settings file failed
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document could not be (de)serialized
    #[error("Failed to serialize settings: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Process-wide user settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Purge a tab's tokens after a period without new captures
    pub auto_cleanup_enabled: bool,
    /// Idle period before purging, in minutes
    pub auto_cleanup_minutes: u32,
    /// Mask token values on the display surface
    pub token_masking_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_cleanup_enabled: false,
            auto_cleanup_minutes: DEFAULT_CLEANUP_MINUTES,
            token_masking_enabled: false,
        }
    }
}

impl Settings {
    /// Checks field constraints
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.auto_cleanup_minutes == 0 {
            return Err(SettingsError::InvalidCleanupMinutes(self.auto_cleanup_minutes));
        }
        Ok(())
    }

    /// Idle period before a tab is purged
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.auto_cleanup_minutes) * 60)
    }

    /// Builds settings from raw store values, defaulting each bad or missing field
    pub fn from_entries(entries: &HashMap<String, Value>) -> Self {
        let defaults = Self::default();

        let auto_cleanup_enabled = entries
            .get(KEY_AUTO_CLEANUP_ENABLED)
            .and_then(Value::as_bool)
            .unwrap_or(defaults.auto_cleanup_enabled);

        let auto_cleanup_minutes = entries
            .get(KEY_AUTO_CLEANUP_MINUTES)
            .and_then(Value::as_u64)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| *m > 0)
            .unwrap_or(defaults.auto_cleanup_minutes);

        let token_masking_enabled = entries
            .get(KEY_TOKEN_MASKING_ENABLED)
            .and_then(Value::as_bool)
            .unwrap_or(defaults.token_masking_enabled);

        Self {
            auto_cleanup_enabled,
            auto_cleanup_minutes,
            token_masking_enabled,
        }
    }

    /// Splits settings into store entries
    pub fn to_entries(&self) -> Vec<(&'static str, Value)> {
        vec![
            (KEY_AUTO_CLEANUP_ENABLED, Value::Bool(self.auto_cleanup_enabled)),
            (KEY_AUTO_CLEANUP_MINUTES, Value::from(self.auto_cleanup_minutes)),
            (KEY_TOKEN_MASKING_ENABLED, Value::Bool(self.token_masking_enabled)),
        ]
    }
}

/// Key-value store that persists settings outside the core
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the requested keys; absent keys are omitted from the result
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, SettingsError>;

    /// Writes all entries
    async fn set(&self, entries: Vec<(&'static str, Value)>) -> Result<(), SettingsError>;
}

/// Settings store kept in memory only
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, SettingsError> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Vec<(&'static str, Value)>) -> Result<(), SettingsError> {
        let mut stored = self.entries.write().await;
        for (key, value) in entries {
            stored.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Settings store backed by a single JSON object on disk
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    /// Uses the platform config directory
    pub fn new() -> Result<Self, SettingsError> {
        let dir = Self::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::with_path(dir.join("settings.json")))
    }

    /// Uses an explicit file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Gets the config directory path (cross-platform)
    fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("TokenExtractor"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/TokenExtractor"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("token-extractor"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    // Missing or corrupt documents read as empty.
    async fn read_document(&self) -> Map<String, Value> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => return Map::new(),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!("Ignoring unreadable settings file {}", self.path.display());
                Map::new()
            }
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, SettingsError> {
        let document = self.read_document().await;
        Ok(keys
            .iter()
            .filter_map(|k| document.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Vec<(&'static str, Value)>) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await;
        for (key, value) in entries {
            document.insert(key.to_string(), value);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(document))?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Cached view of the persisted settings
pub struct SettingsManager {
    store: Arc<dyn SettingsStore>,
    current: RwLock<Settings>,
}

impl SettingsManager {
    /// Loads settings from the store, falling back to defaults on failure
    pub async fn load(store: Arc<dyn SettingsStore>) -> Self {
        let keys = [
            KEY_AUTO_CLEANUP_ENABLED,
            KEY_AUTO_CLEANUP_MINUTES,
            KEY_TOKEN_MASKING_ENABLED,
        ];

        let settings = match store.get(&keys).await {
            Ok(entries) => Settings::from_entries(&entries),
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };
        tracing::debug!(?settings, "Loaded settings");

        Self {
            store,
            current: RwLock::new(settings),
        }
    }

    /// Returns the current settings
    pub async fn current(&self) -> Settings {
        *self.current.read().await
    }

    /// Validates, persists and caches new settings
    ///
    /// The cache is only updated once the store accepted the write.
    pub async fn save(&self, settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.store.set(settings.to_entries()).await?;
        *self.current.write().await = settings;
        tracing::info!(?settings, "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.auto_cleanup_enabled);
        assert_eq!(settings.auto_cleanup_minutes, 15);
        assert!(!settings.token_masking_enabled);
        assert_eq!(settings.cleanup_delay(), Duration::from_secs(900));
    }

    #[test]
    fn test_validate_rejects_zero_minutes() {
        let settings = Settings {
            auto_cleanup_minutes: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidCleanupMinutes(0))
        ));
    }

    #[test]
    fn test_deserialize_partial_object() {
        let settings: Settings = serde_json::from_value(json!({ "autoCleanupEnabled": true })).unwrap();
        assert!(settings.auto_cleanup_enabled);
        assert_eq!(settings.auto_cleanup_minutes, 15);
    }

    #[test]
    fn test_from_entries_defaults_bad_fields() {
        let mut entries = HashMap::new();
        entries.insert(KEY_AUTO_CLEANUP_ENABLED.to_string(), json!("yes"));
        entries.insert(KEY_AUTO_CLEANUP_MINUTES.to_string(), json!(0));
        entries.insert(KEY_TOKEN_MASKING_ENABLED.to_string(), json!(true));

        let settings = Settings::from_entries(&entries);
        assert!(!settings.auto_cleanup_enabled);
        assert_eq!(settings.auto_cleanup_minutes, 15);
        assert!(settings.token_masking_enabled);
    }

    #[tokio::test]
    async fn test_manager_round_trip_memory_store() {
        let store = Arc::new(MemorySettingsStore::new());
        let manager = SettingsManager::load(store.clone()).await;
        assert_eq!(manager.current().await, Settings::default());

        let updated = Settings {
            auto_cleanup_enabled: true,
            auto_cleanup_minutes: 1,
            token_masking_enabled: true,
        };
        tokio_test::assert_ok!(manager.save(updated).await);
        assert_eq!(manager.current().await, updated);

        let reloaded = SettingsManager::load(store).await;
        assert_eq!(reloaded.current().await, updated);
    }

    #[tokio::test]
    async fn test_manager_rejects_invalid_without_side_effect() {
        let store = Arc::new(MemorySettingsStore::new());
        let manager = SettingsManager::load(store.clone()).await;

        let invalid = Settings {
            auto_cleanup_minutes: 0,
            ..Settings::default()
        };
        tokio_test::assert_err!(manager.save(invalid).await);
        assert_eq!(manager.current().await, Settings::default());
        assert!(store.get(&[KEY_AUTO_CLEANUP_MINUTES]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = Arc::new(JsonFileSettingsStore::with_path(&path));

        let manager = SettingsManager::load(store.clone()).await;
        manager
            .save(Settings {
                auto_cleanup_enabled: true,
                auto_cleanup_minutes: 30,
                token_masking_enabled: false,
            })
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let document: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(document["autoCleanupMinutes"], 30);

        let reloaded = SettingsManager::load(Arc::new(JsonFileSettingsStore::with_path(&path))).await;
        assert!(reloaded.current().await.auto_cleanup_enabled);
    }

    #[tokio::test]
    async fn test_json_file_store_keeps_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = JsonFileSettingsStore::with_path(&path);
        store
            .set(Settings::default().to_entries())
            .await
            .unwrap();

        let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["theme"], "dark");
        assert_eq!(document["tokenMaskingEnabled"], false);
    }

    #[tokio::test]
    async fn test_json_file_store_corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let manager = SettingsManager::load(Arc::new(JsonFileSettingsStore::with_path(&path))).await;
        assert_eq!(manager.current().await, Settings::default());
    }

    #[test]
    fn test_config_dir_exists() {
        // Only verifies the lookup doesn't panic on this platform
        let _ = JsonFileSettingsStore::config_dir();
    }
}
