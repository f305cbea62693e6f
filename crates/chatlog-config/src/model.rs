//! Configuration schema for chatlog.

use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory under the home directory holding chatlog config and data.
pub(crate) const DEFAULT_HOME_DIR: &str = ".chatlog";

/// Root config for a chatlog deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChatlogConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
}

impl ChatlogConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ChatlogConfigBuilder {
        ChatlogConfigBuilder::new()
    }
}

/// Builder for assembling a `ChatlogConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ChatlogConfigBuilder {
    config: ChatlogConfig,
}

impl ChatlogConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the message storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the settings store configuration.
    pub fn settings(mut self, settings: SettingsConfig) -> Self {
        self.config.settings = settings;
        self
    }

    /// Replace the avatar service configuration.
    pub fn avatar(mut self, avatar: AvatarConfig) -> Self {
        self.config.avatar = avatar;
        self
    }

    pub fn build(self) -> ChatlogConfig {
        self.config
    }
}

/// Which persistence strategy backs the message store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// SQLite object store keyed by message id.
    #[default]
    ObjectStore,
    /// One key per message plus an id index, on the file key-value store.
    Indexed,
    /// All messages in a single JSON array, on the file key-value store.
    Blob,
    /// Process memory only; nothing survives a restart.
    Memory,
}

impl StorageStrategy {
    /// Config name of the strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectStore => "object_store",
            Self::Indexed => "indexed",
            Self::Blob => "blob",
            Self::Memory => "memory",
        }
    }
}

/// Message storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub strategy: StorageStrategy,
    /// Data directory for file-backed strategies. `~/` expands to the home
    /// directory; unset means `~/.chatlog/data`.
    #[serde(default)]
    pub path: Option<String>,
    /// Blob key, or key prefix for the indexed strategy.
    #[serde(default = "default_storage_key")]
    pub key: String,
    #[serde(default)]
    pub sort_on_load: bool,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            strategy: StorageStrategy::default(),
            path: None,
            key: default_storage_key(),
            sort_on_load: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl StorageConfig {
    /// Resolved data directory, or `None` when no home directory is known
    /// and no path was configured.
    pub fn data_dir(&self) -> Option<PathBuf> {
        match self.path.as_deref() {
            Some(path) => expand_home(path),
            None => default_data_dir(),
        }
    }
}

fn default_storage_key() -> String {
    "messages".to_string()
}

fn default_event_buffer() -> usize {
    64
}

/// Settings store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SettingsConfig {
    /// Directory of the settings key-value store. Unset shares the storage
    /// data directory.
    #[serde(default)]
    pub path: Option<String>,
}

impl SettingsConfig {
    /// Key of the settings document inside its directory.
    pub const DOCUMENT_KEY: &'static str = "settings";

    /// Resolved settings directory, falling back to `storage_dir`.
    pub fn dir(&self, storage_dir: Option<PathBuf>) -> Option<PathBuf> {
        match self.path.as_deref() {
            Some(path) => expand_home(path),
            None => storage_dir,
        }
    }
}

/// Avatar service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_base_url")]
    pub base_url: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            base_url: default_avatar_base_url(),
        }
    }
}

fn default_avatar_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// `~/.chatlog/data`, when a home directory is known.
fn default_data_dir() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_HOME_DIR).join("data"))
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => UserDirs::new().map(|dirs| dirs.home_dir().join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.strategy, StorageStrategy::ObjectStore);
        assert_eq!(storage.key, "messages");
        assert_eq!(storage.event_buffer, 64);
        assert!(!storage.sort_on_load);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let storage = StorageConfig {
            path: Some("/var/lib/chatlog".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(storage.data_dir(), Some(PathBuf::from("/var/lib/chatlog")));
    }

    #[test]
    fn settings_dir_falls_back_to_storage_dir() {
        let settings = SettingsConfig::default();
        let storage_dir = Some(PathBuf::from("/data"));
        assert_eq!(settings.dir(storage_dir.clone()), storage_dir);

        let settings = SettingsConfig {
            path: Some("/prefs".to_string()),
        };
        assert_eq!(settings.dir(storage_dir), Some(PathBuf::from("/prefs")));
    }

    #[test]
    fn strategy_names_match_serde() {
        for strategy in [
            StorageStrategy::ObjectStore,
            StorageStrategy::Indexed,
            StorageStrategy::Blob,
            StorageStrategy::Memory,
        ] {
            let encoded = serde_json::to_value(strategy).expect("encode");
            assert_eq!(encoded, serde_json::Value::from(strategy.as_str()));
        }
    }
}
