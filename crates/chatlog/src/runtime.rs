//! Config mapping into runtime components.

use crate::error::ChatlogError;
use chatlog_config::{ChatlogConfig, StorageConfig, StorageStrategy};
use chatlog_services::{AvatarClient, SettingsStore};
use chatlog_store::{
    BlobAdapter, FileKeyValueStore, IndexedAdapter, KeyValueStore, MemoryKeyValueStore,
    MemoryObjectStore, MessageAdapter, MessageStore, ObjectStoreAdapter, StoreOptions,
};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

/// File name of the SQLite database inside the data directory.
pub const OBJECT_STORE_FILE: &str = "messages.sqlite";

/// Build the persistence adapter selected by the storage config.
///
/// Nothing is opened here; adapters open lazily on first use.
pub fn build_adapter(config: &StorageConfig) -> Result<Arc<dyn MessageAdapter>, ChatlogError> {
    let adapter: Arc<dyn MessageAdapter> = match config.strategy {
        StorageStrategy::Memory => Arc::new(MemoryObjectStore::new()),
        StorageStrategy::ObjectStore => {
            Arc::new(ObjectStoreAdapter::new(data_dir(config)?.join(OBJECT_STORE_FILE)))
        }
        StorageStrategy::Indexed => Arc::new(IndexedAdapter::new(
            Arc::new(FileKeyValueStore::new(data_dir(config)?)),
            config.key.clone(),
        )),
        StorageStrategy::Blob => Arc::new(BlobAdapter::new(
            Arc::new(FileKeyValueStore::new(data_dir(config)?)),
            config.key.clone(),
        )),
    };
    info!(
        "message adapter built (strategy={}, adapter={})",
        config.strategy.as_str(),
        adapter.name()
    );
    Ok(adapter)
}

/// Translate storage config into store options.
pub fn store_options(config: &StorageConfig) -> StoreOptions {
    StoreOptions {
        sort_on_load: config.sort_on_load,
        event_buffer: config.event_buffer,
    }
}

/// Create a message store for the config. Must run inside a Tokio runtime.
pub fn open_store(config: &ChatlogConfig) -> Result<MessageStore, ChatlogError> {
    let adapter = build_adapter(&config.storage)?;
    Ok(MessageStore::with_options(
        adapter,
        store_options(&config.storage),
    ))
}

/// Create and load the settings store for the config.
///
/// Settings share the storage data directory unless `settings.path` is set;
/// with the memory strategy and no explicit path they stay in process. Config
/// validation keeps a blob log from claiming the settings document key.
pub fn open_settings(config: &ChatlogConfig) -> Result<SettingsStore, ChatlogError> {
    let in_memory =
        config.settings.path.is_none() && config.storage.strategy == StorageStrategy::Memory;
    let kv: Arc<dyn KeyValueStore> = if in_memory {
        Arc::new(MemoryKeyValueStore::new())
    } else {
        let dir = config
            .settings
            .dir(config.storage.data_dir())
            .ok_or(ChatlogError::MissingDataDir)?;
        debug!("settings directory resolved (path={})", dir.display());
        Arc::new(FileKeyValueStore::new(dir))
    };
    let settings = SettingsStore::new(kv);
    settings.load()?;
    Ok(settings)
}

/// Create an avatar client for the configured service.
pub fn avatar_client(config: &ChatlogConfig) -> Result<AvatarClient, ChatlogError> {
    Ok(AvatarClient::new(config.avatar.base_url.clone())?)
}

fn data_dir(config: &StorageConfig) -> Result<PathBuf, ChatlogError> {
    config.data_dir().ok_or(ChatlogError::MissingDataDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlog_config::SettingsConfig;
    use chatlog_services::SettingsPatch;
    use chatlog_store::{AdapterState, Message};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn storage(strategy: StorageStrategy, path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            strategy,
            path: Some(path.display().to_string()),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn adapters_match_strategy() {
        let temp = tempdir().expect("tempdir");
        let cases = [
            (StorageStrategy::ObjectStore, "object_store"),
            (StorageStrategy::Indexed, "indexed"),
            (StorageStrategy::Blob, "blob"),
            (StorageStrategy::Memory, "memory"),
        ];
        for (strategy, name) in cases {
            let adapter = build_adapter(&storage(strategy, temp.path())).expect("adapter");
            assert_eq!(adapter.name(), name);
        }
    }

    #[test]
    fn building_an_adapter_does_not_touch_disk() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("data");
        let adapter =
            build_adapter(&storage(StorageStrategy::ObjectStore, &root)).expect("adapter");
        assert_eq!(adapter.state(), AdapterState::Unopened);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn object_store_lands_in_data_dir() {
        let temp = tempdir().expect("tempdir");
        let config = ChatlogConfig::builder()
            .storage(storage(StorageStrategy::ObjectStore, temp.path()))
            .build();
        let store = open_store(&config).expect("store");
        store
            .append(Message::text(1, "user", "hi", Utc::now()))
            .await
            .expect("append");
        assert!(temp.path().join(OBJECT_STORE_FILE).exists());
    }

    #[test]
    fn store_options_follow_config() {
        let config = StorageConfig {
            sort_on_load: true,
            event_buffer: 4,
            ..StorageConfig::default()
        };
        let options = store_options(&config);
        assert!(options.sort_on_load);
        assert_eq!(options.event_buffer, 4);
    }

    #[test]
    fn settings_use_their_own_directory_when_set() {
        let temp = tempdir().expect("tempdir");
        let settings_dir = temp.path().join("prefs");
        let config = ChatlogConfig::builder()
            .storage(storage(StorageStrategy::Blob, &temp.path().join("data")))
            .settings(SettingsConfig {
                path: Some(settings_dir.display().to_string()),
            })
            .build();

        let settings = open_settings(&config).expect("settings");
        settings
            .update(SettingsPatch {
                conversation_id: Some("abc".to_string()),
                ..SettingsPatch::default()
            })
            .expect("update");
        assert!(settings_dir.join("settings.json").exists());

        let reopened = open_settings(&config).expect("settings");
        assert_eq!(reopened.settings().conversation_id, "abc");
    }

    #[test]
    fn settings_document_key_matches_the_settings_store() {
        assert_eq!(SettingsConfig::DOCUMENT_KEY, chatlog_services::SETTINGS_KEY);
    }

    #[tokio::test]
    async fn blob_log_and_settings_share_a_directory_without_clobbering() {
        let temp = tempdir().expect("tempdir");
        let config = ChatlogConfig::builder()
            .storage(storage(StorageStrategy::Blob, temp.path()))
            .build();
        config.validate().expect("default key is valid");

        let store = open_store(&config).expect("store");
        store
            .append(Message::text(1, "user", "hi", Utc::now()))
            .await
            .expect("append");
        let settings = open_settings(&config).expect("settings");
        settings
            .update(SettingsPatch {
                conversation_id: Some("abc".to_string()),
                ..SettingsPatch::default()
            })
            .expect("update");

        let reloaded = open_settings(&config).expect("settings");
        assert_eq!(reloaded.settings().conversation_id, "abc");
        let reopened = open_store(&config).expect("store");
        reopened.load().await.expect("load");
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn memory_strategy_keeps_settings_in_process() {
        let config = ChatlogConfig::builder()
            .storage(StorageConfig {
                strategy: StorageStrategy::Memory,
                ..StorageConfig::default()
            })
            .build();
        let settings = open_settings(&config).expect("settings");
        settings
            .update(SettingsPatch::default())
            .expect("update");
        let reopened = open_settings(&config).expect("settings");
        assert_eq!(reopened.settings(), settings.settings());
    }
}
