//! Persisted user settings.
//!
//! Settings live as one JSON document under [`SETTINGS_KEY`] in a
//! [`KeyValueStore`]. Reads are served from memory; updates merge the
//! present fields of a [`SettingsPatch`] and write the whole document back.

use crate::error::ServiceError;
use chatlog_store::KeyValueStore;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage key of the settings document.
pub const SETTINGS_KEY: &str = "settings";

/// User settings for the chat client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Rendered avatar image, as returned by the avatar service.
    pub avatar: String,
    /// Option ids the avatar was generated from.
    pub avatar_configuration: BTreeMap<String, String>,
    /// Whether the user finished configuring their avatar.
    pub avatar_configuration_finished: bool,
    /// Conversation the client resumes.
    pub conversation_id: String,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_configuration: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_configuration_finished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(avatar) = self.avatar {
            settings.avatar = avatar;
        }
        if let Some(configuration) = self.avatar_configuration {
            settings.avatar_configuration = configuration;
        }
        if let Some(finished) = self.avatar_configuration_finished {
            settings.avatar_configuration_finished = finished;
        }
        if let Some(conversation_id) = self.conversation_id {
            settings.conversation_id = conversation_id;
        }
    }
}

/// Settings cache backed by a key-value store.
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Create a store holding default settings until [`load`](Self::load).
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            current: RwLock::new(Settings::default()),
        }
    }

    /// Read stored settings into memory.
    ///
    /// A missing document yields defaults. A document that does not decode
    /// is logged and replaced by defaults in memory; it is overwritten on
    /// the next update.
    pub fn load(&self) -> Result<Settings, ServiceError> {
        let settings = match self.kv.get(SETTINGS_KEY)? {
            None => {
                debug!("no stored settings; using defaults");
                Settings::default()
            }
            Some(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("stored settings are malformed; using defaults: {err}");
                    Settings::default()
                }
            },
        };
        *self.current.write() = settings.clone();
        info!("settings loaded");
        Ok(settings)
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.current.read().clone()
    }

    /// Merge a patch over the current settings and persist the result.
    ///
    /// The in-memory settings keep the merged value even when the write
    /// fails.
    pub fn update(&self, patch: SettingsPatch) -> Result<Settings, ServiceError> {
        let merged = {
            let mut current = self.current.write();
            patch.apply(&mut current);
            current.clone()
        };
        let encoded = serde_json::to_string(&merged)?;
        self.kv.set(SETTINGS_KEY, &encoded)?;
        debug!("settings updated (len={})", encoded.len());
        Ok(merged)
    }
}
