//! Companion services for the chat client: persisted user settings and the
//! avatar generation service.

pub mod avatar;
mod error;
pub mod settings;

pub use avatar::{
    AvatarCatalog, AvatarClient, AvatarKind, AvatarOption, AvatarResponse, AvatarSelection,
};
pub use error::{AvatarError, ServiceError};
pub use settings::{SETTINGS_KEY, Settings, SettingsPatch, SettingsStore};
