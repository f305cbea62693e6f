//! Config loading errors.

use thiserror::Error;

/// Why a chatlog config could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file (explicit path or runtime layer) could not be read.
    #[error("failed to read config file: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A layer is not valid JSON5.
    #[error("failed to parse config layer: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged layers do not decode into `ChatlogConfig`, e.g. a
    /// `storage.event_buffer` that is not an unsigned integer.
    #[error("failed to decode merged config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A layer failed its schema check. `path` names the layer and field,
    /// e.g. `cwd(/work/chatlog.json5):storage.strategy`.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// The effective config breaks a cross-field rule: the storage key
    /// format, its clash with the settings document, the event buffer size
    /// or the avatar URL scheme.
    #[error("invalid chatlog config: {0}")]
    Invalid(String),
}
