use crate::avatar::AvatarKind;
use chatlog_store::StoreError;
use thiserror::Error;

/// Errors returned by the settings store.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by the avatar catalog and client.
#[derive(Debug, Error)]
pub enum AvatarError {
    /// The request never produced a response, or the body did not decode.
    #[error("avatar request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("avatar service returned {status}: {message}")]
    Server { status: u16, message: String },
    /// A selection names an option the catalog does not offer.
    #[error("unknown {kind} option: {id:?}")]
    InvalidSelection { kind: AvatarKind, id: String },
}
