use chatlog_config::ConfigError;
use chatlog_services::{AvatarError, ServiceError};
use chatlog_store::StoreError;
use thiserror::Error;

/// Errors raised while assembling runtime components from config.
#[derive(Debug, Error)]
pub enum ChatlogError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
    /// A file-backed strategy was configured without a resolvable directory.
    #[error("no data directory configured and no home directory found")]
    MissingDataDir,
}
