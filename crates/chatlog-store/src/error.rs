//! Error types for message store operations.

/// Errors returned by the message store and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Durable storage cannot be opened or accessed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Serialization error while encoding a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Stored collection metadata cannot be read back.
    #[error("corrupted storage at {key}: {reason}")]
    Corrupted { key: String, reason: String },
    /// Key cannot be mapped onto the backing store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    /// Durable store was written by a newer schema.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(i64),
    /// The persistence worker is gone.
    #[error("persistence queue closed")]
    QueueClosed,
}

impl StoreError {
    /// Whether the error means durable storage is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::UnsupportedSchema(_) | Self::QueueClosed
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
