//! Durable persistence adapter interface.

use crate::error::StoreError;
use crate::model::{Message, MessageId};
use async_trait::async_trait;
use log::warn;
use serde_json::Value;

/// Lifecycle of a durable store handle.
///
/// Every adapter starts `Unopened` and moves to `Open` on the first
/// operation. Opening again is a no-op; there is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Backing storage has not been touched yet.
    Unopened,
    /// Backing storage is open and cached for the session.
    Open,
}

/// A stored record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Storage key of the record (adapter specific).
    pub key: String,
    /// Decoder error message.
    pub reason: String,
}

/// Result of enumerating every stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Decoded records in storage order.
    pub records: Vec<Message>,
    /// Records skipped because they failed to decode.
    pub malformed: Vec<MalformedRecord>,
}

impl FetchOutcome {
    /// Decode a raw JSON record, recording it as malformed on failure.
    pub fn push_raw(&mut self, key: impl Into<String>, raw: &str) {
        match serde_json::from_str::<Message>(raw) {
            Ok(message) => self.records.push(message),
            Err(err) => self.push_malformed(key, err.to_string()),
        }
    }

    /// Decode a JSON value, recording it as malformed on failure.
    pub fn push_value(&mut self, key: impl Into<String>, value: Value) {
        match serde_json::from_value::<Message>(value) {
            Ok(message) => self.records.push(message),
            Err(err) => self.push_malformed(key, err.to_string()),
        }
    }

    /// Record a skipped entry.
    pub fn push_malformed(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        let key = key.into();
        let reason = reason.into();
        warn!("skipping malformed record (key={key}): {reason}");
        self.malformed.push(MalformedRecord { key, reason });
    }
}

#[async_trait]
/// Durable backing store for message records.
///
/// Implementations must treat `persist` as an upsert keyed by id and
/// `delete_by_id` on a missing id as a no-op.
pub trait MessageAdapter: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Current open state.
    fn state(&self) -> AdapterState;

    /// Insert or overwrite a record.
    async fn persist(&self, message: &Message) -> Result<(), StoreError>;

    /// Enumerate every stored record in storage order.
    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError>;

    /// Remove one record.
    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Read the id out of an undecoded record, accepting the legacy key.
pub(crate) fn record_id(value: &Value) -> Option<MessageId> {
    value
        .get("id")
        .or_else(|| value.get("messageId"))
        .and_then(Value::as_i64)
}
