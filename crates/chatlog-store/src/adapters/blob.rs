//! Single-blob strategy: the whole collection under one key.

use crate::adapter::{AdapterState, FetchOutcome, MessageAdapter, record_id};
use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::model::{Message, MessageId};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;

/// Stores every record as one JSON array under a fixed key. Each mutation
/// rewrites the full array, so this only suits small logs.
pub struct BlobAdapter {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl BlobAdapter {
    /// Create an adapter writing to `key` inside the given store.
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Read the stored array without decoding individual records.
    fn read_entries(&self) -> Result<Vec<Value>, StoreError> {
        let Some(raw) = self.kv.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => Err(self.corrupted("expected a JSON array")),
            Err(err) => Err(self.corrupted(&err.to_string())),
        }
    }

    fn write_entries(&self, entries: &[Value]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entries)?;
        self.kv.set(&self.key, &raw)
    }

    fn corrupted(&self, reason: &str) -> StoreError {
        StoreError::Corrupted {
            key: self.key.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MessageAdapter for BlobAdapter {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn state(&self) -> AdapterState {
        self.kv.state()
    }

    async fn persist(&self, message: &Message) -> Result<(), StoreError> {
        self.kv.open()?;
        let mut entries = self.read_entries()?;
        let value = serde_json::to_value(message)?;
        match entries
            .iter_mut()
            .find(|entry| record_id(entry) == Some(message.id))
        {
            Some(slot) => *slot = value,
            None => entries.push(value),
        }
        self.write_entries(&entries)?;
        debug!(
            "persisted message to blob (id={}, total={})",
            message.id,
            entries.len()
        );
        Ok(())
    }

    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError> {
        self.kv.open()?;
        let mut outcome = FetchOutcome::default();
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Corrupted { key, reason }) => {
                outcome.push_malformed(key, reason);
                return Ok(outcome);
            }
            Err(err) => return Err(err),
        };
        for (idx, entry) in entries.into_iter().enumerate() {
            outcome.push_value(format!("{}[{idx}]", self.key), entry);
        }
        Ok(outcome)
    }

    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError> {
        self.kv.open()?;
        let mut entries = self.read_entries()?;
        let before = entries.len();
        entries.retain(|entry| record_id(entry) != Some(id));
        if entries.len() != before {
            self.write_entries(&entries)?;
            debug!("deleted message from blob (id={id})");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.kv.open()?;
        self.kv.remove(&self.key)?;
        info!("cleared message blob (key={})", self.key);
        Ok(())
    }
}
