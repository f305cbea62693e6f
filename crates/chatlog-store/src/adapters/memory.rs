//! In-memory keyed object store.

use crate::adapter::{AdapterState, FetchOutcome, MessageAdapter};
use crate::error::StoreError;
use crate::model::{Message, MessageId};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;

/// Keyed store held in process memory. Records are kept serialized so
/// decoding on fetch behaves like a durable backend. Enumeration order is
/// first-insertion order; upserts keep their original slot.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    records: Mutex<Vec<(MessageId, String)>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw serialized record under an id, bypassing encoding.
    pub fn insert_raw(&self, id: MessageId, raw: impl Into<String>) {
        upsert(&mut self.records.lock(), id, raw.into());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

fn upsert(records: &mut Vec<(MessageId, String)>, id: MessageId, raw: String) {
    match records.iter_mut().find(|(existing, _)| *existing == id) {
        Some(slot) => slot.1 = raw,
        None => records.push((id, raw)),
    }
}

#[async_trait]
impl MessageAdapter for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn state(&self) -> AdapterState {
        AdapterState::Open
    }

    async fn persist(&self, message: &Message) -> Result<(), StoreError> {
        let raw = serde_json::to_string(message)?;
        upsert(&mut self.records.lock(), message.id, raw);
        debug!("persisted message in memory (id={})", message.id);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError> {
        let mut outcome = FetchOutcome::default();
        for (id, raw) in self.records.lock().iter() {
            outcome.push_raw(id.to_string(), raw);
        }
        Ok(outcome)
    }

    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError> {
        self.records.lock().retain(|(existing, _)| *existing != id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.lock().clear();
        Ok(())
    }
}
