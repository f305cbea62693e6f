//! Per-record keys plus an ordered meta index of ids.

use crate::adapter::{AdapterState, FetchOutcome, MessageAdapter};
use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::model::{Message, MessageId};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Suffix of the key holding the id index.
const META_SUFFIX: &str = "meta";

/// Ordered list of stored ids.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaIndex {
    ids: Vec<MessageId>,
}

/// Stores each record under `<prefix>_<id>` and keeps enumeration order in
/// a `<prefix>_meta` record of the form `{"ids": [...]}`.
///
/// Writes go record first, then index; deletes go index first, then
/// record. An interrupted write therefore leaves an orphan record rather
/// than an index entry pointing at nothing.
pub struct IndexedAdapter {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl IndexedAdapter {
    /// Create an adapter using `prefix` for every key it writes.
    pub fn new(kv: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
        }
    }

    fn record_key(&self, id: MessageId) -> String {
        format!("{}_{id}", self.prefix)
    }

    fn meta_key(&self) -> String {
        format!("{}_{META_SUFFIX}", self.prefix)
    }

    fn read_index(&self) -> Result<MetaIndex, StoreError> {
        let key = self.meta_key();
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(MetaIndex::default());
        };
        serde_json::from_str(&raw).map_err(|err| StoreError::Corrupted {
            key,
            reason: err.to_string(),
        })
    }

    fn write_index(&self, index: &MetaIndex) -> Result<(), StoreError> {
        let raw = serde_json::to_string(index)?;
        self.kv.set(&self.meta_key(), &raw)
    }
}

#[async_trait]
impl MessageAdapter for IndexedAdapter {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn state(&self) -> AdapterState {
        self.kv.state()
    }

    async fn persist(&self, message: &Message) -> Result<(), StoreError> {
        self.kv.open()?;
        let raw = serde_json::to_string(message)?;
        self.kv.set(&self.record_key(message.id), &raw)?;
        let mut index = self.read_index()?;
        if !index.ids.contains(&message.id) {
            index.ids.push(message.id);
            self.write_index(&index)?;
        }
        debug!(
            "persisted indexed message (id={}, indexed={})",
            message.id,
            index.ids.len()
        );
        Ok(())
    }

    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError> {
        self.kv.open()?;
        let mut outcome = FetchOutcome::default();
        let index = match self.read_index() {
            Ok(index) => index,
            Err(StoreError::Corrupted { key, reason }) => {
                outcome.push_malformed(key, reason);
                return Ok(outcome);
            }
            Err(err) => return Err(err),
        };
        for id in index.ids {
            let key = self.record_key(id);
            match self.kv.get(&key)? {
                Some(raw) => outcome.push_raw(key, &raw),
                None => outcome.push_malformed(key, "indexed record is missing"),
            }
        }
        Ok(outcome)
    }

    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError> {
        self.kv.open()?;
        let mut index = self.read_index()?;
        let before = index.ids.len();
        index.ids.retain(|existing| *existing != id);
        if index.ids.len() != before {
            self.write_index(&index)?;
        }
        self.kv.remove(&self.record_key(id))?;
        debug!("deleted indexed message (id={id})");
        Ok(())
    }

    /// Remove every `<prefix>_<id>` record plus the index, so records
    /// orphaned by an interrupted write or a corrupted index are swept too.
    /// Keys of other prefixes such as `<prefix>_old_<id>` are left alone.
    async fn clear(&self) -> Result<(), StoreError> {
        self.kv.open()?;
        let prefix = format!("{}_", self.prefix);
        let mut removed = 0usize;
        for key in self.kv.keys()? {
            let is_record = key
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.parse::<MessageId>().is_ok());
            if is_record {
                self.kv.remove(&key)?;
                removed += 1;
            }
        }
        self.kv.remove(&self.meta_key())?;
        info!("cleared indexed messages (prefix={}, removed={removed})", self.prefix);
        Ok(())
    }
}
