use async_trait::async_trait;
use chatlog_store::{
    AdapterState, FetchOutcome, MemoryObjectStore, Message, MessageAdapter, MessageId, StoreError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Durable call observed by a [`ScriptedAdapter`], recorded on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    Persist(MessageId),
    FetchAll,
    Delete(MessageId),
    Clear,
}

/// Adapter wrapper that records calls and can simulate outages and slow
/// writes.
pub struct ScriptedAdapter {
    inner: Arc<dyn MessageAdapter>,
    calls: Mutex<Vec<AdapterCall>>,
    unavailable: AtomicBool,
    persist_delays: Mutex<HashMap<MessageId, Duration>>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdapter {
    /// Wrap a fresh in-memory store.
    pub fn new() -> Self {
        Self::wrapping(Arc::new(MemoryObjectStore::new()))
    }

    /// Wrap an existing adapter.
    pub fn wrapping(inner: Arc<dyn MessageAdapter>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            persist_delays: Mutex::new(HashMap::new()),
        }
    }

    /// Toggle a simulated storage outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every persist of the given id.
    pub fn delay_persist(&self, id: MessageId, delay: Duration) {
        self.persist_delays.lock().insert(id, delay);
    }

    /// Calls completed so far, in completion order.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(())
    }

    fn record(&self, call: AdapterCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MessageAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn state(&self) -> AdapterState {
        self.inner.state()
    }

    async fn persist(&self, message: &Message) -> Result<(), StoreError> {
        let delay = self.persist_delays.lock().get(&message.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;
        self.inner.persist(message).await?;
        self.record(AdapterCall::Persist(message.id));
        Ok(())
    }

    async fn fetch_all(&self) -> Result<FetchOutcome, StoreError> {
        self.check_available()?;
        let outcome = self.inner.fetch_all().await?;
        self.record(AdapterCall::FetchAll);
        Ok(outcome)
    }

    async fn delete_by_id(&self, id: MessageId) -> Result<(), StoreError> {
        self.check_available()?;
        self.inner.delete_by_id(id).await?;
        self.record(AdapterCall::Delete(id));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.check_available()?;
        self.inner.clear().await?;
        self.record(AdapterCall::Clear);
        Ok(())
    }
}
