//! Change notifications emitted by the message store.

use crate::model::MessageId;
use log::debug;
use tokio::sync::broadcast;

/// Whether durable writes are currently landing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    /// The last durable operation succeeded.
    Durable,
    /// Durable storage is unreachable; the mirror keeps working but changes
    /// only live for this session until storage recovers.
    Degraded { reason: String },
}

/// Durable operation kinds, used in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurableOp {
    Persist,
    Delete,
    Clear,
    Fetch,
}

/// Events published to store subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The mirror was rehydrated from durable storage.
    Loaded { count: usize, skipped: usize },
    /// A message was appended, or overwrote an entry with the same id.
    Appended { id: MessageId, replaced: bool },
    /// A message's emotions were replaced.
    Annotated { id: MessageId },
    /// A message was removed from the mirror.
    Removed { id: MessageId },
    /// The mirror was emptied.
    Cleared,
    /// A durable operation failed after its mirror mutation.
    PersistFailed { op: DurableOp, error: String },
    /// Durability switched between durable and degraded.
    DurabilityChanged(Durability),
}

/// Broadcast-backed event bus for store subscribers.
#[derive(Clone, Debug)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub(crate) fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        debug!("store event bus initialized (buffer={})", buffer);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Emit an event; nobody listening is fine.
    pub(crate) fn emit(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }
}
