//! In-memory message mirror with queued durable persistence.

use crate::adapter::{AdapterState, FetchOutcome, MalformedRecord, MessageAdapter};
use crate::error::StoreError;
use crate::events::{DurableOp, Durability, EventBus, StoreEvent};
use crate::model::{Emotion, Message, MessageId};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Default capacity of the event broadcast channel.
const DEFAULT_EVENT_BUFFER: usize = 64;

/// Runtime options for a [`MessageStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Sort rehydrated records by timestamp instead of storage order.
    pub sort_on_load: bool,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sort_on_load: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Summary of a [`MessageStore::load`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Stored records placed into the mirror.
    pub loaded: usize,
    /// Session-only entries kept after the stored records.
    pub retained: usize,
    /// Stored records dropped because a later record reused their id.
    pub duplicates: usize,
    /// Stored records that failed to decode.
    pub skipped: Vec<MalformedRecord>,
    /// Durable writes re-issued for changes that storage never accepted.
    pub resynced: usize,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Work item for the persistence worker.
enum Command {
    Persist { message: Message, reply: Reply<()> },
    Delete { id: MessageId, reply: Reply<()> },
    Clear { reply: Reply<()> },
    Fetch { reply: Reply<FetchOutcome> },
    Barrier { reply: Reply<()> },
}

/// Mirror contents plus the bookkeeping `load` needs to avoid clobbering
/// mutations made while a fetch was in flight.
#[derive(Default)]
struct Mirror {
    messages: Vec<Message>,
    /// Bumped on every mutation.
    generation: u64,
    /// Generation of the most recent clear.
    cleared_at: u64,
    /// Generation at which each id was last appended, annotated or removed.
    /// Pruned once no in-flight load predates the entry.
    touched: HashMap<MessageId, u64>,
    /// Ids whose latest durable write failed.
    unsynced: HashSet<MessageId>,
    /// Set while the latest durable clear has failed.
    clear_unsynced: bool,
    /// Issue generations of loads not yet applied, with their counts.
    loads_in_flight: BTreeMap<u64, usize>,
}

impl Mirror {
    fn touch(&mut self, id: MessageId) {
        self.generation += 1;
        self.touched.insert(id, self.generation);
    }

    fn begin_load(&mut self) -> u64 {
        *self.loads_in_flight.entry(self.generation).or_default() += 1;
        self.generation
    }

    fn end_load(&mut self, issued_at: u64) {
        if let Some(count) = self.loads_in_flight.get_mut(&issued_at) {
            *count -= 1;
            if *count == 0 {
                self.loads_in_flight.remove(&issued_at);
            }
        }
    }

    /// Forget touches older than every load still in flight.
    fn prune_touched(&mut self) {
        let floor = self
            .loads_in_flight
            .keys()
            .next()
            .copied()
            .unwrap_or(self.generation);
        self.touched.retain(|_, generation| *generation > floor);
    }

    /// Durable writes that bring storage back in line with the mirror.
    fn resync_commands(&self) -> Vec<Resync> {
        if self.clear_unsynced {
            return std::iter::once(Resync::Clear)
                .chain(self.messages.iter().cloned().map(Resync::Persist))
                .collect();
        }
        self.unsynced
            .iter()
            .map(|id| match self.messages.iter().find(|message| message.id == *id) {
                Some(message) => Resync::Persist(message.clone()),
                None => Resync::Delete(*id),
            })
            .collect()
    }
}

/// Durable write re-issued by `load`.
enum Resync {
    Persist(Message),
    Delete(MessageId),
    Clear,
}

/// Registration of a load between issue and apply. Dropping an unapplied
/// ticket releases it.
struct LoadTicket {
    shared: Option<Arc<Shared>>,
    issued_at: u64,
}

impl LoadTicket {
    fn issue(shared: &Arc<Shared>) -> Self {
        let issued_at = shared.mirror.write().begin_load();
        Self {
            shared: Some(shared.clone()),
            issued_at,
        }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.mirror.write().end_load(self.issued_at);
        }
    }
}

/// State shared between store handles and the persistence worker.
struct Shared {
    mirror: RwLock<Mirror>,
    durability: RwLock<Durability>,
    events: EventBus,
}

impl Shared {
    /// Record the outcome of a durable operation.
    fn settle<T>(&self, op: DurableOp, result: &Result<T, StoreError>) {
        match result {
            Ok(_) => {
                let mut durability = self.durability.write();
                if *durability != Durability::Durable {
                    *durability = Durability::Durable;
                    drop(durability);
                    info!("durable storage recovered");
                    self.events
                        .emit(StoreEvent::DurabilityChanged(Durability::Durable));
                }
            }
            Err(err) => {
                warn!("durable {op:?} failed: {err}");
                self.events.emit(StoreEvent::PersistFailed {
                    op,
                    error: err.to_string(),
                });
                if err.is_unavailable() {
                    self.degrade(err.to_string());
                }
            }
        }
    }

    /// Track whether storage holds the latest state of `id`.
    fn track_write(&self, id: MessageId, synced: bool) {
        let mut mirror = self.mirror.write();
        if synced {
            mirror.unsynced.remove(&id);
        } else {
            mirror.unsynced.insert(id);
        }
    }

    fn track_clear(&self, synced: bool) {
        let mut mirror = self.mirror.write();
        mirror.clear_unsynced = !synced;
        if synced {
            mirror.unsynced.clear();
        }
    }

    fn degrade(&self, reason: String) {
        let next = Durability::Degraded { reason };
        let mut durability = self.durability.write();
        if *durability == next {
            return;
        }
        *durability = next.clone();
        drop(durability);
        warn!("message store degraded to session-only storage");
        self.events.emit(StoreEvent::DurabilityChanged(next));
    }
}

/// Handle to a queued durable operation.
///
/// Dropping it leaves the operation running; awaiting it yields the
/// durable outcome. The mirror is never rolled back on failure.
pub struct PendingWrite {
    rx: oneshot::Receiver<Result<(), StoreError>>,
}

impl PendingWrite {
    /// Wait for the durable operation to finish.
    pub async fn wait(self) -> Result<(), StoreError> {
        self.rx.await.map_err(|_| StoreError::QueueClosed)?
    }
}

impl IntoFuture for PendingWrite {
    type Output = Result<(), StoreError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Ordered message log with synchronous reads and queued durability.
///
/// Every mutation updates the in-memory mirror before returning and then
/// enqueues its durable counterpart. A single worker task drains the queue,
/// so durable operations complete in the order they were issued. Clones
/// share the same mirror and queue; the worker stops once every handle is
/// dropped.
#[derive(Clone)]
pub struct MessageStore {
    shared: Arc<Shared>,
    adapter: Arc<dyn MessageAdapter>,
    queue: mpsc::UnboundedSender<Command>,
    options: StoreOptions,
}

impl MessageStore {
    /// Create a store over an adapter with default options.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(adapter: Arc<dyn MessageAdapter>) -> Self {
        Self::with_options(adapter, StoreOptions::default())
    }

    /// Create a store over an adapter with explicit options.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_options(adapter: Arc<dyn MessageAdapter>, options: StoreOptions) -> Self {
        let shared = Arc::new(Shared {
            mirror: RwLock::new(Mirror::default()),
            durability: RwLock::new(Durability::Durable),
            events: EventBus::new(options.event_buffer),
        });
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(adapter.clone(), shared.clone(), rx));
        info!("message store created (adapter={})", adapter.name());
        Self {
            shared,
            adapter,
            queue,
            options,
        }
    }

    /// Rehydrate the mirror from durable storage.
    ///
    /// The fetch is queued when `load` is called, behind every durable
    /// operation issued before it. Stored records land in storage order (or
    /// timestamp order when `sort_on_load` is set), de-duplicated by id with
    /// the later record winning in place. Entries only present in the mirror
    /// are kept after them. Mutations made after `load` was called take
    /// precedence over the fetched copy, as do changes whose durable write
    /// failed; those writes are issued again. Malformed records are skipped
    /// and listed in the report.
    pub fn load(&self) -> impl Future<Output = Result<LoadReport, StoreError>> + Send + 'static {
        let ticket = LoadTicket::issue(&self.shared);
        let rx = self.request(|reply| Command::Fetch { reply });
        let store = self.clone();
        async move {
            let outcome = rx.await.map_err(|_| StoreError::QueueClosed)??;
            Ok(store.apply_load(ticket, outcome))
        }
    }

    fn apply_load(&self, mut ticket: LoadTicket, outcome: FetchOutcome) -> LoadReport {
        let issued_at = ticket.issued_at;
        let FetchOutcome { records, malformed } = outcome;
        let mut stored: Vec<Message> = Vec::with_capacity(records.len());
        let mut positions: HashMap<MessageId, usize> = HashMap::new();
        let mut duplicates = 0usize;
        for record in records {
            match positions.get(&record.id) {
                Some(&idx) => {
                    stored[idx] = record;
                    duplicates += 1;
                }
                None => {
                    positions.insert(record.id, stored.len());
                    stored.push(record);
                }
            }
        }
        if self.options.sort_on_load {
            stored.sort_by_key(|message| message.timestamp);
        }

        let report = {
            let mut mirror = self.shared.mirror.write();
            mirror.end_load(issued_at);
            ticket.shared = None;
            if mirror.cleared_at > issued_at || mirror.clear_unsynced {
                stored.clear();
            } else {
                let Mirror {
                    messages,
                    touched,
                    unsynced,
                    ..
                } = &*mirror;
                stored.retain_mut(|message| {
                    if unsynced.contains(&message.id) {
                        // Keep the session copy in the stored slot.
                        return match messages.iter().find(|entry| entry.id == message.id) {
                            Some(current) => {
                                *message = current.clone();
                                true
                            }
                            None => false,
                        };
                    }
                    touched
                        .get(&message.id)
                        .is_none_or(|generation| *generation <= issued_at)
                });
            }
            let stored_ids: HashSet<MessageId> = stored.iter().map(|m| m.id).collect();
            let session_only: Vec<Message> = mirror
                .messages
                .drain(..)
                .filter(|message| !stored_ids.contains(&message.id))
                .collect();
            let retained = session_only.len();
            stored.extend(session_only);
            mirror.messages = stored;
            mirror.prune_touched();

            // Queued under the lock so later mutations land behind these.
            let resync = mirror.resync_commands();
            let resynced = resync.len();
            for write in resync {
                let _ = match write {
                    Resync::Persist(message) => {
                        self.enqueue(|reply| Command::Persist { message, reply })
                    }
                    Resync::Delete(id) => self.enqueue(|reply| Command::Delete { id, reply }),
                    Resync::Clear => self.enqueue(|reply| Command::Clear { reply }),
                };
            }
            LoadReport {
                loaded: mirror.messages.len() - retained,
                retained,
                duplicates,
                skipped: malformed,
                resynced,
            }
        };

        info!(
            "loaded messages (loaded={}, retained={}, duplicates={}, skipped={}, resynced={})",
            report.loaded,
            report.retained,
            report.duplicates,
            report.skipped.len(),
            report.resynced
        );
        self.shared.events.emit(StoreEvent::Loaded {
            count: report.loaded,
            skipped: report.skipped.len(),
        });
        report
    }

    /// Append a message, or overwrite the entry that already has its id.
    pub fn append(&self, message: Message) -> PendingWrite {
        let id = message.id;
        let replaced = {
            let mut mirror = self.shared.mirror.write();
            mirror.touch(id);
            match mirror.messages.iter_mut().find(|entry| entry.id == id) {
                Some(slot) => {
                    *slot = message.clone();
                    true
                }
                None => {
                    mirror.messages.push(message.clone());
                    false
                }
            }
        };
        debug!("appended message (id={id}, replaced={replaced})");
        self.shared
            .events
            .emit(StoreEvent::Appended { id, replaced });
        self.enqueue(|reply| Command::Persist { message, reply })
    }

    /// Replace a message's emotions. Returns `None` when the id is not in
    /// the mirror, in which case nothing is written.
    pub fn annotate(&self, id: MessageId, emotions: Vec<Emotion>) -> Option<PendingWrite> {
        let updated = {
            let mut mirror = self.shared.mirror.write();
            let Some(slot) = mirror.messages.iter_mut().find(|entry| entry.id == id) else {
                debug!("annotate skipped, message not found (id={id})");
                return None;
            };
            slot.emotions = Some(emotions);
            let updated = slot.clone();
            mirror.touch(id);
            updated
        };
        debug!(
            "annotated message (id={id}, emotions={})",
            updated.emotions.as_ref().map_or(0, Vec::len)
        );
        self.shared.events.emit(StoreEvent::Annotated { id });
        Some(self.enqueue(|reply| Command::Persist {
            message: updated,
            reply,
        }))
    }

    /// Remove a message. The durable delete is issued even when the mirror
    /// does not hold the id, and is a no-op if storage lacks it too.
    pub fn remove_by_id(&self, id: MessageId) -> PendingWrite {
        let removed = {
            let mut mirror = self.shared.mirror.write();
            mirror.touch(id);
            match mirror.messages.iter().position(|entry| entry.id == id) {
                Some(idx) => {
                    mirror.messages.remove(idx);
                    true
                }
                None => false,
            }
        };
        debug!("removed message (id={id}, present={removed})");
        if removed {
            self.shared.events.emit(StoreEvent::Removed { id });
        }
        self.enqueue(|reply| Command::Delete { id, reply })
    }

    /// Empty the mirror and durable storage.
    pub fn clear(&self) -> PendingWrite {
        let count = {
            let mut mirror = self.shared.mirror.write();
            let count = mirror.messages.len();
            mirror.messages.clear();
            mirror.touched.clear();
            mirror.generation += 1;
            mirror.cleared_at = mirror.generation;
            count
        };
        info!("cleared message store (count={count})");
        self.shared.events.emit(StoreEvent::Cleared);
        self.enqueue(|reply| Command::Clear { reply })
    }

    /// Wait until every durable operation issued so far has finished.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let rx = self.request(|reply| Command::Barrier { reply });
        rx.await.map_err(|_| StoreError::QueueClosed)?
    }

    /// Snapshot of the mirror in order.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.mirror.read().messages.clone()
    }

    /// Borrow the mirror without cloning it.
    pub fn with_messages<R>(&self, f: impl FnOnce(&[Message]) -> R) -> R {
        f(&self.shared.mirror.read().messages)
    }

    /// Look up a message by id.
    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.shared
            .mirror
            .read()
            .messages
            .iter()
            .find(|message| message.id == id)
            .cloned()
    }

    /// Number of messages in the mirror.
    pub fn len(&self) -> usize {
        self.shared.mirror.read().messages.len()
    }

    /// Whether the mirror is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.mirror.read().messages.is_empty()
    }

    /// Current durability of the store.
    pub fn durability(&self) -> Durability {
        self.shared.durability.read().clone()
    }

    /// Open state of the underlying adapter.
    pub fn adapter_state(&self) -> AdapterState {
        self.adapter.state()
    }

    /// Subscribe to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.shared.events.subscribe()
    }

    fn enqueue(&self, build: impl FnOnce(Reply<()>) -> Command) -> PendingWrite {
        PendingWrite {
            rx: self.request(build),
        }
    }

    fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> oneshot::Receiver<Result<T, StoreError>> {
        let (reply, rx) = oneshot::channel();
        if self.queue.send(build(reply)).is_err() {
            warn!("persistence queue closed; change kept in session only");
            self.shared
                .degrade(StoreError::QueueClosed.to_string());
        }
        rx
    }
}

/// Drain the queue, applying each command to the adapter in order.
async fn run_worker(
    adapter: Arc<dyn MessageAdapter>,
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    debug!("persistence worker started (adapter={})", adapter.name());
    while let Some(command) = rx.recv().await {
        match command {
            Command::Persist { message, reply } => {
                let result = adapter.persist(&message).await;
                shared.settle(DurableOp::Persist, &result);
                shared.track_write(message.id, result.is_ok());
                let _ = reply.send(result);
            }
            Command::Delete { id, reply } => {
                let result = adapter.delete_by_id(id).await;
                shared.settle(DurableOp::Delete, &result);
                shared.track_write(id, result.is_ok());
                let _ = reply.send(result);
            }
            Command::Clear { reply } => {
                let result = adapter.clear().await;
                shared.settle(DurableOp::Clear, &result);
                shared.track_clear(result.is_ok());
                let _ = reply.send(result);
            }
            Command::Fetch { reply } => {
                let result = adapter.fetch_all().await;
                shared.settle(DurableOp::Fetch, &result);
                let _ = reply.send(result);
            }
            Command::Barrier { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }
    debug!("persistence worker stopped (adapter={})", adapter.name());
}
