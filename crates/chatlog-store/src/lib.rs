//! Durable, ordered chat message log.
//!
//! [`MessageStore`] keeps an in-memory mirror for synchronous reads and
//! pushes every change through a single queue to a pluggable
//! [`MessageAdapter`]. Adapters cover a SQLite object store, per-record keys
//! with an id index, a single JSON blob, and an in-process store.

pub mod adapter;
pub mod adapters;
pub mod error;
pub mod events;
pub mod kv;
pub mod model;
pub mod store;

/// Adapter interface and fetch results.
pub use adapter::{AdapterState, FetchOutcome, MalformedRecord, MessageAdapter};
/// Built-in persistence strategies.
pub use adapters::{BlobAdapter, IndexedAdapter, MemoryObjectStore, ObjectStoreAdapter};
/// Store error type.
pub use error::StoreError;
/// Store events and durability state.
pub use events::{DurableOp, Durability, StoreEvent};
/// Key-value stores backing the fallback strategies.
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
/// Message record model.
pub use model::{Emotion, Message, MessageId};
/// Message store service.
pub use store::{LoadReport, MessageStore, PendingWrite, StoreOptions};
