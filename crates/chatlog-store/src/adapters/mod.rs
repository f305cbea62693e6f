//! Persistence strategies implementing [`MessageAdapter`](crate::MessageAdapter).
//!
//! `ObjectStoreAdapter` is the canonical strategy. `IndexedAdapter` and
//! `BlobAdapter` are fallbacks for platforms that only offer a flat
//! string key-value store. `MemoryObjectStore` keeps everything in process.

mod blob;
mod indexed;
mod memory;
mod object_store;

pub use blob::BlobAdapter;
pub use indexed::IndexedAdapter;
pub use memory::MemoryObjectStore;
pub use object_store::ObjectStoreAdapter;
