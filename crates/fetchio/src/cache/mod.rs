//! # Cache System
//!
//! A deduplicating, TTL-based cache coordinator over the request pipeline.
//! Callers register interest in URLs, the coordinator fetches each distinct
//! URL at most once per run, persists successful responses with an expiry,
//! and notifies every registrant when its URL settles.

mod coordinator;
mod entry;
pub mod store;

pub use coordinator::{CacheCoordinator, FailureCallback, SuccessCallback, DEFAULT_TTL};
pub use entry::{EntryHeaders, StoredEntry};
pub use store::{BlobPartition, BlobStore, FileBlobStore, MemoryBlobStore, StoreResult};
