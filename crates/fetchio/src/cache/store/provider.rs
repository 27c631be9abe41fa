//! # Blob Store Capability
//!
//! The persistence capability consumed by the coordinator: an opaque
//! asynchronous key-value store for byte blobs plus string headers. The store
//! is partitioned by name; a partition handle is opened at most once per
//! coordinator lifetime. Environments without the capability simply inject
//! nothing and the coordinator degrades to fetch-without-persistence.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io;

use crate::cache::entry::{EntryHeaders, StoredEntry};

/// Result type for store operations
pub type StoreResult<T> = io::Result<T>;

/// A named collection of blob partitions
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open (or create) the partition for `name`.
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn BlobPartition>>;
}

/// One partition of a blob store, keyed by URL
#[async_trait]
pub trait BlobPartition: Send + Sync {
    /// Look up the entry for `key`, if present.
    async fn entry(&self, key: &str) -> StoreResult<Option<StoredEntry>>;

    /// Create or overwrite the entry for `key`.
    async fn put(&self, key: &str, blob: Bytes, headers: EntryHeaders) -> StoreResult<()>;

    /// Remove the entry for `key`. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}
