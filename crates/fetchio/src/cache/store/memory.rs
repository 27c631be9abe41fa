//! # Memory Blob Store
//!
//! In-process store implementation, used by embedding callers that want the
//! full coordinator contract without touching disk, and by tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::entry::{EntryHeaders, StoredEntry};
use crate::cache::store::provider::{BlobPartition, BlobStore, StoreResult};

/// Blob store keeping every partition in process memory
#[derive(Default)]
pub struct MemoryBlobStore {
    partitions: RwLock<HashMap<String, Arc<MemoryPartition>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn BlobPartition>> {
        let mut partitions = self.partitions.write();
        let partition = partitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryPartition::default()))
            .clone();

        Ok(partition)
    }
}

#[derive(Default)]
struct MemoryPartition {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

#[async_trait]
impl BlobPartition for MemoryPartition {
    async fn entry(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, blob: Bytes, headers: EntryHeaders) -> StoreResult<()> {
        debug!(key, size = blob.len(), "Stored blob in memory partition");
        self.entries
            .write()
            .insert(key.to_string(), StoredEntry::new(blob, headers));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn headers(size: u64) -> EntryHeaders {
        EntryHeaders::new(size, Utc::now() + Duration::hours(1), None)
    }

    #[tokio::test]
    async fn put_then_entry_returns_blob() {
        let store = MemoryBlobStore::new();
        let partition = store.open("gallery").await.unwrap();
        let blob = Bytes::from_static(b"pixels");

        partition
            .put("/a.png", blob.clone(), headers(blob.len() as u64))
            .await
            .unwrap();

        let entry = partition.entry("/a.png").await.unwrap().unwrap();
        assert_eq!(entry.blob, blob);
        assert_eq!(entry.headers.content_length, 6);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MemoryBlobStore::new();
        let partition = store.open("gallery").await.unwrap();
        assert!(partition.entry("/ghost.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemoryBlobStore::new();
        let partition = store.open("gallery").await.unwrap();

        partition
            .put("/a.png", Bytes::from_static(b"x"), headers(1))
            .await
            .unwrap();

        assert!(partition.delete("/a.png").await.unwrap());
        assert!(!partition.delete("/a.png").await.unwrap());
        assert!(partition.entry("/a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partitions_are_isolated_but_memoizable() {
        let store = MemoryBlobStore::new();
        let first = store.open("one").await.unwrap();
        let second = store.open("two").await.unwrap();

        first
            .put("/k", Bytes::from_static(b"x"), headers(1))
            .await
            .unwrap();

        assert!(second.entry("/k").await.unwrap().is_none());

        // Re-opening a partition sees the same contents.
        let again = store.open("one").await.unwrap();
        assert!(again.entry("/k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn overwrite_replaces_entry() {
        let store = MemoryBlobStore::new();
        let partition = store.open("gallery").await.unwrap();

        partition
            .put("/a.png", Bytes::from_static(b"old"), headers(3))
            .await
            .unwrap();
        partition
            .put("/a.png", Bytes::from_static(b"new!"), headers(4))
            .await
            .unwrap();

        let entry = partition.entry("/a.png").await.unwrap().unwrap();
        assert_eq!(entry.blob, Bytes::from_static(b"new!"));
        assert_eq!(entry.headers.content_length, 4);
    }
}
