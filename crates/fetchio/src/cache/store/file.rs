//! # File Blob Store
//!
//! Disk-backed store implementation. Each partition is a subdirectory of the
//! store root; each entry is a data file named by the SHA-256 of its key with
//! a `.meta` JSON sidecar holding the header set. Writes go through temporary
//! files and a rename to avoid exposing partial entries.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::entry::{EntryHeaders, StoredEntry};
use crate::cache::store::provider::{BlobPartition, BlobStore, StoreResult};

/// Blob store persisting partitions under a root directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn BlobPartition>> {
        // Partition names come from callers, not the network, but hashing
        // them keeps any name filesystem-safe.
        let dir = self.root.join(hash_component(name));
        Ok(Arc::new(FilePartition::new(dir)))
    }
}

struct FilePartition {
    dir: PathBuf,
    initialized: AtomicBool,
}

impl FilePartition {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            initialized: AtomicBool::new(false),
        }
    }

    /// Create the partition directory on first use. Racing callers both
    /// create it; create_dir_all is idempotent.
    async fn ensure_initialized(&self) -> io::Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        fs::create_dir_all(&self.dir).await?;
        self.initialized.store(true, Ordering::Release);

        Ok(())
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.dir.join(hash_component(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        let mut path = self.data_path(key);
        path.set_extension("meta");
        path
    }
}

#[async_trait]
impl BlobPartition for FilePartition {
    async fn entry(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        self.ensure_initialized().await?;

        let data_path = self.data_path(key);
        let meta_path = self.meta_path(key);

        if !fs::try_exists(&data_path).await? || !fs::try_exists(&meta_path).await? {
            return Ok(None);
        }

        let meta_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to read entry metadata file");
                return Ok(None);
            }
        };

        let headers: EntryHeaders = match serde_json::from_slice(&meta_bytes) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to parse entry metadata, discarding");

                let _ = fs::remove_file(&data_path).await;
                let _ = fs::remove_file(&meta_path).await;
                return Ok(None);
            }
        };

        let data = fs::read(&data_path).await?;

        Ok(Some(StoredEntry::new(Bytes::from(data), headers)))
    }

    async fn put(&self, key: &str, blob: Bytes, headers: EntryHeaders) -> StoreResult<()> {
        self.ensure_initialized().await?;

        let data_path = self.data_path(key);
        let meta_path = self.meta_path(key);

        let meta_json = serde_json::to_vec(&headers).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize entry headers: {e}"),
            )
        })?;

        let temp_data_path = data_path.with_extension("tmp");
        let temp_meta_path = meta_path.with_extension("tmp.meta");

        fs::write(&temp_data_path, &blob).await?;

        if let Err(e) = fs::write(&temp_meta_path, &meta_json).await {
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(e);
        }

        debug!(key, size = blob.len(), "Persisted blob entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_initialized().await?;

        let data_path = self.data_path(key);
        let meta_path = self.meta_path(key);

        let existed = fs::try_exists(&data_path).await?;

        if existed {
            fs::remove_file(&data_path).await?;
        }
        if fs::try_exists(&meta_path).await? {
            fs::remove_file(&meta_path).await?;
        }

        Ok(existed)
    }
}

/// Filename-safe encoding of an arbitrary key
fn hash_component(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn headers(size: u64, content_type: Option<&str>) -> EntryHeaders {
        EntryHeaders::new(
            size,
            Utc::now() + Duration::hours(1),
            content_type.map(|ct| ct.to_string()),
        )
    }

    #[tokio::test]
    async fn roundtrips_blob_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        let partition = store.open("gallery").await.unwrap();
        let blob = Bytes::from_static(b"image bytes");

        partition
            .put(
                "https://example.com/a.png",
                blob.clone(),
                headers(blob.len() as u64, Some("image/png")),
            )
            .await
            .unwrap();

        let entry = partition
            .entry("https://example.com/a.png")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.blob, blob);
        assert_eq!(entry.headers.content_length, blob.len() as u64);
        assert_eq!(entry.headers.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        let partition = store.open("gallery").await.unwrap();

        assert!(partition.entry("/nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_presence_and_removes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        let partition = store.open("gallery").await.unwrap();

        partition
            .put("/a.png", Bytes::from_static(b"x"), headers(1, None))
            .await
            .unwrap();

        assert!(partition.delete("/a.png").await.unwrap());
        assert!(!partition.delete("/a.png").await.unwrap());
        assert!(partition.entry("/a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_metadata_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        let partition = store.open("gallery").await.unwrap();

        partition
            .put("/a.png", Bytes::from_static(b"x"), headers(1, None))
            .await
            .unwrap();

        // Clobber the sidecar so the headers no longer parse.
        let meta_path = dir
            .path()
            .join(hash_component("gallery"))
            .join(format!("{}.meta", hash_component("/a.png")));
        fs::write(&meta_path, b"not json").await.unwrap();

        assert!(partition.entry("/a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partitions_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path());
        let first = store.open("one").await.unwrap();
        let second = store.open("two").await.unwrap();

        first
            .put("/k", Bytes::from_static(b"x"), headers(1, None))
            .await
            .unwrap();

        assert!(second.entry("/k").await.unwrap().is_none());
    }
}
