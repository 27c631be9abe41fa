//! # Blob Store Implementations

mod file;
mod memory;
mod provider;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use provider::{BlobPartition, BlobStore, StoreResult};
