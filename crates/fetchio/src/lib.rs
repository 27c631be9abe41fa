//! # Fetchio
//!
//! A resilient content-fetching engine: a deduplicating, TTL-based cache
//! coordinator layered on top of a retrying, cancellable HTTP request
//! primitive.
//!
//! ## Features
//!
//! - Batched per-URL interest registration with exactly-once notification
//! - Each distinct URL fetched at most once per run
//! - Persistent blob store with lazy, header-driven staleness checks
//! - Exponential backoff retries with external cancellation
//! - Graceful degradation when no persistence capability is available

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod request;

pub use builder::RequestConfigBuilder;
pub use cache::{
    BlobPartition, BlobStore, CacheCoordinator, DEFAULT_TTL, EntryHeaders, FailureCallback,
    FileBlobStore, MemoryBlobStore, StoreResult, StoredEntry, SuccessCallback,
};
pub use client::create_client;
pub use config::RequestConfig;
pub use envelope::{ApiEnvelope, ApiResponse};
pub use error::FetchError;
pub use request::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RequestPipeline};
