//! # Cache Coordinator
//!
//! Owns one named cache: batches concurrent registrations by URL, fetches
//! each distinct URL exactly once per run, persists successful responses with
//! a computed expiry, and drains every registration when the batch settles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use parking_lot::Mutex;
use reqwest::{Client, Method};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::entry::EntryHeaders;
use crate::cache::store::{BlobPartition, BlobStore};
use crate::error::FetchError;
use crate::request::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RequestPipeline};

/// Default freshness window for persisted entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Invoked with the resolved blob when a registered URL settles successfully
pub type SuccessCallback = Box<dyn FnOnce(Bytes) + Send>;

/// Invoked with the failure when a registered URL settles unsuccessfully
pub type FailureCallback = Box<dyn FnOnce(&FetchError) + Send>;

type CompletionHook = Box<dyn Fn(&str) + Send + Sync>;

type Registration = (SuccessCallback, Option<FailureCallback>);

/// Deduplicating, TTL-based cache coordinator over [`RequestPipeline`].
///
/// Registrations accumulate via [`add`](Self::add) and are resolved by the
/// next [`run`](Self::run); each callback pair fires exactly once per run,
/// success or failure. Without an injected [`BlobStore`] the coordinator
/// still honors the full batching contract and only skips persistence.
pub struct CacheCoordinator {
    name: String,
    client: Client,
    store: Option<Arc<dyn BlobStore>>,
    partition: OnceCell<Option<Arc<dyn BlobPartition>>>,
    ttl: Mutex<Duration>,
    retry: Mutex<(u32, Duration)>,
    pending: Mutex<HashMap<String, Vec<Registration>>>,
    hooks: Mutex<Vec<CompletionHook>>,
}

impl CacheCoordinator {
    /// Create a coordinator for the named cache. `store` is the persistence
    /// capability of the execution context; `None` runs in degraded
    /// fetch-only mode for the lifetime of the coordinator.
    pub fn new(
        name: impl Into<String>,
        client: Client,
        store: Option<Arc<dyn BlobStore>>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            store,
            partition: OnceCell::new(),
            ttl: Mutex::new(DEFAULT_TTL),
            retry: Mutex::new((DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)),
            pending: Mutex::new(HashMap::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Register interest in `url` for the next run. Multiple registrations
    /// for the same URL accumulate in insertion order and all receive the
    /// same resolved blob. Never triggers network activity.
    pub fn add(&self, url: impl Into<String>, on_success: impl FnOnce(Bytes) + Send + 'static) {
        self.register(url.into(), Box::new(on_success), None);
    }

    /// Like [`add`](Self::add), also registering a failure callback.
    pub fn add_with_failure(
        &self,
        url: impl Into<String>,
        on_success: impl FnOnce(Bytes) + Send + 'static,
        on_failure: impl FnOnce(&FetchError) + Send + 'static,
    ) {
        self.register(url.into(), Box::new(on_success), Some(Box::new(on_failure)));
    }

    fn register(&self, url: String, on_success: SuccessCallback, on_failure: Option<FailureCallback>) {
        self.pending
            .lock()
            .entry(url)
            .or_default()
            .push((on_success, on_failure));
    }

    /// Override the freshness window used by future persistence operations.
    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.lock() = ttl;
    }

    /// Override the retry budget and starting backoff the coordinator hands
    /// to every pipeline it builds.
    pub fn set_retry_policy(&self, max_retries: u32, initial_delay: Duration) {
        *self.retry.lock() = (max_retries, initial_delay);
    }

    /// Register a hook invoked once per URL that resolves successfully
    /// during a run. Hooks accumulate until consumed by the next run.
    pub fn on_each_complete(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Open the store partition at most once for the coordinator's lifetime.
    /// A missing capability or failed open permanently disables persistence.
    async fn partition(&self) -> Option<Arc<dyn BlobPartition>> {
        self.partition
            .get_or_init(|| async {
                let store = self.store.as_ref()?;
                match store.open(&self.name).await {
                    Ok(partition) => Some(partition),
                    Err(err) => {
                        warn!(cache = %self.name, %err, "Failed to open store partition, persistence disabled");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Resolve a single URL outside the batch mechanism.
    ///
    /// A fresh persisted entry is served without touching the network. An
    /// expired entry is deleted before refetching; if the deletion does not
    /// succeed the stale blob is served rather than failing the caller. A
    /// miss (or degraded mode) fetches via the pipeline, persisting on
    /// success with expiry = fetch time + current TTL.
    pub async fn get(
        &self,
        url: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Bytes, FetchError> {
        let Some(partition) = self.partition().await else {
            return self.fetch(url, cancel, None).await;
        };

        match partition.entry(url).await? {
            None => self.fetch(url, cancel, Some(partition)).await,
            Some(entry) => {
                if !entry.headers.is_expired(Utc::now()) {
                    debug!(url, "Serving fresh persisted blob");
                    return Ok(entry.blob);
                }

                match partition.delete(url).await {
                    Ok(true) => self.fetch(url, cancel, Some(partition)).await,
                    Ok(false) => {
                        warn!(url, "Stale entry vanished during delete, serving stale blob");
                        Ok(entry.blob)
                    }
                    Err(err) => {
                        warn!(url, %err, "Failed to delete stale entry, serving stale blob");
                        Ok(entry.blob)
                    }
                }
            }
        }
    }

    async fn fetch(
        &self,
        url: &str,
        cancel: Option<CancellationToken>,
        partition: Option<Arc<dyn BlobPartition>>,
    ) -> Result<Bytes, FetchError> {
        let (max_retries, initial_delay) = *self.retry.lock();
        let response = RequestPipeline::new(self.client.clone(), Method::GET, url)
            .with_retry(max_retries, initial_delay)
            .with_cancel(cancel)
            .dispatch()
            .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let blob = response.bytes().await?;

        if let Some(partition) = partition {
            let ttl = *self.ttl.lock();
            let headers = EntryHeaders::new(blob.len() as u64, expiry_from_now(ttl), content_type);

            // The blob is already in hand; a failed persist is not worth
            // failing the caller over.
            if let Err(err) = partition.put(url, blob.clone(), headers).await {
                warn!(url, %err, "Failed to persist fetched blob");
            }
        }

        Ok(blob)
    }

    /// Resolve every currently pending URL, fire all registered callbacks and
    /// completion hooks, and clear both lists. Returns only after every URL
    /// has settled; a failing URL never aborts its siblings. Registrations
    /// arriving while a run is in flight are deferred to the next run.
    pub async fn run(&self, cancel: Option<CancellationToken>) {
        let drained: Vec<(String, Vec<Registration>)> = self.pending.lock().drain().collect();
        let hooks: Vec<CompletionHook> = std::mem::take(&mut *self.hooks.lock());

        if self.store.is_none() {
            warn!(cache = %self.name, "Persistent store unavailable in this context, fetching without persistence");
        }

        let mut resolutions: FuturesUnordered<_> = drained
            .into_iter()
            .map(|(url, registrants)| {
                let cancel = cancel.clone();
                async move {
                    let outcome = self.get(&url, cancel).await;
                    (url, registrants, outcome)
                }
            })
            .collect();

        while let Some((url, registrants, outcome)) = resolutions.next().await {
            match outcome {
                Ok(blob) => {
                    for (on_success, _) in registrants {
                        on_success(blob.clone());
                    }
                    for hook in &hooks {
                        hook(&url);
                    }
                }
                Err(err) => {
                    debug!(url = %url, error = %err, "URL resolution failed, notifying registrants");
                    for (_, on_failure) in registrants {
                        if let Some(on_failure) = on_failure {
                            on_failure(&err);
                        }
                    }
                }
            }
        }
    }
}

/// Absolute expiry for an entry persisted now, saturating on overflow.
fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
