//! # Request Pipeline
//!
//! A single-use HTTP request primitive with configurable retry budget,
//! exponential backoff and external cancellation. One instance drives one
//! logical request; once it settles the instance is consumed.
//!
//! Two execution paths with deliberately different failure policies:
//! [`RequestPipeline::dispatch`] retries any non-2xx outcome until the budget
//! runs out, while [`RequestPipeline::send`] is single-shot and only treats
//! application-level envelope errors as fatal.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};
use url::Url;

use crate::config::RequestConfig;
use crate::envelope::{ApiEnvelope, ApiResponse};
use crate::error::FetchError;

/// Default retry budget for [`RequestPipeline::dispatch`]
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default starting backoff delay, doubled after each failed attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

const DEFAULT_DOWNLOAD_NAME: &str = "download.csv";

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="([^"]+)""#).expect("valid filename pattern"));

/// A retrying, cancellable HTTP request bound to one target URL.
pub struct RequestPipeline {
    client: Client,
    method: Method,
    path: String,
    base_url: Option<String>,
    headers: HeaderMap,
    body: Option<Value>,
    max_retries: u32,
    backoff: Duration,
    attempts: u32,
    download_dir: PathBuf,
    abort: CancellationToken,
    // Cancels `abort` when the pipeline settles so cancel forwarders exit.
    _abort_guard: DropGuard,
}

impl RequestPipeline {
    /// Create a pipeline for one request. `path` may be an absolute URL, or a
    /// path relative to a base registered via [`with_base`](Self::with_base).
    pub fn new(client: Client, method: Method, path: impl Into<String>) -> Self {
        let abort = CancellationToken::new();
        let guard = abort.clone().drop_guard();

        Self {
            client,
            method,
            path: path.into(),
            base_url: None,
            headers: HeaderMap::new(),
            body: None,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_RETRY_DELAY,
            attempts: 0,
            download_dir: std::env::temp_dir(),
            abort,
            _abort_guard: guard,
        }
    }

    /// Create a pipeline pre-wired from a [`RequestConfig`]: the config's
    /// base URL (trimmed of any trailing slash) joins relative paths, and
    /// its download directory receives [`download`](Self::download) bodies.
    /// Timeouts, user agent and default headers are client-level concerns;
    /// pair this with [`create_client`](crate::create_client).
    pub fn from_config(
        client: Client,
        method: Method,
        path: impl Into<String>,
        config: &RequestConfig,
    ) -> Self {
        let mut pipeline = Self::new(client, method, path);
        pipeline.base_url = config.trimmed_base().map(str::to_string);
        pipeline.download_dir = config.download_dir.clone();
        pipeline
    }

    /// Set the base URL joined in front of a relative path.
    /// A trailing slash on the base is trimmed before joining.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    /// Override the retry budget and starting backoff delay.
    pub fn with_retry(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = initial_delay;
        self
    }

    /// Register an external cancellation source. `None` is a no-op. Every
    /// registered source trips the same internal abort signal shared by all
    /// attempts of this pipeline.
    pub fn with_cancel(self, source: Option<CancellationToken>) -> Self {
        if let Some(source) = source {
            if source.is_cancelled() {
                self.abort.cancel();
                return self;
            }

            let abort = self.abort.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = source.cancelled() => abort.cancel(),
                    // Pipeline settled, nothing left to cancel.
                    _ = abort.cancelled() => {}
                }
            });
        }
        self
    }

    /// Override the directory [`download`](Self::download) saves into.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Attach an auth credential. A three-segment signed token becomes a
    /// bearer credential; anything else is sent as a raw access key.
    pub fn credential(mut self, token: &str) -> Self {
        if token.split('.').count() == 3 {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    self.headers.insert(AUTHORIZATION, value);
                }
                Err(err) => warn!(%err, "Failed to encode bearer credential, sending none"),
            }
        } else {
            match HeaderValue::from_str(token) {
                Ok(value) => {
                    self.headers.insert("x-access-key", value);
                }
                Err(err) => warn!(%err, "Failed to encode access key, sending none"),
            }
        }
        self
    }

    /// Serialize a payload as the JSON request body.
    pub fn json_body(mut self, payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => self.body = Some(value),
            Err(err) => warn!(%err, "Failed to serialize request body, sending none"),
        }
        self
    }

    /// Replace the header set for this request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    fn target_url(&self) -> Result<Url, FetchError> {
        let raw = match self.base_url.as_deref() {
            Some(base) => format!("{}{}", base.strip_suffix('/').unwrap_or(base), self.path),
            None => self.path.clone(),
        };

        Url::parse(&raw).map_err(|e| FetchError::Url(format!("{raw}: {e}")))
    }

    fn build_attempt(&self, url: &Url) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(self.method.clone(), url.clone())
            .headers(self.headers.clone());

        if let Some(body) = &self.body {
            builder = builder.json(body);
        }

        builder
    }

    /// Execute the retrying attempt loop and return the final response.
    ///
    /// Any non-2xx status is a retryable failure, identical to a transport
    /// failure: the attempt counter is incremented, the current backoff delay
    /// is slept (then doubled), and another attempt is made until the budget
    /// is exhausted. Cancellation is never retried and never consumes budget.
    pub async fn dispatch(mut self) -> Result<Response, FetchError> {
        let url = self.target_url()?;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.build_attempt(&url).send() => outcome,
            };

            let failure = match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => FetchError::Status(response.status()),
                Err(err) => FetchError::Http(err),
            };

            self.attempts += 1;
            if self.attempts > self.max_retries {
                return Err(FetchError::RetriesExhausted {
                    retries: self.max_retries,
                    attempts: self.attempts,
                    last: Box::new(failure),
                });
            }

            warn!(
                url = %url,
                attempt = self.attempts,
                delay_ms = self.backoff.as_millis() as u64,
                error = %failure,
                "Retrying fetch"
            );

            tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(self.backoff) => {}
            }

            self.backoff = self.backoff.saturating_mul(2);
        }
    }

    /// Execute a single non-retried exchange and parse the JSON envelope.
    pub async fn send(self) -> Result<ApiResponse<Value>, FetchError> {
        self.send_with(std::convert::identity).await
    }

    /// Like [`send`](Self::send), applying a transform to the `data` field.
    ///
    /// A status >= 500 carrying a message (or a first error element) rejects
    /// with that reason; a non-null `error` array rejects regardless of
    /// status.
    pub async fn send_with<T>(
        mut self,
        transform: impl FnOnce(Value) -> T,
    ) -> Result<ApiResponse<T>, FetchError> {
        let url = self.target_url()?;

        for (name, value) in [(ACCEPT, "application/json"), (CONTENT_TYPE, "application/json")] {
            self.headers
                .entry(name)
                .or_insert(HeaderValue::from_static(value));
        }

        let response = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(FetchError::Cancelled),
            outcome = self.build_attempt(&url).send() => outcome?,
        };

        let status = response.status();
        let envelope: ApiEnvelope = response.json().await?;

        if status.as_u16() >= 500
            && let Some(reason) = envelope.failure_reason()
        {
            return Err(FetchError::Envelope(reason.to_string()));
        }

        if let Some(errors) = &envelope.error {
            let reason = errors
                .first()
                .cloned()
                .unwrap_or_else(|| "unspecified server error".to_string());
            return Err(FetchError::Envelope(reason));
        }

        Ok(ApiResponse::new(
            envelope.code,
            transform(envelope.data),
            envelope.error,
        ))
    }

    /// Execute a one-shot exchange expecting a binary body and save it under
    /// the configured download directory, named by the Content-Disposition
    /// header. Returns whether the status code indicated success; a non-OK
    /// status writes nothing.
    pub async fn download(mut self) -> Result<bool, FetchError> {
        let url = self.target_url()?;

        // Binary exchange, the JSON defaults never apply.
        self.headers.remove(ACCEPT);
        self.headers.remove(CONTENT_TYPE);

        let response = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(FetchError::Cancelled),
            outcome = self.build_attempt(&url).send() => outcome?,
        };

        if response.status() != StatusCode::OK {
            return Ok(false);
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());

        let body = response.bytes().await?;
        let dest = self.download_dir.join(&filename);
        tokio::fs::write(&dest, &body).await?;

        debug!(path = ?dest, bytes = body.len(), "Saved download");
        Ok(true)
    }
}

/// Extract the quoted filename from a Content-Disposition header value,
/// reduced to its final path component so a hostile header cannot escape the
/// destination directory.
fn filename_from_disposition(value: &str) -> Option<String> {
    let captured = FILENAME_RE.captures(value)?.get(1)?.as_str();

    Path::new(captured)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}
