use reqwest::StatusCode;

// Custom error type for fetch operations
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Server returned status code {0}")]
    Status(StatusCode),

    #[error("Max retries ({retries}) exceeded after {attempts} attempts: {last}")]
    RetriesExhausted {
        retries: u32,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Server error: {0}")]
    Envelope(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether this outcome was caused by an external cancellation source.
    /// Cancellations are terminal and must never be confused with transport
    /// failures, so callers branch on this rather than matching variants.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
