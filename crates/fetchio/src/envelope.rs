//! # Response Envelope
//!
//! Wire shape expected from JSON-speaking endpoints:
//! `{ code: number, data: any, error: string[]|null, message?: string }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw envelope as deserialized off the wire
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub code: u16,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiEnvelope {
    /// First element of the error array, if any
    pub fn first_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .and_then(|errors| errors.first())
            .map(String::as_str)
    }

    /// Fatal reason for a server-side failure: the envelope message,
    /// falling back to the first error element.
    pub fn failure_reason(&self) -> Option<&str> {
        self.message.as_deref().or_else(|| self.first_error())
    }
}

/// Normalized response handed back to callers of `send`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub data: T,
    pub error: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn new(code: u16, data: T, error: Option<Vec<String>>) -> Self {
        Self { code, data, error }
    }
}
