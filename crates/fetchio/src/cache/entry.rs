//! # Persisted Entry Types
//!
//! A persisted entry is a raw byte blob plus the string header set stored
//! alongside it: content length, an absolute `Expires` timestamp as an
//! HTTP-date, and the content type. Staleness is decided lazily on access by
//! comparing the stored expiry against the current time; nothing recomputes
//! the expiry after the original persistence.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Header set persisted with each cached blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeaders {
    /// Content-Length of the blob in bytes
    pub content_length: u64,
    /// Expires header, an absolute HTTP-date in UTC
    pub expires: String,
    /// Content-Type reported by the origin, if any
    pub content_type: Option<String>,
}

impl EntryHeaders {
    /// Build the header set for a blob fetched now, expiring after `ttl`.
    pub fn new(content_length: u64, expires_at: DateTime<Utc>, content_type: Option<String>) -> Self {
        Self {
            content_length,
            expires: expires_at.format(HTTP_DATE_FORMAT).to_string(),
            content_type,
        }
    }

    /// Parse the stored expiry. An absent or unparseable value maps to the
    /// epoch, which reads as already expired.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc2822(&self.expires)
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
    }

    /// An entry is fresh iff `now < expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// A blob and its headers as read back from the persistent store
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub blob: Bytes,
    pub headers: EntryHeaders,
}

impl StoredEntry {
    pub fn new(blob: Bytes, headers: EntryHeaders) -> Self {
        Self { blob, headers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn formats_http_date() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 30, 0).unwrap();
        let headers = EntryHeaders::new(42, at, Some("image/png".to_string()));
        assert_eq!(headers.expires, "Sun, 09 Mar 2025 12:30:00 GMT");
        assert_eq!(headers.expires_at(), at);
    }

    #[test]
    fn future_expiry_is_fresh() {
        let now = Utc::now();
        let headers = EntryHeaders::new(1, now + Duration::hours(6), None);
        assert!(!headers.is_expired(now));
        assert!(headers.is_expired(now + Duration::hours(7)));
    }

    #[test]
    fn unparseable_expiry_reads_as_expired() {
        let headers = EntryHeaders {
            content_length: 1,
            expires: "not a date".to_string(),
            content_type: None,
        };
        assert!(headers.is_expired(Utc::now()));
    }

    #[test]
    fn zero_ttl_is_immediately_stale() {
        let now = Utc::now();
        let headers = EntryHeaders::new(1, now, None);
        assert!(headers.is_expired(now));
    }

    #[test]
    fn headers_roundtrip_through_json() {
        let headers = EntryHeaders::new(7, Utc::now() + Duration::minutes(5), Some("text/css".into()));
        let json = serde_json::to_vec(&headers).unwrap();
        let back: EntryHeaders = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, headers);
    }
}
