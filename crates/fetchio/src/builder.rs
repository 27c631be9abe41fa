//! # Builder for RequestConfig
//!
//! Fluent API for creating and customizing [`RequestConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fetchio_engine::RequestConfig;
//!
//! let config = RequestConfig::builder()
//!     .with_base_url("https://api.example.com")
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use crate::RequestConfig;

/// Builder for creating RequestConfig instances with a fluent API
#[derive(Debug, Clone, Default)]
pub struct RequestConfigBuilder {
    config: RequestConfig,
}

impl RequestConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RequestConfig::default(),
        }
    }

    /// Set the base URL joined to relative paths
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the overall timeout for a single HTTP attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection establishment timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable or disable following redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom header applied to every request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(header_name), Ok(header_value)) = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.config.headers.insert(header_name, header_value);
        }
        self
    }

    /// Set the directory where downloaded files are saved
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    /// Build the final RequestConfig
    pub fn build(self) -> RequestConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_overrides() {
        let config = RequestConfigBuilder::new()
            .with_base_url("https://api.example.com/")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent")
            .with_header("x-access-key", "abc")
            .build();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com/"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.headers.get("x-access-key").unwrap(), "abc");
    }

    #[test]
    fn invalid_header_is_ignored() {
        let config = RequestConfigBuilder::new()
            .with_header("bad header name", "value")
            .build();
        assert!(config.headers.get("bad header name").is_none());
    }
}
