use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str = concat!("fetchio-engine/", env!("CARGO_PKG_VERSION"));

/// Configurable options for request construction
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Base URL prepended to relative paths for API exchanges.
    /// A trailing slash is trimmed before joining.
    pub base_url: Option<String>,

    /// Overall timeout for a single HTTP attempt
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers attached to every request
    pub headers: HeaderMap,

    /// Directory where `download()` saves response bodies
    pub download_dir: PathBuf,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: RequestConfig::get_default_headers(),
            download_dir: std::env::temp_dir(),
        }
    }
}

impl RequestConfig {
    pub fn builder() -> crate::builder::RequestConfigBuilder {
        crate::builder::RequestConfigBuilder::new()
    }

    /// Base URL with any trailing slash removed, ready for path concatenation.
    pub fn trimmed_base(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|base| base.strip_suffix('/').unwrap_or(base))
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_base_strips_trailing_slash() {
        let config = RequestConfig {
            base_url: Some("https://api.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.trimmed_base(), Some("https://api.example.com"));
    }

    #[test]
    fn trimmed_base_leaves_clean_base_alone() {
        let config = RequestConfig {
            base_url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(config.trimmed_base(), Some("https://api.example.com"));
        assert_eq!(RequestConfig::default().trimmed_base(), None);
    }
}
