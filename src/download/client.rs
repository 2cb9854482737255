//! HTTP client construction shared by the platform API and video transfers.
//!
//! One [`HttpClient`] is built per session and cloned freely; clones share
//! the connection pool and the session cookie jar.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{debug, instrument};

/// Default connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout between received chunks (5 minutes).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Browser User-Agent sent with every request; the platform rejects tool UAs.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Connect/read timeout budget for the session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect_secs: u64,
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Reusable HTTP client, optionally carrying session cookies.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client without cookies (used for public media hosts).
    ///
    /// # Errors
    ///
    /// Returns the builder error if TLS or proxy configuration fails.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(None, timeouts)?,
        })
    }

    /// Creates a client that attaches cookies from `cookie_jar` to matching requests.
    ///
    /// # Errors
    ///
    /// Returns the builder error if TLS or proxy configuration fails.
    #[instrument(level = "debug", skip(cookie_jar))]
    pub fn with_cookie_jar(
        cookie_jar: Arc<Jar>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(Some(cookie_jar), timeouts)?,
        })
    }

    /// Borrow the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn build_client(cookie_jar: Option<Arc<Jar>>, timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    debug!(
        connect_secs = timeouts.connect_secs,
        read_secs = timeouts.read_secs,
        cookies = cookie_jar.is_some(),
        "building HTTP client"
    );
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .read_timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(BROWSER_USER_AGENT);
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder.build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.connect_secs, 30);
        assert_eq!(timeouts.read_secs, 300);
    }

    #[test]
    fn test_client_builds_with_and_without_jar() {
        assert!(HttpClient::new(HttpTimeouts::default()).is_ok());
        let jar = Arc::new(Jar::default());
        assert!(HttpClient::with_cookie_jar(jar, HttpTimeouts::default()).is_ok());
    }
}
