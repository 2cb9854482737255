//! Error types for platform API calls.

use thiserror::Error;

/// Errors returned by [`CourseApi`](super::CourseApi) operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The session cookies were rejected (HTTP 401/403).
    #[error("session rejected (HTTP {status}) requesting {url}")]
    Unauthorized { url: String, status: u16 },

    /// The account endpoint answered but refused the session.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Non-success HTTP status other than an auth rejection.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus { url: String, status: u16 },

    /// The platform envelope carried a non-zero code.
    #[error("platform error {code} from {url}: {message}")]
    Platform {
        url: String,
        code: i64,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// True for failures that mean the session itself is invalid.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Auth { .. })
    }

    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_classification() {
        assert!(
            ApiError::Unauthorized {
                url: "u".into(),
                status: 401
            }
            .is_auth()
        );
        assert!(
            ApiError::Auth {
                message: "expired".into()
            }
            .is_auth()
        );
        assert!(
            !ApiError::HttpStatus {
                url: "u".into(),
                status: 500
            }
            .is_auth()
        );
    }

    #[test]
    fn test_platform_error_display() {
        let err = ApiError::Platform {
            url: "https://example.com/serv/v1/article".into(),
            code: -3050,
            message: "not purchased".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("-3050"));
        assert!(msg.contains("not purchased"));
    }
}
