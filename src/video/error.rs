//! Error types for video acquisition.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

/// Failure while resolving or fetching a video.
#[derive(Debug, Error)]
pub enum VideoError {
    /// Play info for a course video could not be loaded.
    #[error("video info unavailable: {0}")]
    Info(#[from] ApiError),

    /// The platform returned no playable variant.
    #[error("no playable video for article {article_id}")]
    NoVariant { article_id: u64 },

    /// Network-level error while fetching a file or segment.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The media host answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// A URL in the platform response or playlist was not usable.
    #[error("invalid video URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The playlist could not be parsed.
    #[error("invalid playlist {url}: {reason}")]
    Playlist { url: String, reason: String },

    /// Segments are encrypted; decryption is not supported.
    #[error("encrypted stream {url} is not supported")]
    Encrypted { url: String },

    /// File or directory I/O failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker task ended abnormally.
    #[error("video worker failed: {0}")]
    Worker(String),

    /// Cancellation was observed between units.
    #[error("video download cancelled")]
    Cancelled,
}

impl VideoError {
    pub(crate) fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = VideoError::HttpStatus {
            url: "https://cdn.example.com/seg-3.ts".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching https://cdn.example.com/seg-3.ts");

        let err = VideoError::NoVariant { article_id: 12 };
        assert!(err.to_string().contains("12"));
    }
}
