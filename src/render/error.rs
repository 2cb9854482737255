//! Error types for document snapshots and text exports.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while producing a PDF snapshot or a Markdown export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No Chrome/Chromium executable could be located.
    #[error("no Chrome or Chromium browser found (looked for {searched})")]
    SnapshotBrowserMissing { searched: String },

    /// The browser process could not be started.
    #[error("failed to launch {browser}: {source}")]
    SnapshotLaunch {
        browser: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The browser did not finish within the hard timeout.
    #[error("PDF rendering timed out after {secs}s")]
    SnapshotTimeout { secs: u64 },

    /// The browser exited unsuccessfully or produced no file.
    #[error("PDF rendering failed: {reason}")]
    SnapshotFailed { reason: String },

    /// The article body could not be turned into Markdown.
    #[error("Markdown conversion produced no content for {title}")]
    ConversionEmpty { title: String },

    /// Reading or writing a render artifact failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
