//! Error types for the download pipeline.
//!
//! Errors are scoped to the unit that failed: [`ArticleError`] never escapes
//! the article retry loop and [`CourseError`] never escapes the course loop.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::ApiError;
use crate::render::RenderError;
use crate::video::VideoError;

/// Directory or file I/O failure tied to a path.
#[derive(Debug, Error)]
#[error("IO error at {path}: {source}")]
pub struct FilesystemError {
    /// Path the operation targeted.
    pub path: PathBuf,
    /// The underlying IO error.
    #[source]
    pub source: std::io::Error,
}

impl FilesystemError {
    pub fn new(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Failure of a single article dispatch attempt.
#[derive(Debug, Error)]
pub enum ArticleError {
    /// Article content or video metadata could not be fetched.
    #[error("fetching article failed: {0}")]
    Fetch(#[from] ApiError),

    /// Inline or course video could not be acquired.
    #[error("video download failed: {0}")]
    Video(#[source] VideoError),

    /// Document snapshot generation failed.
    #[error("PDF generation failed: {0}")]
    Render(#[source] RenderError),

    /// Text export failed.
    #[error("Markdown generation failed: {0}")]
    Conversion(#[source] RenderError),

    /// Local directory/file handling failed.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// The run was cancelled while the attempt was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl From<VideoError> for ArticleError {
    fn from(error: VideoError) -> Self {
        match error {
            VideoError::Cancelled => Self::Cancelled,
            other => Self::Video(other),
        }
    }
}

/// Failure that aborts one course but not the batch.
#[derive(Debug, Error)]
pub enum CourseError {
    /// The configured identifier is not a number.
    #[error("invalid course id: {raw}")]
    InvalidId {
        /// The identifier as configured.
        raw: String,
    },

    /// Course metadata could not be loaded.
    #[error("loading course {course_id} failed: {source}")]
    Metadata {
        course_id: u64,
        #[source]
        source: ApiError,
    },

    /// Output directories could not be created.
    #[error("creating directories failed: {0}")]
    Filesystem(#[from] FilesystemError),

    /// An unexpected fault (panic) was caught at the course boundary.
    #[error("internal fault: {0}")]
    Internal(String),
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
