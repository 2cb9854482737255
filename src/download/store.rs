//! Deterministic artifact paths and the "already downloaded" check.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/pdf/<course>/<article>.pdf
//! <root>/markdown/<course>/<article>.md
//! <root>/<course>/[<section>/]<article>.<ext>
//! <root>/error.txt
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::FilesystemError;
use super::filename::sanitize_filename;

const PDF_ROOT: &str = "pdf";
const MARKDOWN_ROOT: &str = "markdown";

pub const PDF_EXTENSION: &str = "pdf";
pub const MARKDOWN_EXTENSION: &str = "md";
pub const MP4_EXTENSION: &str = "mp4";
pub const TS_EXTENSION: &str = "ts";

/// Output directories for one text course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDirs {
    /// Document snapshots (and inline videos) land here.
    pub pdf_dir: PathBuf,
    /// Text exports land here.
    pub markdown_dir: PathBuf,
}

/// Resolves artifact paths from (course, article, format) without external state.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document/text directory pair for a text course (not created).
    #[must_use]
    pub fn course_dirs(&self, course_title: &str) -> CourseDirs {
        let course = sanitize_filename(course_title);
        CourseDirs {
            pdf_dir: self.root.join(PDF_ROOT).join(&course),
            markdown_dir: self.root.join(MARKDOWN_ROOT).join(course),
        }
    }

    /// Creates the directory pair for a text course.
    ///
    /// Creation is idempotent; an existing tree is fine.
    ///
    /// # Errors
    ///
    /// Returns [`FilesystemError`] naming the directory that could not be created.
    pub async fn create_course_dirs(&self, course_title: &str) -> Result<CourseDirs, FilesystemError> {
        let dirs = self.course_dirs(course_title);
        create_dir_all(&dirs.pdf_dir).await?;
        create_dir_all(&dirs.markdown_dir).await?;
        debug!(
            pdf_dir = %dirs.pdf_dir.display(),
            markdown_dir = %dirs.markdown_dir.display(),
            "course directories ready"
        );
        Ok(dirs)
    }

    /// Directory holding a video course's files (not created).
    #[must_use]
    pub fn video_course_dir(&self, course_title: &str) -> PathBuf {
        self.root.join(sanitize_filename(course_title))
    }

    /// Directory for one video article, honoring its optional section.
    #[must_use]
    pub fn video_article_dir(&self, course_title: &str, section_title: Option<&str>) -> PathBuf {
        let course_dir = self.video_course_dir(course_title);
        match section_title.filter(|s| !s.trim().is_empty()) {
            Some(section) => course_dir.join(sanitize_filename(section)),
            None => course_dir,
        }
    }

    /// Path of the append-only failure log.
    #[must_use]
    pub fn error_log_path(&self) -> PathBuf {
        self.root.join("error.txt")
    }
}

/// Builds `<dir>/<sanitized title>.<ext>`.
#[must_use]
pub fn artifact_path(dir: &Path, title: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{extension}", sanitize_filename(title)))
}

/// Returns true when an existing artifact lets the operation be skipped.
#[must_use]
pub fn should_skip(path: &Path, overwrite: bool) -> bool {
    !overwrite && path.is_file()
}

/// Staging path used while an artifact is being written (`<name>.part`).
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Creates a directory tree, mapping failures to [`FilesystemError`].
///
/// # Errors
///
/// Returns [`FilesystemError`] when the directory cannot be created.
pub async fn create_dir_all(dir: &Path) -> Result<(), FilesystemError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| FilesystemError::new(dir, source))
}
