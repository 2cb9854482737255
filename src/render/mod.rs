//! Document snapshot and text export collaborators.
//!
//! Both collaborators check for an existing artifact themselves and report
//! whether they actually wrote a file, which drives the article's skip flag.

mod error;
mod markdown;
mod pdf;

use std::path::Path;

use async_trait::async_trait;

pub use error::RenderError;
pub use markdown::{MarkdownConverter, html_to_markdown};
pub use pdf::{BROWSER_CANDIDATES, ChromePdfRenderer, locate_browser};

/// One article to render into `dir`.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Article title; the artifact is named after it (sanitized).
    pub title: &'a str,
    /// Article HTML body.
    pub html: &'a str,
    /// Destination directory, already created.
    pub dir: &'a Path,
    /// Replace an existing artifact instead of skipping.
    pub overwrite: bool,
}

/// Produces the document snapshot (PDF) of an article.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Renders the job; returns `true` when a new file was written.
    async fn render(&self, job: &RenderJob<'_>) -> Result<bool, RenderError>;
}

/// Produces the lightweight text export (Markdown) of an article.
#[async_trait]
pub trait TextConverter: Send + Sync {
    /// Converts the job; returns `true` when a new file was written.
    async fn convert(&self, job: &RenderJob<'_>) -> Result<bool, RenderError>;
}
