//! Per-article format dispatch.
//!
//! For a text article the stages run in a fixed order: videos (the embedded
//! one first, then listed clips), PDF snapshot, Markdown export. The first
//! failing stage ends the attempt. Only the PDF and Markdown stages decide whether the attempt
//! counts as skipped; video writes do not clear the flag.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::error::ArticleError;
use super::store::{CourseDirs, create_dir_all};
use crate::api::CourseApi;
use crate::model::{Article, DownloadOutcome, FormatSelection, SessionScope, VideoQuality};
use crate::render::{BROWSER_CANDIDATES, DocumentRenderer, RenderError, RenderJob, TextConverter};
use crate::video::{VideoAcquirer, find_inline_video};

/// Runs the requested output stages for one article.
#[derive(Clone)]
pub struct FormatDispatcher {
    api: Arc<dyn CourseApi>,
    video: VideoAcquirer,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    converter: Arc<dyn TextConverter>,
    formats: FormatSelection,
}

impl std::fmt::Debug for FormatDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatDispatcher")
            .field("formats", &self.formats)
            .field("has_renderer", &self.renderer.is_some())
            .field("video", &self.video)
            .finish_non_exhaustive()
    }
}

impl FormatDispatcher {
    /// Creates a dispatcher without a PDF renderer.
    #[must_use]
    pub fn new(
        api: Arc<dyn CourseApi>,
        video: VideoAcquirer,
        converter: Arc<dyn TextConverter>,
        formats: FormatSelection,
    ) -> Self {
        Self {
            api,
            video,
            renderer: None,
            converter,
            formats,
        }
    }

    /// Attaches the document renderer used when PDF output is requested.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn formats(&self) -> FormatSelection {
        self.formats
    }

    /// Runs one attempt for a text article.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages are not attempted.
    #[instrument(skip(self, article, dirs), fields(article_id = article.id))]
    pub async fn dispatch_text(
        &self,
        article: &Article,
        dirs: &CourseDirs,
        overwrite: bool,
    ) -> Result<DownloadOutcome, ArticleError> {
        let content = self.api.article_content(article.id).await?;

        let mut urls: Vec<String> = Vec::new();
        if let Some(url) = find_inline_video(&content.html) {
            debug!(%url, "article embeds a video");
            urls.push(url);
        }
        if !content.inline_videos.is_empty() {
            debug!(count = content.inline_videos.len(), "article lists video clips");
            urls.extend(content.inline_videos.iter().map(|clip| clip.video_url.clone()));
        }
        // One batch so an embedded video and listed clips get distinct numbered names.
        if !urls.is_empty() {
            self.video
                .fetch_direct(&article.title, &dirs.pdf_dir, &urls, overwrite)
                .await?;
        }

        let mut skipped = true;

        if self.formats.wants_pdf() {
            let renderer = self.renderer.as_ref().ok_or_else(|| {
                ArticleError::Render(RenderError::SnapshotBrowserMissing {
                    searched: BROWSER_CANDIDATES.join(", "),
                })
            })?;
            let job = render_job(article, &content.html, &dirs.pdf_dir, overwrite);
            let wrote = renderer.render(&job).await.map_err(ArticleError::Render)?;
            skipped &= !wrote;
        }

        if self.formats.wants_markdown() {
            let job = render_job(article, &content.html, &dirs.markdown_dir, overwrite);
            let wrote = self
                .converter
                .convert(&job)
                .await
                .map_err(ArticleError::Conversion)?;
            skipped &= !wrote;
        }

        Ok(DownloadOutcome { skipped })
    }

    /// Runs one attempt for a video-course article into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ArticleError`] when the directory or the video fails.
    #[instrument(skip(self, article, dir), fields(article_id = article.id))]
    pub async fn dispatch_video(
        &self,
        article: &Article,
        dir: &Path,
        scope: SessionScope,
        quality: VideoQuality,
        overwrite: bool,
    ) -> Result<DownloadOutcome, ArticleError> {
        create_dir_all(dir).await?;
        let outcome = self
            .video
            .fetch_course_video(self.api.as_ref(), article, scope, dir, quality, overwrite)
            .await?;
        Ok(outcome)
    }
}

fn render_job<'a>(article: &'a Article, html: &'a str, dir: &'a Path, overwrite: bool) -> RenderJob<'a> {
    RenderJob {
        title: &article.title,
        html,
        dir,
        overwrite,
    }
}
