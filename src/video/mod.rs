//! Video acquisition: inline `.mp4` clips and session-scoped course videos.
//!
//! [`VideoAcquirer`] owns the bounded worker pool used for every transfer.
//! The target files are checked before any network request, so an existing
//! video costs nothing when `overwrite` is off.
//!
//! # Layout
//!
//! - Inline clips: `<dir>/<title>.mp4`, or `<dir>/<title>-<n>.mp4` when an
//!   article lists several.
//! - Course videos: `<dir>/<title>.ts`.

mod detect;
mod error;
mod hls;
mod pool;
mod transfer;

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub use detect::find_inline_video;
pub use error::VideoError;
pub use hls::is_playlist_url;

use crate::api::CourseApi;
use crate::download::{HttpClient, MP4_EXTENSION, TS_EXTENSION, artifact_path, should_skip};
use crate::model::{Article, DownloadOutcome, SessionScope, VideoQuality, VideoVariant};
use pool::{FetchUnit, fetch_all};

/// Default worker count: half the available parallelism, rounded up.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .div_ceil(2)
}

/// Picks the variant whose quality label matches, else the first one.
#[must_use]
pub fn select_variant(variants: &[VideoVariant], quality: VideoQuality) -> Option<&VideoVariant> {
    variants
        .iter()
        .find(|v| v.quality.eq_ignore_ascii_case(quality.as_str()))
        .or_else(|| variants.first())
}

/// Fetches video assets with a bounded worker pool.
#[derive(Debug, Clone)]
pub struct VideoAcquirer {
    client: Client,
    concurrency: usize,
    cancel: CancellationToken,
}

impl VideoAcquirer {
    /// Creates an acquirer sharing the session client's pool and cookies.
    #[must_use]
    pub fn new(http: &HttpClient, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            client: http.inner().clone(),
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads directly addressable `.mp4` files named after `title`.
    ///
    /// Files already present are not requested again; the outcome is
    /// skipped only when every file was present.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError`] if any file fails or the run is cancelled.
    #[instrument(skip(self, urls), fields(dir = %dir.display(), count = urls.len()))]
    pub async fn fetch_direct(
        &self,
        title: &str,
        dir: &Path,
        urls: &[String],
        overwrite: bool,
    ) -> Result<DownloadOutcome, VideoError> {
        let targets = direct_targets(dir, title, urls.len());
        let units: Vec<FetchUnit> = urls
            .iter()
            .zip(targets)
            .filter(|(_, target)| !should_skip(target, overwrite))
            .map(|(url, target)| FetchUnit {
                url: url.trim().to_string(),
                target,
            })
            .collect();

        if units.is_empty() {
            debug!(title, "videos already present");
            return Ok(DownloadOutcome::skipped());
        }
        if self.cancel.is_cancelled() {
            return Err(VideoError::Cancelled);
        }

        let bytes = fetch_all(&self.client, units, self.concurrency, &self.cancel).await?;
        info!(title, bytes, "video downloaded");
        Ok(DownloadOutcome::written())
    }

    /// Downloads a video-course article to `<dir>/<title>.ts`.
    ///
    /// The play info request is scoped by `scope`; the rendition is chosen
    /// by `quality` with a fallback to the first one offered.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError`] when play info, playlist or segments fail.
    #[instrument(skip(self, api, article), fields(article_id = article.id, scope = %scope))]
    pub async fn fetch_course_video(
        &self,
        api: &dyn CourseApi,
        article: &Article,
        scope: SessionScope,
        dir: &Path,
        quality: VideoQuality,
        overwrite: bool,
    ) -> Result<DownloadOutcome, VideoError> {
        let target = artifact_path(dir, &article.title, TS_EXTENSION);
        if should_skip(&target, overwrite) {
            debug!(path = %target.display(), "video already present");
            return Ok(DownloadOutcome::skipped());
        }
        if self.cancel.is_cancelled() {
            return Err(VideoError::Cancelled);
        }

        let variants = api.video_variants(article.id, scope).await?;
        let variant = select_variant(&variants, quality).ok_or(VideoError::NoVariant {
            article_id: article.id,
        })?;
        debug!(quality = %variant.quality, url = %variant.url, "selected video variant");

        let bytes = if is_playlist_url(&variant.url) {
            hls::download_hls(&self.client, &variant.url, &target, self.concurrency, &self.cancel).await?
        } else {
            let unit = FetchUnit {
                url: variant.url.clone(),
                target: target.clone(),
            };
            fetch_all(&self.client, vec![unit], self.concurrency, &self.cancel).await?
        };
        info!(path = %target.display(), bytes, "course video downloaded");
        Ok(DownloadOutcome::written())
    }
}

fn direct_targets(dir: &Path, title: &str, count: usize) -> Vec<PathBuf> {
    if count == 1 {
        return vec![artifact_path(dir, title, MP4_EXTENSION)];
    }
    (1..=count)
        .map(|n| artifact_path(dir, &format!("{title}-{n}"), MP4_EXTENSION))
        .collect()
}
