//! Download orchestration pipeline.
//!
//! Control flows top-down through:
//!
//! - [`CourseTraversalController`]: courses in order, one at a time
//! - [`ArticleRetryScheduler`]: bounded retries per article
//! - [`FormatDispatcher`]: inline video, clips, PDF and Markdown stages
//!
//! with the [`RateLimiter`] pacing articles and the [`ArtifactStore`]
//! deciding what can be skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use course_downloader::api::{CourseApi, HttpCourseApi};
//! use course_downloader::download::{ArtifactStore, CourseTraversalController, FormatDispatcher};
//! use course_downloader::model::FormatSelection;
//! use course_downloader::render::MarkdownConverter;
//! use course_downloader::video::VideoAcquirer;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(api: HttpCourseApi) {
//! let cancel = CancellationToken::new();
//! let video = VideoAcquirer::new(api.http(), 4, cancel.clone());
//! let api: Arc<dyn CourseApi> = Arc::new(api);
//! let dispatcher = FormatDispatcher::new(
//!     Arc::clone(&api),
//!     video,
//!     Arc::new(MarkdownConverter::new()),
//!     FormatSelection::MARKDOWN,
//! );
//! let controller =
//!     CourseTraversalController::new(api, ArtifactStore::new("downloads"), dispatcher, cancel);
//! let summary = controller.run_batch(&["100".to_string()]).await;
//! println!("{} articles downloaded", summary.articles_downloaded);
//! # }
//! ```

mod client;
mod dispatcher;
mod error;
mod error_log;
mod filename;
mod progress;
pub mod rate_limiter;
mod retry;
mod store;
mod traversal;

pub use client::{
    BROWSER_USER_AGENT, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpClient,
    HttpTimeouts,
};
pub use dispatcher::FormatDispatcher;
pub use error::{ArticleError, CourseError, FilesystemError};
pub use error_log::ErrorLog;
pub use filename::sanitize_filename;
pub use progress::CourseProgress;
pub use rate_limiter::{DEFAULT_MAX_JITTER, RateLimiter, sleep_or_cancel};
pub use retry::{
    ArticleReport, ArticleRetryScheduler, ArticleStatus, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
    RetryDecision, RetryPolicy,
};
pub use store::{
    ArtifactStore, CourseDirs, MARKDOWN_EXTENSION, MP4_EXTENSION, PDF_EXTENSION, TS_EXTENSION,
    artifact_path, create_dir_all, should_skip, staging_path,
};
pub use traversal::{
    BatchSummary, CourseReport, CourseStatus, CourseTraversalController, DEFAULT_COURSE_DELAY,
    SingleCourseRequest,
};
