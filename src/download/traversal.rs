//! Course traversal: batch and single-course runs.
//!
//! [`CourseTraversalController`] walks courses strictly one at a time and
//! articles strictly one at a time. Two isolation boundaries exist: every
//! article runs under the [`ArticleRetryScheduler`], and every course runs
//! under a guard that turns its errors and panics into a logged, failed
//! [`CourseReport`]. Nothing below the batch loop can end the run early
//! except cancellation.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::dispatcher::FormatDispatcher;
use super::error::{CourseError, panic_message};
use super::error_log::ErrorLog;
use super::progress::CourseProgress;
use super::rate_limiter::{RateLimiter, sleep_or_cancel};
use super::retry::{ArticleReport, ArticleRetryScheduler, ArticleStatus, RetryPolicy};
use super::store::{ArtifactStore, CourseDirs};
use crate::api::CourseApi;
use crate::model::{Article, Course, SessionScope, VideoQuality};

/// Default pause between two courses.
pub const DEFAULT_COURSE_DELAY: Duration = Duration::from_secs(3);

/// How a course ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    /// Every article reached a terminal state (including failed articles).
    Completed,
    /// The account is not entitled to the course; nothing was processed.
    NoAccess,
    /// A video course met in batch mode; nothing was processed.
    VideoSkipped,
    /// The course could not be processed at all.
    Failed,
    /// Cancellation stopped the course part-way.
    Cancelled,
}

/// Outcome of one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseReport {
    /// Identifier as configured (may not be numeric).
    pub course: String,
    /// Title, once metadata was loaded.
    pub title: Option<String>,
    pub status: CourseStatus,
    /// One report per processed article, in order.
    pub articles: Vec<ArticleReport>,
}

impl CourseReport {
    fn new(course: &str, title: Option<&str>, status: CourseStatus) -> Self {
        Self {
            course: course.to_string(),
            title: title.map(str::to_string),
            status,
            articles: Vec::new(),
        }
    }

    fn count(&self, status: ArticleStatus) -> usize {
        self.articles.iter().filter(|a| a.status == status).count()
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub courses_completed: usize,
    pub courses_skipped: usize,
    pub courses_failed: usize,
    pub articles_downloaded: usize,
    pub articles_skipped: usize,
    pub articles_failed: usize,
    pub cancelled: bool,
    pub reports: Vec<CourseReport>,
}

impl BatchSummary {
    fn record(&mut self, report: CourseReport) {
        match report.status {
            CourseStatus::Completed => self.courses_completed += 1,
            CourseStatus::NoAccess | CourseStatus::VideoSkipped => self.courses_skipped += 1,
            CourseStatus::Failed => self.courses_failed += 1,
            CourseStatus::Cancelled => self.cancelled = true,
        }
        self.articles_downloaded += report.count(ArticleStatus::Downloaded);
        self.articles_skipped += report.count(ArticleStatus::Skipped);
        self.articles_failed += report.count(ArticleStatus::Failed);
        self.reports.push(report);
    }

    /// Total dispatch attempts across all courses.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.reports
            .iter()
            .flat_map(|r| &r.articles)
            .map(|a| a.attempts)
            .sum()
    }
}

/// One course in single-course mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCourseRequest {
    pub course_id: u64,
    pub scope: SessionScope,
    pub quality: VideoQuality,
    /// Restrict to these article ids; empty means every article.
    pub article_ids: Vec<u64>,
    pub overwrite: bool,
}

enum DispatchPlan<'a> {
    Text {
        dirs: &'a CourseDirs,
    },
    Video {
        course_title: &'a str,
        scope: SessionScope,
        quality: VideoQuality,
    },
}

/// Drives courses and their articles through retry and dispatch.
pub struct CourseTraversalController {
    api: Arc<dyn CourseApi>,
    store: ArtifactStore,
    dispatcher: FormatDispatcher,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
    course_delay: Duration,
    error_log: ErrorLog,
    cancel: CancellationToken,
    show_progress: bool,
}

impl std::fmt::Debug for CourseTraversalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseTraversalController")
            .field("root", &self.store.root())
            .field("retry", &self.retry)
            .field("rate_limiter", &self.rate_limiter)
            .field("course_delay", &self.course_delay)
            .finish_non_exhaustive()
    }
}

impl CourseTraversalController {
    /// Creates a controller with the default retry policy, a 1s rate limit,
    /// a 3s course delay and `<root>/error.txt` as the error log.
    #[must_use]
    pub fn new(
        api: Arc<dyn CourseApi>,
        store: ArtifactStore,
        dispatcher: FormatDispatcher,
        cancel: CancellationToken,
    ) -> Self {
        let error_log = ErrorLog::new(store.error_log_path());
        Self {
            api,
            store,
            dispatcher,
            retry: RetryPolicy::default(),
            rate_limiter: RateLimiter::new(1),
            course_delay: DEFAULT_COURSE_DELAY,
            error_log,
            cancel,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    #[must_use]
    pub fn with_course_delay(mut self, course_delay: Duration) -> Self {
        self.course_delay = course_delay;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Processes the configured text courses in order.
    ///
    /// Course and article failures are logged and counted; this never fails.
    #[instrument(skip(self, course_ids), fields(courses = course_ids.len()))]
    pub async fn run_batch(&self, course_ids: &[String]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for raw in course_ids {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let report = self.guarded(raw, self.batch_course(raw)).await;
            let cancelled = report.status == CourseStatus::Cancelled;
            summary.record(report);
            if cancelled {
                break;
            }

            if !sleep_or_cancel(self.course_delay, &self.cancel).await {
                summary.cancelled = true;
                break;
            }
        }
        info!(
            courses_completed = summary.courses_completed,
            courses_skipped = summary.courses_skipped,
            courses_failed = summary.courses_failed,
            articles_downloaded = summary.articles_downloaded,
            articles_skipped = summary.articles_skipped,
            articles_failed = summary.articles_failed,
            cancelled = summary.cancelled,
            "batch finished"
        );
        summary
    }

    /// Processes one course of any kind, optionally restricted to some articles.
    #[instrument(skip(self, request), fields(course_id = request.course_id, scope = %request.scope))]
    pub async fn run_single_course(&self, request: &SingleCourseRequest) -> BatchSummary {
        let mut summary = BatchSummary::default();
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
            return summary;
        }
        let label = request.course_id.to_string();
        let report = self.guarded(&label, self.single_course(request)).await;
        summary.record(report);
        summary
    }

    /// Course isolation boundary: errors and panics become a failed report.
    async fn guarded<F>(&self, course: &str, work: F) -> CourseReport
    where
        F: Future<Output = Result<CourseReport, CourseError>>,
    {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(report)) => report,
            Ok(Err(error)) => {
                self.error_log.record(&format!("course {course} failed: {error}"));
                CourseReport::new(course, None, CourseStatus::Failed)
            }
            Err(payload) => {
                let error = CourseError::Internal(panic_message(payload.as_ref()));
                self.error_log.record(&format!("course {course} failed: {error}"));
                CourseReport::new(course, None, CourseStatus::Failed)
            }
        }
    }

    async fn batch_course(&self, raw: &str) -> Result<CourseReport, CourseError> {
        let course_id = parse_course_id(raw)?;
        let course = self.load_course(course_id, SessionScope::Standard).await?;

        if let Some(report) = self.check_access(raw, &course) {
            return Ok(report);
        }
        if course.is_video {
            self.error_log
                .record(&format!("course {} is a video course, skipping", course.title));
            return Ok(CourseReport::new(raw, Some(&course.title), CourseStatus::VideoSkipped));
        }

        let dirs = self.store.create_course_dirs(&course.title).await?;
        let articles: Vec<&Article> = course.articles.iter().collect();
        Ok(self
            .run_articles(raw, &course, &articles, &DispatchPlan::Text { dirs: &dirs }, false)
            .await)
    }

    async fn single_course(&self, request: &SingleCourseRequest) -> Result<CourseReport, CourseError> {
        let label = request.course_id.to_string();
        let course = self.load_course(request.course_id, request.scope).await?;

        if let Some(report) = self.check_access(&label, &course) {
            return Ok(report);
        }

        let articles = select_articles(&course, &request.article_ids);
        if course.is_video {
            let plan = DispatchPlan::Video {
                course_title: &course.title,
                scope: request.scope,
                quality: request.quality,
            };
            Ok(self
                .run_articles(&label, &course, &articles, &plan, request.overwrite)
                .await)
        } else {
            let dirs = self.store.create_course_dirs(&course.title).await?;
            Ok(self
                .run_articles(&label, &course, &articles, &DispatchPlan::Text { dirs: &dirs }, request.overwrite)
                .await)
        }
    }

    async fn load_course(&self, course_id: u64, scope: SessionScope) -> Result<Course, CourseError> {
        info!(course_id, %scope, "loading course");
        self.api
            .course_info(course_id, scope)
            .await
            .map_err(|source| CourseError::Metadata { course_id, source })
    }

    fn check_access(&self, label: &str, course: &Course) -> Option<CourseReport> {
        if course.access {
            return None;
        }
        self.error_log.record(&format!(
            "course {} ({label}) is not available to this account, skipping",
            course.title
        ));
        Some(CourseReport::new(label, Some(&course.title), CourseStatus::NoAccess))
    }

    async fn run_articles(
        &self,
        label: &str,
        course: &Course,
        articles: &[&Article],
        plan: &DispatchPlan<'_>,
        overwrite: bool,
    ) -> CourseReport {
        info!(course = %course.title, articles = articles.len(), "downloading course");
        let mut report = CourseReport::new(label, Some(&course.title), CourseStatus::Completed);
        let scheduler = ArticleRetryScheduler::new(&course.title, &self.retry, &self.error_log, &self.cancel);
        let mut progress = CourseProgress::new(&course.title, articles.len(), self.show_progress);

        for (index, &article) in articles.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.status = CourseStatus::Cancelled;
                break;
            }

            let article_report = match plan {
                DispatchPlan::Text { dirs } => {
                    let dirs: &CourseDirs = dirs;
                    scheduler
                        .run(article, || self.dispatcher.dispatch_text(article, dirs, overwrite))
                        .await
                }
                DispatchPlan::Video {
                    course_title,
                    scope,
                    quality,
                } => {
                    let dir_buf = self
                        .store
                        .video_article_dir(course_title, article.section_title.as_deref());
                    let dir = dir_buf.as_path();
                    scheduler
                        .run(article, || {
                            self.dispatcher
                                .dispatch_video(article, dir, *scope, *quality, overwrite)
                        })
                        .await
                }
            };

            let status = article_report.status;
            report.articles.push(article_report);
            if status == ArticleStatus::Cancelled {
                report.status = CourseStatus::Cancelled;
                break;
            }
            progress.advance();

            if index + 1 < articles.len() && !self.rate_limiter.wait_or_cancel(&self.cancel).await {
                report.status = CourseStatus::Cancelled;
                break;
            }
        }
        progress.finish();

        match report.status {
            CourseStatus::Cancelled => warn!(course = %course.title, "course interrupted"),
            _ => info!(course = %course.title, completed = progress.completed(), "course finished"),
        }
        report
    }
}

fn parse_course_id(raw: &str) -> Result<u64, CourseError> {
    raw.trim().parse::<u64>().map_err(|_| CourseError::InvalidId {
        raw: raw.to_string(),
    })
}

/// Keeps course order; unknown ids are reported and ignored.
fn select_articles<'a>(course: &'a Course, ids: &[u64]) -> Vec<&'a Article> {
    if ids.is_empty() {
        return course.articles.iter().collect();
    }
    for id in ids {
        if !course.articles.iter().any(|a| a.id == *id) {
            warn!(article_id = id, course = %course.title, "article not found in course, ignoring");
        }
    }
    course
        .articles
        .iter()
        .filter(|a| ids.contains(&a.id))
        .collect()
}
