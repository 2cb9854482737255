//! Bounded per-article retry with a fixed backoff.
//!
//! This module provides the [`RetryPolicy`] that decides whether another
//! dispatch attempt is allowed, and the [`ArticleRetryScheduler`] that runs
//! one article's attempts and isolates every failure to that article.
//!
//! # Overview
//!
//! - Attempt 1 runs immediately.
//! - A failed attempt (error or caught panic) is logged and, while attempts
//!   remain, followed by a fixed delay before the next attempt.
//! - The first successful attempt ends the loop, whether it wrote new
//!   artifacts or found them all present.
//! - Exhausting all attempts records a final warning; nothing propagates.
//!
//! # Example
//!
//! ```
//! use course_downloader::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::error::{ArticleError, panic_message};
use super::error_log::ErrorLog;
use super::rate_limiter::sleep_or_cancel;
use crate::model::{Article, DownloadOutcome};

/// Default maximum attempts per article (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default fixed delay before each retried attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Decision on whether to run another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this article.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry bound and backoff for article dispatch.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `delay`: 5 seconds, fixed (no growth, no jitter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay inserted before every retried attempt.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after attempt number `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Terminal state of one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleStatus {
    /// At least one artifact was freshly written.
    Downloaded,
    /// Every governing artifact already existed.
    Skipped,
    /// All attempts failed.
    Failed,
    /// Cancellation was observed before a terminal outcome.
    Cancelled,
}

/// What happened to one article, including the retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleReport {
    pub status: ArticleStatus,
    /// Dispatch attempts actually started.
    pub attempts: u32,
    /// Backoff delays actually slept.
    pub retry_sleeps: u32,
    /// Message of the last failed attempt, if any.
    pub last_error: Option<String>,
}

/// Runs one article's dispatch attempts under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct ArticleRetryScheduler<'a> {
    course: &'a str,
    policy: &'a RetryPolicy,
    error_log: &'a ErrorLog,
    cancel: &'a CancellationToken,
}

impl<'a> ArticleRetryScheduler<'a> {
    /// Creates a scheduler whose error records name `course`.
    #[must_use]
    pub fn new(
        course: &'a str,
        policy: &'a RetryPolicy,
        error_log: &'a ErrorLog,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            course,
            policy,
            error_log,
            cancel,
        }
    }

    /// Runs `attempt_fn` until it succeeds or the policy gives up.
    ///
    /// Errors and panics raised by an attempt are caught here, recorded to
    /// the error log and retried; none of them escape this call.
    #[instrument(skip(self, article, attempt_fn), fields(article_id = article.id))]
    pub async fn run<F, Fut>(&self, article: &Article, mut attempt_fn: F) -> ArticleReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<DownloadOutcome, ArticleError>>,
    {
        let mut report = ArticleReport {
            status: ArticleStatus::Failed,
            attempts: 0,
            retry_sleeps: 0,
            last_error: None,
        };
        let mut attempt = 0u32;
        let unit = format!("course {} article {} (id {})", self.course, article.title, article.id);

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                report.status = ArticleStatus::Cancelled;
                return report;
            }

            debug!(attempt, "attempting article");
            report.attempts += 1;

            let message = match AssertUnwindSafe(attempt_fn()).catch_unwind().await {
                Ok(Ok(outcome)) => {
                    report.status = if outcome.skipped {
                        ArticleStatus::Skipped
                    } else {
                        ArticleStatus::Downloaded
                    };
                    debug!(attempt, skipped = outcome.skipped, "article finished");
                    return report;
                }
                Ok(Err(ArticleError::Cancelled)) => {
                    report.status = ArticleStatus::Cancelled;
                    return report;
                }
                Ok(Err(error)) => format!("{unit} failed: {error}"),
                Err(payload) => format!(
                    "{unit} raised an internal fault: {}",
                    panic_message(payload.as_ref())
                ),
            };
            self.error_log.record(&message);
            report.last_error = Some(message);

            match self.policy.should_retry(attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        article = %article.title,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        "retrying article"
                    );
                    if !sleep_or_cancel(delay, self.cancel).await {
                        report.status = ArticleStatus::Cancelled;
                        return report;
                    }
                    report.retry_sleeps += 1;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying article");
                    self.error_log
                        .record(&format!("warning: {unit} could not be downloaded"));
                    report.status = ArticleStatus::Failed;
                    return report;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::api::ApiError;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ErrorLog, CancellationToken) {
        let temp = TempDir::new().unwrap();
        let log = ErrorLog::new(temp.path().join("error.txt"));
        (temp, log, CancellationToken::new())
    }

    fn log_lines(log: &ErrorLog) -> Vec<String> {
        std::fs::read_to_string(log.path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn fetch_error() -> ArticleError {
        ArticleError::Fetch(ApiError::Platform {
            url: "https://example.com/serv/v1/article".to_string(),
            code: -1,
            message: "busy".to_string(),
        })
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_should_retry_uses_fixed_delay() {
        let policy = RetryPolicy::default();
        for attempt in 1..5 {
            assert_eq!(
                policy.should_retry(attempt),
                RetryDecision::Retry {
                    delay: Duration::from_secs(5),
                    attempt: attempt + 1,
                }
            );
        }
    }

    #[test]
    fn test_should_retry_stops_at_max() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(5),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    // ==================== Scheduler Tests ====================

    #[tokio::test]
    async fn test_first_attempt_skip_stops_immediately() {
        tokio::time::pause();
        let (_temp, log, cancel) = fixture();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);
        let calls = Cell::new(0);

        let report = scheduler
            .run(&Article::new(1, "a"), || {
                calls.set(calls.get() + 1);
                async { Ok(DownloadOutcome::skipped()) }
            })
            .await;

        assert_eq!(report.status, ArticleStatus::Skipped);
        assert_eq!(calls.get(), 1);
        assert_eq!(report.retry_sleeps, 0);
        assert!(log_lines(&log).is_empty());
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_five() {
        tokio::time::pause();
        let (_temp, log, cancel) = fixture();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);
        let calls = Cell::new(0);

        let report = scheduler
            .run(&Article::new(1, "always fails"), || {
                calls.set(calls.get() + 1);
                async { Err(fetch_error()) }
            })
            .await;

        assert_eq!(report.status, ArticleStatus::Failed);
        assert_eq!(calls.get(), 5);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.retry_sleeps, 4);
        // 5 attempt failures + 1 final warning
        let lines = log_lines(&log);
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.contains("course Course article always fails (id 1)")));
        assert!(lines[5].contains("could not be downloaded"));
    }

    #[tokio::test]
    async fn test_success_on_fifth_attempt() {
        tokio::time::pause();
        let (_temp, log, cancel) = fixture();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);
        let calls = Cell::new(0);

        let start = tokio::time::Instant::now();
        let report = scheduler
            .run(&Article::new(1, "flaky"), || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 5 {
                        Err(fetch_error())
                    } else {
                        Ok(DownloadOutcome::written())
                    }
                }
            })
            .await;

        assert_eq!(report.status, ArticleStatus::Downloaded);
        assert_eq!(report.retry_sleeps, 4);
        assert!(start.elapsed() >= Duration::from_secs(20));
        let lines = log_lines(&log);
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| !l.contains("could not be downloaded")));
    }

    #[tokio::test]
    async fn test_panic_is_isolated_and_retried() {
        tokio::time::pause();
        let (_temp, log, cancel) = fixture();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);
        let calls = Cell::new(0);

        let report = scheduler
            .run(&Article::new(1, "panics once"), || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    assert!(n > 1, "simulated internal fault");
                    Ok(DownloadOutcome::skipped())
                }
            })
            .await;

        assert_eq!(report.status, ArticleStatus::Skipped);
        assert_eq!(report.attempts, 2);
        let lines = log_lines(&log);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("internal fault"));
    }

    #[tokio::test]
    async fn test_cancel_before_first_attempt() {
        let (_temp, log, cancel) = fixture();
        cancel.cancel();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);

        let report = scheduler
            .run(&Article::new(1, "a"), || async { Ok(DownloadOutcome::skipped()) })
            .await;

        assert_eq!(report.status, ArticleStatus::Cancelled);
        assert_eq!(report.attempts, 0);
    }

    #[tokio::test]
    async fn test_cancelled_attempt_is_not_retried() {
        let (_temp, log, cancel) = fixture();
        let policy = RetryPolicy::default();
        let scheduler = ArticleRetryScheduler::new("Course", &policy, &log, &cancel);

        let report = scheduler
            .run(&Article::new(1, "a"), || async { Err(ArticleError::Cancelled) })
            .await;

        assert_eq!(report.status, ArticleStatus::Cancelled);
        assert_eq!(report.attempts, 1);
        assert!(log_lines(&log).is_empty());
    }
}
