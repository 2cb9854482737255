//! Inter-request pacing between consecutive articles.
//!
//! This module provides the [`RateLimiter`] struct which blocks the calling
//! flow for a fixed interval plus random jitter, spacing out the requests a
//! run sends to the platform.
//!
//! # Example
//!
//! ```
//! use course_downloader::download::RateLimiter;
//!
//! # async fn example() {
//! // 1 second plus up to 2 seconds of jitter between articles
//! let limiter = RateLimiter::new(1);
//! limiter.wait().await;
//! # }
//! ```

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Upper bound (exclusive) of the random extra delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(2000);

/// Paces network-triggering operations with `interval + jitter`.
///
/// The random source is seeded once when the limiter is built; delays are
/// not reproducible across runs. Jitter only ever adds to the interval.
#[derive(Debug)]
pub struct RateLimiter {
    /// Base delay applied on every wait.
    interval: Duration,

    /// Jitter is drawn uniformly from `[0, max_jitter)`.
    max_jitter: Duration,

    /// Whether pacing is disabled entirely.
    disabled: bool,

    rng: Mutex<StdRng>,
}

impl RateLimiter {
    /// Creates a limiter waiting `interval_secs` whole seconds plus up to 2s of jitter.
    #[must_use]
    #[instrument]
    pub fn new(interval_secs: u64) -> Self {
        debug!("creating rate limiter");
        Self::with_jitter(Duration::from_secs(interval_secs), DEFAULT_MAX_JITTER)
    }

    /// Creates a limiter with an explicit interval and jitter bound.
    #[must_use]
    pub fn with_jitter(interval: Duration, max_jitter: Duration) -> Self {
        Self {
            interval,
            max_jitter,
            disabled: false,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            max_jitter: Duration::ZERO,
            disabled: true,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Draws the next delay: `interval + uniform[0, max_jitter)`.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.disabled {
            return Duration::ZERO;
        }
        self.interval + self.jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Duration::from_millis(rng.gen_range(0..max_ms))
    }

    /// Blocks for one interval plus jitter.
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!(delay_ms = delay.as_millis(), "rate limit wait");
        tokio::time::sleep(delay).await;
    }

    /// Like [`wait`](Self::wait) but returns early when `cancel` fires.
    ///
    /// Returns `false` if the wait was cut short by cancellation.
    pub async fn wait_or_cancel(&self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        debug!(delay_ms = delay.as_millis(), "rate limit wait");
        sleep_or_cancel(delay, cancel).await
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `true` when the full delay elapsed, `false` on cancellation.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = cancel.cancelled() => false,
    }
}
