//! Per-course progress bar (completed articles out of the course total).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

/// Progress reporting for one course.
///
/// When hidden, progress is still emitted as `info` events so quiet or
/// non-terminal runs keep a record of it.
#[derive(Debug)]
pub struct CourseProgress {
    bar: Option<ProgressBar>,
    completed: usize,
    total: usize,
}

impl CourseProgress {
    #[must_use]
    pub fn new(course_title: &str, total: usize, visible: bool) -> Self {
        let bar = visible.then(|| {
            let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.set_message(course_title.to_string());
            bar
        });
        Self {
            bar,
            completed: 0,
            total,
        }
    }

    /// Marks one more article as done.
    pub fn advance(&mut self) {
        self.completed += 1;
        match &self.bar {
            Some(bar) => bar.inc(1),
            None => info!(completed = self.completed, total = self.total, "article finished"),
        }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
