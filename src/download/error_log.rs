//! Append-only failure log (`<output root>/error.txt`).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

/// Timestamp format of each log line: `[YYYY-MM-DD HH:MM:SS] message`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sink for failure records, duplicated to the tracing output.
///
/// Write failures are reported through tracing and never propagate; losing
/// a log line must not stop a download run.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prints the message and appends it with a local timestamp.
    pub fn record(&self, message: &str) {
        warn!("{message}");
        self.append(message);
    }

    fn append(&self, message: &str) {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(parent) = self.path.parent()
            && let Err(error) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), %error, "cannot create error log directory");
            return;
        }

        let line = format_line(&Local::now().format(TIMESTAMP_FORMAT).to_string(), message);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(error) = result {
            warn!(path = %self.path.display(), %error, "failed to write error log");
        }
    }
}

fn format_line(timestamp: &str, message: &str) -> String {
    format!("[{timestamp}] {message}\n")
}
