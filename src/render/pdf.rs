//! PDF snapshots printed by a headless Chrome/Chromium.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::RenderError;
use super::{DocumentRenderer, RenderJob};
use crate::download::{PDF_EXTENSION, artifact_path, should_skip, staging_path};

/// Executable names tried, in order, when locating a browser on `PATH`.
pub const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Well-known install locations outside `PATH`.
const BROWSER_INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

/// Finds a Chrome-compatible browser on `PATH` or in a standard location.
#[must_use]
pub fn locate_browser() -> Option<PathBuf> {
    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| {
            BROWSER_INSTALL_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|path| path.is_file())
        })
}

/// Prints article HTML to PDF through `--headless --print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromePdfRenderer {
    browser: PathBuf,
    /// Virtual time the page gets to settle (images, fonts) before printing.
    wait: Duration,
    /// Hard limit on the browser process.
    timeout: Duration,
}

impl ChromePdfRenderer {
    #[must_use]
    pub fn new(browser: PathBuf, wait: Duration, timeout: Duration) -> Self {
        Self {
            browser,
            wait,
            timeout,
        }
    }

    /// Builds a renderer around the first browser [`locate_browser`] finds.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SnapshotBrowserMissing`] if none is installed.
    pub fn detect(wait: Duration, timeout: Duration) -> Result<Self, RenderError> {
        let browser = locate_browser().ok_or_else(|| RenderError::SnapshotBrowserMissing {
            searched: BROWSER_CANDIDATES.join(", "),
        })?;
        debug!(browser = %browser.display(), "using browser for PDF rendering");
        Ok(Self::new(browser, wait, timeout))
    }

    #[must_use]
    pub fn browser(&self) -> &Path {
        &self.browser
    }

    async fn print(&self, page: &Path, output: &Path) -> Result<(), RenderError> {
        let page_url = std::path::absolute(page)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
            .ok_or_else(|| RenderError::SnapshotFailed {
                reason: format!("cannot build a file URL for {}", page.display()),
            })?;
        let mut print_arg = OsString::from("--print-to-pdf=");
        print_arg.push(output.as_os_str());

        let mut command = Command::new(&self.browser);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--virtual-time-budget={}", self.wait.as_millis()))
            .arg(print_arg)
            .arg(page_url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| RenderError::SnapshotLaunch {
            browser: self.browser.clone(),
            source,
        })?;
        let output_result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::SnapshotTimeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| RenderError::SnapshotLaunch {
                browser: self.browser.clone(),
                source,
            })?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(RenderError::SnapshotFailed {
                reason: format!(
                    "browser exited with {}: {}",
                    output_result.status,
                    stderr.lines().last().unwrap_or_default()
                ),
            });
        }
        let written = tokio::fs::metadata(output)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(RenderError::SnapshotFailed {
                reason: "browser produced no PDF".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRenderer for ChromePdfRenderer {
    #[instrument(skip(self, job), fields(title = job.title))]
    async fn render(&self, job: &RenderJob<'_>) -> Result<bool, RenderError> {
        let target = artifact_path(job.dir, job.title, PDF_EXTENSION);
        if should_skip(&target, job.overwrite) {
            debug!(path = %target.display(), "PDF already present");
            return Ok(false);
        }

        let page = hidden_page_path(&target);
        tokio::fs::write(&page, wrap_document(job.title, job.html))
            .await
            .map_err(|e| RenderError::io(&page, e))?;
        let staging = staging_path(&target);

        let result = self.print(&page, &staging).await;
        if let Err(error) = tokio::fs::remove_file(&page).await {
            warn!(path = %page.display(), %error, "could not remove staged page");
        }
        if let Err(error) = result {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error);
        }

        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| RenderError::io(&target, e))?;
        info!(path = %target.display(), "PDF written");
        Ok(true)
    }
}

/// `.<name>.html` beside the target.
fn hidden_page_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".html");
    target.with_file_name(name)
}

/// Wraps an article fragment into a printable standalone page.
fn wrap_document(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>body{{max-width:820px;margin:0 auto;font-family:sans-serif;line-height:1.6}}\
         img{{max-width:100%}}pre{{white-space:pre-wrap}}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
