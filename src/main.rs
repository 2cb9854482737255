//! CLI entry point for the course downloader.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use course_downloader::api::{CourseApi, establish_session};
use course_downloader::config::{Settings, load_config};
use course_downloader::download::{
    ArtifactStore, BatchSummary, CourseTraversalController, FormatDispatcher, RateLimiter,
    SingleCourseRequest,
};
use course_downloader::model::SessionScope;
use course_downloader::render::{ChromePdfRenderer, MarkdownConverter};
use course_downloader::video::VideoAcquirer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    init_tracing(cli.global.default_log_level());
    debug!(command = ?cli.command, "CLI arguments parsed");
    info!("Course downloader starting");

    let batch_ids = match &cli.command {
        Some(Command::Batch(args)) => args.course_ids.clone(),
        _ => Vec::new(),
    };
    let loaded = load_config(cli.global.config.as_deref())?;
    if let (true, Some(path)) = (loaded.loaded_from_file, loaded.path.as_deref()) {
        info!(path = %path.display(), "Loaded config file");
    }
    let settings = Settings::resolve(&cli.global.overrides(&batch_ids), loaded.config.as_ref())?;
    debug!(
        output_dir = %settings.output_dir.display(),
        concurrency = settings.concurrency,
        columns = settings.formats.bits(),
        interval_secs = settings.interval_secs,
        quality = settings.quality.as_str(),
        "Settings resolved"
    );

    let renderer = if settings.formats.wants_pdf() {
        let renderer = ChromePdfRenderer::detect(settings.print_wait, settings.print_timeout)
            .context("PDF output is enabled (columns 1 or 3) but no browser is available")?;
        info!(browser = %renderer.browser().display(), "Using browser for PDF output");
        Some(Arc::new(renderer))
    } else {
        None
    };

    let api = establish_session(&settings.credentials, settings.endpoints.clone(), settings.timeouts)
        .await
        .context("Could not establish a session with the provided gcid/gcess cookies")?;

    let cancel = CancellationToken::new();
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            cancel_signal.cancel();
        }
    });

    let video = VideoAcquirer::new(api.http(), settings.concurrency, cancel.clone());
    let api: Arc<dyn CourseApi> = Arc::new(api);
    let mut dispatcher = FormatDispatcher::new(
        Arc::clone(&api),
        video,
        Arc::new(MarkdownConverter::new()),
        settings.formats,
    );
    if let Some(renderer) = renderer {
        dispatcher = dispatcher.with_renderer(renderer);
    }

    let show_progress =
        should_show_progress(io::stderr().is_terminal(), cli.global.quiet, is_dumb_terminal());
    let controller = CourseTraversalController::new(
        api,
        ArtifactStore::new(settings.output_dir.clone()),
        dispatcher,
        cancel,
    )
    .with_rate_limiter(rate_limiter(settings.interval_secs))
    .with_progress(show_progress);

    let summary = match cli.command {
        Some(Command::Course(args)) => {
            let scope = if settings.enterprise {
                SessionScope::Enterprise
            } else {
                args.scope
            };
            let request = SingleCourseRequest {
                course_id: args.course_id,
                scope,
                quality: settings.quality,
                article_ids: args.article_ids,
                overwrite: args.overwrite,
            };
            controller.run_single_course(&request).await
        }
        Some(Command::Batch(_)) | None => {
            if settings.course_ids.is_empty() {
                warn!("No course ids configured; set `course_ids` or pass ids to `batch`");
            }
            controller.run_batch(&settings.course_ids).await
        }
    };

    print_summary(&summary, &controller.error_log().path().display().to_string());
    println!("all courses finished");
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn rate_limiter(interval_secs: u64) -> RateLimiter {
    if interval_secs == 0 {
        debug!("rate limiting disabled");
        RateLimiter::disabled()
    } else {
        debug!(interval_secs, "rate limiting enabled");
        RateLimiter::new(interval_secs)
    }
}

fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

fn should_show_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

fn print_summary(summary: &BatchSummary, error_log: &str) {
    println!(
        "Courses: {} completed, {} skipped, {} failed",
        summary.courses_completed, summary.courses_skipped, summary.courses_failed
    );
    println!(
        "Articles: {} downloaded, {} skipped, {} failed",
        summary.articles_downloaded, summary.articles_skipped, summary.articles_failed
    );
    if summary.courses_failed > 0 || summary.articles_failed > 0 || summary.courses_skipped > 0 {
        println!("Details: {error_log}");
    }
    if summary.cancelled {
        println!("Interrupted. Run again to resume; finished files will be skipped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_hidden_when_quiet_or_not_terminal() {
        assert!(should_show_progress(true, false, false));
        assert!(!should_show_progress(true, true, false));
        assert!(!should_show_progress(false, false, false));
        assert!(!should_show_progress(true, false, true));
    }

    #[test]
    fn test_rate_limiter_zero_interval_disables() {
        assert!(rate_limiter(0).is_disabled());
        assert!(!rate_limiter(2).is_disabled());
    }
}
