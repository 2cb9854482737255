//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use course_downloader::config::ConfigOverrides;
use course_downloader::model::{SessionScope, VideoQuality};

/// Download purchased course articles as PDF, Markdown and video.
///
/// Re-running is safe: files already on disk are skipped, so an interrupted
/// run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "course-downloader")]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to $XDG_CONFIG_HOME/course-downloader/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// GCID session cookie value
    #[arg(long, global = true, env = "COURSE_DOWNLOADER_GCID", hide_env_values = true)]
    pub gcid: Option<String>,

    /// GCESS session cookie value
    #[arg(long, global = true, env = "COURSE_DOWNLOADER_GCESS", hide_env_values = true)]
    pub gcess: Option<String>,

    /// Output root directory
    #[arg(short = 'o', long = "output", global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Concurrent video transfers (1-100)
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Output formats: 1 = PDF, 2 = Markdown, 3 = both
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub columns: Option<u8>,

    /// Seconds to wait between articles (0-60)
    #[arg(short = 'i', long, global = true, value_parser = clap::value_parser!(u64).range(0..=60))]
    pub interval: Option<u64>,

    /// Preferred video quality (ld, sd, hd)
    #[arg(long, global = true)]
    pub quality: Option<VideoQuality>,

    /// Force the enterprise session scope for the course command
    #[arg(long, global = true)]
    pub enterprise: bool,

    /// Seconds the page may settle before the PDF snapshot (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub print_wait_secs: Option<u64>,

    /// Hard limit for one PDF snapshot in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub print_timeout_secs: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download every configured text course (the default)
    Batch(BatchArgs),
    /// Download a single course of any kind, including video courses
    Course(CourseArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Course ids to process instead of the configured list
    #[arg(value_name = "COURSE_ID")]
    pub course_ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CourseArgs {
    /// Course id
    #[arg(value_name = "COURSE_ID")]
    pub course_id: u64,

    /// Session scope used for metadata and video requests
    #[arg(long, default_value_t = SessionScope::Standard)]
    pub scope: SessionScope,

    /// Only download these article ids (repeatable)
    #[arg(long = "article", value_name = "ARTICLE_ID")]
    pub article_ids: Vec<u64>,

    /// Replace files that already exist
    #[arg(long)]
    pub overwrite: bool,
}

impl GlobalArgs {
    /// Settings layer contributed by the command line.
    #[must_use]
    pub fn overrides(&self, course_ids: &[String]) -> ConfigOverrides {
        ConfigOverrides {
            gcid: self.gcid.clone(),
            gcess: self.gcess.clone(),
            course_ids: course_ids.to_vec(),
            output_dir: self.output_dir.clone(),
            concurrency: self.concurrency,
            columns: self.columns,
            interval: self.interval,
            print_wait_secs: self.print_wait_secs,
            print_timeout_secs: self.print_timeout_secs,
            quality: self.quality,
            enterprise: self.enterprise,
        }
    }

    /// Default log level; `RUST_LOG` still takes precedence.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
