//! Course Downloader Library
//!
//! Downloads the articles of purchased courses as PDF snapshots, Markdown
//! exports and videos, resuming safely after interruption: anything already
//! on disk is skipped.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Session establishment and the course platform client
//! - [`config`] - Config file parsing and layered settings resolution
//! - [`download`] - Course traversal, retries, pacing and format dispatch
//! - [`model`] - Courses, articles and the small value types around them
//! - [`render`] - PDF snapshots and Markdown export
//! - [`video`] - Direct and HLS video acquisition with a bounded worker pool

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod download;
pub mod model;
pub mod render;
pub mod video;

// Re-export commonly used types
pub use api::{ApiError, CourseApi, HttpCourseApi, SessionCredentials, establish_session};
pub use config::{ConfigOverrides, FileConfig, Settings, load_config};
pub use download::{
    ArtifactStore, BatchSummary, CourseTraversalController, FormatDispatcher, RateLimiter,
    RetryPolicy, SingleCourseRequest,
};
pub use model::{Article, Course, FormatSelection, SessionScope, VideoQuality};
pub use render::{ChromePdfRenderer, MarkdownConverter};
pub use video::VideoAcquirer;
