//! Authenticated access to course metadata, article content and video info.
//!
//! The pipeline depends only on the [`CourseApi`] trait; [`HttpCourseApi`]
//! is the production implementation and tests substitute their own.

mod client;
mod error;
mod session;

use async_trait::async_trait;

pub use client::{
    DEFAULT_ACCOUNT_ORIGIN, DEFAULT_COOKIE_DOMAIN, DEFAULT_ENTERPRISE_ORIGIN, DEFAULT_MAIN_ORIGIN,
    DEFAULT_UNIVERSITY_ORIGIN, HttpCourseApi, PlatformEndpoints,
};
pub use error::ApiError;
pub use session::{
    CookieFlavor, GCESS, GCID, SessionCredentials, build_cookie_jar, establish_session,
    session_cookie_strings,
};

use crate::model::{ArticleContent, Course, SessionScope, VideoVariant};

/// Course platform operations used by the download pipeline.
#[async_trait]
pub trait CourseApi: Send + Sync {
    /// Checks that the session cookies are accepted.
    async fn verify_session(&self) -> Result<(), ApiError>;

    /// Loads a course and its article list.
    async fn course_info(&self, course_id: u64, scope: SessionScope) -> Result<Course, ApiError>;

    /// Loads one article's HTML body and inline video descriptors.
    async fn article_content(&self, article_id: u64) -> Result<ArticleContent, ApiError>;

    /// Lists the playable renditions of a video-course article.
    async fn video_variants(
        &self,
        article_id: u64,
        scope: SessionScope,
    ) -> Result<Vec<VideoVariant>, ApiError>;
}
