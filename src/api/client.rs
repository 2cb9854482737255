//! HTTP implementation of [`CourseApi`] against the platform's JSON endpoints.
//!
//! Every endpoint is a `POST` with a JSON body and answers with the envelope
//! `{"code": 0, "data": ..., "error": ...}`. A non-zero `code` is a platform
//! error; HTTP 401/403 means the session was rejected.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ORIGIN, REFERER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::CourseApi;
use super::error::ApiError;
use crate::download::{HttpClient, HttpTimeouts};
use crate::model::{Article, ArticleContent, Course, InlineVideo, SessionScope, VideoVariant};

/// Main platform origin (text courses, articles, standard video info).
pub const DEFAULT_MAIN_ORIGIN: &str = "https://time.geekbang.org";
/// Account origin used for session verification.
pub const DEFAULT_ACCOUNT_ORIGIN: &str = "https://account.geekbang.org";
/// University (training camp) origin.
pub const DEFAULT_UNIVERSITY_ORIGIN: &str = "https://u.geekbang.org";
/// Enterprise origin.
pub const DEFAULT_ENTERPRISE_ORIGIN: &str = "https://b.geekbang.org";
/// Domain the session cookies are issued for.
pub const DEFAULT_COOKIE_DOMAIN: &str = ".geekbang.org";

/// Page size for the article list; the platform caps columns well below this.
const ARTICLE_PAGE_SIZE: u32 = 500;

// ==================== Endpoints ====================

/// Base URLs of the platform services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEndpoints {
    pub main: String,
    pub account: String,
    pub university: String,
    pub enterprise: String,
    pub cookie_domain: String,
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            main: DEFAULT_MAIN_ORIGIN.to_string(),
            account: DEFAULT_ACCOUNT_ORIGIN.to_string(),
            university: DEFAULT_UNIVERSITY_ORIGIN.to_string(),
            enterprise: DEFAULT_ENTERPRISE_ORIGIN.to_string(),
            cookie_domain: DEFAULT_COOKIE_DOMAIN.to_string(),
        }
    }
}

impl PlatformEndpoints {
    /// Routes every service to one origin (for testing with wiremock).
    #[must_use]
    pub fn single_origin(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            main: base.clone(),
            account: base.clone(),
            university: base.clone(),
            enterprise: base,
            cookie_domain: DEFAULT_COOKIE_DOMAIN.to_string(),
        }
    }

    /// Distinct origins that need session cookies.
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::with_capacity(4);
        for origin in [&self.main, &self.account, &self.university, &self.enterprise] {
            if !seen.contains(&origin.as_str()) {
                seen.push(origin.as_str());
            }
        }
        seen.into_iter()
    }

    fn origin_for(&self, scope: SessionScope) -> &str {
        match scope {
            SessionScope::Standard => &self.main,
            SessionScope::University => &self.university,
            SessionScope::Enterprise => &self.enterprise,
        }
    }
}

// ==================== Response Types ====================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Value,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    id: u64,
    title: String,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    extra: ColumnExtra,
}

#[derive(Debug, Default, Deserialize)]
struct ColumnExtra {
    #[serde(default)]
    sub: ColumnSubscription,
}

#[derive(Debug, Default, Deserialize)]
struct ColumnSubscription {
    #[serde(default)]
    access_mask: i64,
}

#[derive(Debug, Deserialize)]
struct ArticleList {
    #[serde(default)]
    list: Vec<ArticleSummary>,
}

#[derive(Debug, Deserialize)]
struct ArticleSummary {
    id: u64,
    article_title: String,
    #[serde(default)]
    chapter_id: u64,
}

#[derive(Debug, Deserialize)]
struct Chapter {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ArticleBody {
    #[serde(default)]
    article_content: String,
    #[serde(default)]
    inline_video_subtitles: Vec<InlineVideoSubtitle>,
}

#[derive(Debug, Deserialize)]
struct InlineVideoSubtitle {
    video_url: String,
    #[serde(default)]
    subtitle_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScopedCourse {
    #[serde(default)]
    id: u64,
    title: String,
    #[serde(default)]
    sections: Vec<ScopedSection>,
}

#[derive(Debug, Deserialize)]
struct ScopedSection {
    #[serde(default)]
    title: String,
    #[serde(default)]
    articles: Vec<ScopedArticle>,
}

#[derive(Debug, Deserialize)]
struct ScopedArticle {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct HlsMedia {
    quality: String,
    url: String,
}

// ==================== HttpCourseApi ====================

/// [`CourseApi`] backed by the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCourseApi {
    endpoints: PlatformEndpoints,
    http: HttpClient,
}

impl HttpCourseApi {
    /// Builds the API client around a session cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn new(
        endpoints: PlatformEndpoints,
        cookie_jar: Arc<Jar>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::with_cookie_jar(cookie_jar, timeouts).map_err(ApiError::Client)?;
        Ok(Self { endpoints, http })
    }

    /// The session client, shared with video transfers.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn endpoints(&self) -> &PlatformEndpoints {
        &self.endpoints
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        origin: &str,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        let url = format!("{origin}{path}");
        debug!(%url, "calling platform API");

        let response = self
            .http
            .inner()
            .post(&url)
            .header(ORIGIN, origin)
            .header(REFERER, format!("{origin}/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::network(&url, e))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiError::Unauthorized {
                url,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(&url, e))?;
        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|source| ApiError::Decode {
                url: url.clone(),
                source,
            })?;
        if envelope.code != 0 {
            return Err(ApiError::Platform {
                url,
                code: envelope.code,
                message: error_message(&envelope.error),
            });
        }
        serde_json::from_value(envelope.data).map_err(|source| ApiError::Decode { url, source })
    }

    async fn standard_course(&self, course_id: u64) -> Result<Course, ApiError> {
        let origin = self.endpoints.main.as_str();
        let info: ColumnInfo = self
            .post_json(
                origin,
                "/serv/v3/column/info",
                json!({ "product_id": course_id, "with_recommend_article": true }),
            )
            .await?;
        let access = info.extra.sub.access_mask > 0;

        let mut course = Course {
            id: info.id,
            title: info.title,
            is_video: info.is_video,
            access,
            articles: Vec::new(),
        };
        if !access {
            return Ok(course);
        }

        let list: ArticleList = self
            .post_json(
                origin,
                "/serv/v1/column/articles",
                json!({
                    "cid": course_id,
                    "order": "earliest",
                    "prev": 0,
                    "sample": false,
                    "size": ARTICLE_PAGE_SIZE,
                }),
            )
            .await?;

        let chapters: HashMap<u64, String> = if course.is_video {
            let chapters: Vec<Chapter> = self
                .post_json(origin, "/serv/v1/chapters", json!({ "cid": course_id }))
                .await?;
            chapters.into_iter().map(|c| (c.id, c.title)).collect()
        } else {
            HashMap::new()
        };

        course.articles = list
            .list
            .into_iter()
            .map(|summary| {
                let article = Article::new(summary.id, summary.article_title);
                match chapters.get(&summary.chapter_id) {
                    Some(section) => article.with_section(section.clone()),
                    None => article,
                }
            })
            .collect();
        Ok(course)
    }

    async fn scoped_course(&self, course_id: u64, scope: SessionScope) -> Result<Course, ApiError> {
        let (path, body) = match scope {
            SessionScope::University => ("/serv/v1/myclass/info", json!({ "class_id": course_id })),
            _ => ("/app/v1/course/info", json!({ "id": course_id })),
        };
        let info: ScopedCourse = self
            .post_json(self.endpoints.origin_for(scope), path, body)
            .await?;

        let articles = info
            .sections
            .into_iter()
            .flat_map(|section| {
                let title = section.title;
                section.articles.into_iter().map(move |a| {
                    let article = Article::new(a.id, a.title);
                    if title.trim().is_empty() {
                        article
                    } else {
                        article.with_section(title.clone())
                    }
                })
            })
            .collect();

        // Class and enterprise listings only contain entitled video courses.
        Ok(Course {
            id: if info.id == 0 { course_id } else { info.id },
            title: info.title,
            is_video: true,
            access: true,
            articles,
        })
    }
}

#[async_trait]
impl CourseApi for HttpCourseApi {
    #[instrument(skip(self))]
    async fn verify_session(&self) -> Result<(), ApiError> {
        match self
            .post_json::<Value>(&self.endpoints.account, "/serv/v1/user/auth", json!({}))
            .await
        {
            Ok(_) => Ok(()),
            Err(ApiError::Platform { message, .. }) => Err(ApiError::Auth { message }),
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self))]
    async fn course_info(&self, course_id: u64, scope: SessionScope) -> Result<Course, ApiError> {
        match scope {
            SessionScope::Standard => self.standard_course(course_id).await,
            SessionScope::University | SessionScope::Enterprise => {
                self.scoped_course(course_id, scope).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn article_content(&self, article_id: u64) -> Result<ArticleContent, ApiError> {
        let body: ArticleBody = self
            .post_json(
                &self.endpoints.main,
                "/serv/v1/article",
                json!({ "id": article_id, "include_neighbors": false, "is_freelyread": true }),
            )
            .await?;
        Ok(ArticleContent {
            html: body.article_content,
            inline_videos: body
                .inline_video_subtitles
                .into_iter()
                .filter(|v| !v.video_url.trim().is_empty())
                .map(|v| InlineVideo {
                    video_url: v.video_url,
                    subtitle_url: v.subtitle_url.filter(|s| !s.trim().is_empty()),
                })
                .collect(),
        })
    }

    #[instrument(skip(self))]
    async fn video_variants(
        &self,
        article_id: u64,
        scope: SessionScope,
    ) -> Result<Vec<VideoVariant>, ApiError> {
        let (path, body, pointer) = match scope {
            SessionScope::Standard => (
                "/serv/v3/article/info",
                json!({ "id": article_id }),
                "/info/video/hls_medias",
            ),
            SessionScope::University => (
                "/serv/v1/video/play-info",
                json!({ "article_id": article_id }),
                "/hls_medias",
            ),
            SessionScope::Enterprise => (
                "/app/v1/article/detail",
                json!({ "article_id": article_id }),
                "/video/hls_medias",
            ),
        };
        let origin = self.endpoints.origin_for(scope);
        let data: Value = self.post_json(origin, path, body).await?;
        let medias = data.pointer(pointer).cloned().unwrap_or(Value::Null);
        if medias.is_null() {
            return Ok(Vec::new());
        }
        let medias: Vec<HlsMedia> =
            serde_json::from_value(medias).map_err(|source| ApiError::Decode {
                url: format!("{origin}{path}"),
                source,
            })?;
        Ok(medias
            .into_iter()
            .map(|m| VideoVariant {
                quality: m.quality,
                url: m.url,
            })
            .collect())
    }
}

/// Extracts a readable message from the envelope's `error` field.
fn error_message(error: &Value) -> String {
    match error {
        Value::Object(map) => map
            .get("msg")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        Value::String(s) => s.clone(),
        Value::Null => "no error details".to_string(),
        other => other.to_string(),
    }
}
