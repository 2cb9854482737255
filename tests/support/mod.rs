//! Shared fixtures for the pipeline integration tests.
//!
//! [`ScriptedApi`] stands in for the course platform: it serves canned
//! courses and article bodies, can fail or panic on demand, and records
//! every call so tests can assert on traffic and pacing.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use course_downloader::api::{ApiError, CourseApi};
use course_downloader::download::{
    ArtifactStore, CourseTraversalController, FormatDispatcher, HttpClient, HttpTimeouts,
    PDF_EXTENSION, RateLimiter, RetryPolicy, artifact_path, should_skip,
};
use course_downloader::model::{
    Article, ArticleContent, Course, FormatSelection, InlineVideo, SessionScope, VideoVariant,
};
use course_downloader::render::{DocumentRenderer, MarkdownConverter, RenderError, RenderJob};
use course_downloader::video::VideoAcquirer;
use tokio_util::sync::CancellationToken;

/// Retry delay short enough for tests but still observable.
pub const TEST_RETRY_DELAY: Duration = Duration::from_millis(10);

/// What the scripted platform does for one article.
#[derive(Debug, Clone)]
pub enum ContentScript {
    /// Always returns this HTML.
    Html(String),
    /// Fails the first `n` calls, then returns the HTML.
    FailTimes(usize, String),
    /// Every call fails.
    AlwaysFail,
    /// Every call panics.
    Panic,
}

#[derive(Default)]
pub struct ScriptedApi {
    courses: HashMap<u64, Course>,
    contents: HashMap<u64, ContentScript>,
    variants: HashMap<u64, Vec<VideoVariant>>,
    clips: HashMap<u64, Vec<InlineVideo>>,
    content_calls: Mutex<Vec<(u64, Instant)>>,
    course_calls: Mutex<Vec<(u64, SessionScope)>>,
    failures: Mutex<HashMap<u64, usize>>,
}

impl ScriptedApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text course with access whose articles return `<p>{title}</p>`.
    #[must_use]
    pub fn text_course(mut self, id: u64, title: &str, articles: &[(u64, &str)]) -> Self {
        for (article_id, article_title) in articles {
            self.contents
                .insert(*article_id, ContentScript::Html(format!("<p>{article_title}</p>")));
        }
        self.courses.insert(
            id,
            Course {
                id,
                title: title.to_string(),
                is_video: false,
                access: true,
                articles: articles
                    .iter()
                    .map(|(article_id, article_title)| Article::new(*article_id, *article_title))
                    .collect(),
            },
        );
        self
    }

    #[must_use]
    pub fn course(mut self, course: Course) -> Self {
        self.courses.insert(course.id, course);
        self
    }

    #[must_use]
    pub fn content(mut self, article_id: u64, script: ContentScript) -> Self {
        self.contents.insert(article_id, script);
        self
    }

    #[must_use]
    pub fn variants(mut self, article_id: u64, variants: Vec<VideoVariant>) -> Self {
        self.variants.insert(article_id, variants);
        self
    }

    /// Lists video clips alongside the article body.
    #[must_use]
    pub fn clips(mut self, article_id: u64, urls: Vec<String>) -> Self {
        let clips = urls
            .into_iter()
            .map(|video_url| InlineVideo {
                video_url,
                subtitle_url: None,
            })
            .collect();
        self.clips.insert(article_id, clips);
        self
    }

    fn inline_videos(&self, article_id: u64) -> Vec<InlineVideo> {
        self.clips.get(&article_id).cloned().unwrap_or_default()
    }

    pub fn content_calls(&self) -> Vec<(u64, Instant)> {
        self.content_calls.lock().unwrap().clone()
    }

    pub fn content_call_count(&self, article_id: u64) -> usize {
        self.content_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == article_id)
            .count()
    }

    pub fn course_calls(&self) -> Vec<(u64, SessionScope)> {
        self.course_calls.lock().unwrap().clone()
    }
}

fn platform_error(message: &str) -> ApiError {
    ApiError::Platform {
        url: "scripted".to_string(),
        code: -1,
        message: message.to_string(),
    }
}

#[async_trait]
impl CourseApi for ScriptedApi {
    async fn verify_session(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn course_info(&self, course_id: u64, scope: SessionScope) -> Result<Course, ApiError> {
        self.course_calls.lock().unwrap().push((course_id, scope));
        self.courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| platform_error("course not found"))
    }

    async fn article_content(&self, article_id: u64) -> Result<ArticleContent, ApiError> {
        self.content_calls
            .lock()
            .unwrap()
            .push((article_id, Instant::now()));
        let script = self
            .contents
            .get(&article_id)
            .cloned()
            .unwrap_or(ContentScript::AlwaysFail);
        match script {
            ContentScript::Html(html) => Ok(ArticleContent {
                html,
                inline_videos: self.inline_videos(article_id),
            }),
            ContentScript::FailTimes(times, html) => {
                let mut failures = self.failures.lock().unwrap();
                let seen = failures.entry(article_id).or_insert(0);
                if *seen < times {
                    *seen += 1;
                    Err(platform_error("temporarily unavailable"))
                } else {
                    Ok(ArticleContent {
                        html,
                        inline_videos: self.inline_videos(article_id),
                    })
                }
            }
            ContentScript::AlwaysFail => Err(platform_error("article unavailable")),
            ContentScript::Panic => panic!("malformed article payload"),
        }
    }

    async fn video_variants(
        &self,
        article_id: u64,
        _scope: SessionScope,
    ) -> Result<Vec<VideoVariant>, ApiError> {
        Ok(self.variants.get(&article_id).cloned().unwrap_or_default())
    }
}

/// Writes a small placeholder PDF instead of launching a browser.
#[derive(Debug, Default)]
pub struct FakePdfRenderer {
    writes: AtomicUsize,
}

impl FakePdfRenderer {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentRenderer for FakePdfRenderer {
    async fn render(&self, job: &RenderJob<'_>) -> Result<bool, RenderError> {
        let target = artifact_path(job.dir, job.title, PDF_EXTENSION);
        if should_skip(&target, job.overwrite) {
            return Ok(false);
        }
        std::fs::write(&target, b"%PDF-1.4 test").unwrap();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Controller wiring used by most pipeline tests: fast retries, no
/// pacing, no course delay.
pub fn controller(
    api: &Arc<ScriptedApi>,
    root: &Path,
    formats: FormatSelection,
    renderer: Option<Arc<FakePdfRenderer>>,
    cancel: &CancellationToken,
) -> CourseTraversalController {
    let http = HttpClient::new(HttpTimeouts::default()).unwrap();
    let video = VideoAcquirer::new(&http, 2, cancel.clone());
    let dyn_api: Arc<dyn CourseApi> = api.clone();
    let mut dispatcher = FormatDispatcher::new(
        Arc::clone(&dyn_api),
        video,
        Arc::new(MarkdownConverter::new()),
        formats,
    );
    if let Some(renderer) = renderer {
        dispatcher = dispatcher.with_renderer(renderer);
    }
    CourseTraversalController::new(dyn_api, ArtifactStore::new(root), dispatcher, cancel.clone())
        .with_retry_policy(RetryPolicy::new(5, TEST_RETRY_DELAY))
        .with_rate_limiter(RateLimiter::disabled())
        .with_course_delay(Duration::ZERO)
}

/// Non-empty lines of `<root>/error.txt`.
pub fn error_log_lines(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("error.txt"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Every regular file under `root`, sorted, excluding the error log.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else if path.file_name().is_some_and(|name| name != "error.txt") {
                out.push(path);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}
