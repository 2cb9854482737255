//! Integration tests for session establishment and the HTTP course API.
//!
//! Every platform origin is routed to one wiremock server.

use std::sync::Arc;
use std::time::Duration;

use course_downloader::api::{
    CourseApi, HttpCourseApi, PlatformEndpoints, SessionCredentials, establish_session,
};
use course_downloader::download::{
    ArtifactStore, CourseTraversalController, FormatDispatcher, HttpTimeouts, RateLimiter,
    RetryPolicy,
};
use course_downloader::model::{FormatSelection, SessionScope};
use course_downloader::render::MarkdownConverter;
use course_downloader::video::VideoAcquirer;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> SessionCredentials {
    SessionCredentials {
        gcid: "gcid-value".to_string(),
        gcess: "gcess-value".to_string(),
    }
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": data, "error": [] }))
}

async fn session(server: &MockServer) -> HttpCourseApi {
    establish_session(
        &credentials(),
        PlatformEndpoints::single_origin(&server.uri()),
        HttpTimeouts::default(),
    )
    .await
    .expect("session should be established")
}

// ==================== Session Tests ====================

#[tokio::test]
async fn test_session_cookies_are_sent_to_the_account_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .and(header_regex("cookie", "GCID=gcid-value"))
        .and(header_regex("cookie", "GCESS=gcess-value"))
        .respond_with(ok(json!({ "uid": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let api = session(&server).await;
    assert_eq!(api.endpoints(), &PlatformEndpoints::single_origin(&server.uri()));
}

#[tokio::test]
async fn test_session_is_retried_once_after_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": -1, "data": [], "error": { "msg": "expired" } })),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .respond_with(ok(json!({ "uid": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let api = session(&server).await;
    assert_eq!(api.endpoints().account, server.uri());
}

#[tokio::test]
async fn test_session_second_rejection_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let err = establish_session(
        &credentials(),
        PlatformEndpoints::single_origin(&server.uri()),
        HttpTimeouts::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_auth(), "expected an auth error, got {err}");
}

// ==================== Pipeline Tests ====================

async fn mount_text_course(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .respond_with(ok(json!({ "uid": 1 })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serv/v3/column/info"))
        .and(body_partial_json(json!({ "product_id": 100 })))
        .respond_with(ok(json!({
            "id": 100,
            "title": "Systems Programming",
            "is_video": false,
            "extra": { "sub": { "access_mask": 1 } }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/column/articles"))
        .respond_with(ok(json!({
            "list": [
                { "id": 11, "article_title": "01 | Memory", "chapter_id": 0 },
                { "id": 12, "article_title": "02 | Threads", "chapter_id": 0 }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/article"))
        .and(body_partial_json(json!({ "id": 11 })))
        .respond_with(ok(json!({
            "article_content": "<h2>Stack</h2><p>Frames <strong>grow</strong> down.</p>",
            "inline_video_subtitles": [
                { "video_url": format!("{}/clips/a.mp4", server.uri()), "subtitle_url": "" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/article"))
        .and(body_partial_json(json!({ "id": 12 })))
        .respond_with(ok(json!({ "article_content": "<p>Spawn them.</p>" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clips/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip".to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

fn http_controller(api: HttpCourseApi, root: &TempDir) -> CourseTraversalController {
    let cancel = CancellationToken::new();
    let video = VideoAcquirer::new(api.http(), 2, cancel.clone());
    let api: Arc<dyn CourseApi> = Arc::new(api);
    let dispatcher = FormatDispatcher::new(
        Arc::clone(&api),
        video,
        Arc::new(MarkdownConverter::new()),
        FormatSelection::MARKDOWN,
    );
    CourseTraversalController::new(api, ArtifactStore::new(root.path()), dispatcher, cancel)
        .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(10)))
        .with_rate_limiter(RateLimiter::disabled())
        .with_course_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_batch_through_http_api_writes_markdown_and_clips() {
    let server = MockServer::start().await;
    mount_text_course(&server).await;
    let root = TempDir::new().unwrap();
    let controller = http_controller(session(&server).await, &root);

    let summary = controller.run_batch(&["100".to_string()]).await;
    assert_eq!(summary.courses_completed, 1);
    assert_eq!(summary.articles_downloaded, 2);

    let md_dir = root.path().join("markdown/Systems Programming");
    let memory = std::fs::read_to_string(md_dir.join("01 _ Memory.md")).unwrap();
    assert_eq!(memory, "# 01 | Memory\n\n## Stack\n\nFrames **grow** down.\n");
    assert!(md_dir.join("02 _ Threads.md").exists());
    assert_eq!(
        std::fs::read(root.path().join("pdf/Systems Programming/01 _ Memory.mp4")).unwrap(),
        b"clip"
    );

    // The clip is already on disk, so the second run makes no media request.
    let again = controller.run_batch(&["100".to_string()]).await;
    assert_eq!(again.articles_skipped, 2);
}

#[tokio::test]
async fn test_enterprise_course_info_is_scoped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/serv/v1/user/auth"))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/v1/course/info"))
        .and(body_partial_json(json!({ "id": 77 })))
        .respond_with(ok(json!({
            "id": 77,
            "title": "Team Training",
            "sections": [
                { "title": "Week 1", "articles": [{ "id": 1, "title": "Kickoff" }] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = session(&server).await;
    let course = api.course_info(77, SessionScope::Enterprise).await.unwrap();
    assert!(course.is_video);
    assert_eq!(course.articles[0].section_title.as_deref(), Some("Week 1"));
}
