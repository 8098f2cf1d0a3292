//! HTTP surface tests.
//!
//! Requests go through the full router (middleware included) with
//! `tower::ServiceExt::oneshot`; the pipeline behind it uses a stub acquirer,
//! the scripted analysis backend and the in-memory store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use factlens_api::{cors_layer, router, AppState, CAPACITY_MESSAGE};
use factlens_core::{cache_key, AnalysisResult, MediaAcquirer, MediaBundle, Result, VideoInfo};
use factlens_db::{MemoryResultStore, NoopActivityRecorder};
use factlens_inference::mock::{sample_response_json, ScriptedBackend};
use factlens_inference::{RetryPolicy, RetryingAnalyzer};
use factlens_jobs::{PipelineConfig, PipelineRunner};

/// Acquirer that blocks on a semaphore, then writes placeholder media.
struct GatedAcquirer {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl MediaAcquirer for GatedAcquirer {
    async fn probe(&self, _url: &str) -> Result<VideoInfo> {
        Ok(VideoInfo {
            title: "Uploader title".to_string(),
            duration_secs: 30,
        })
    }

    async fn acquire(&self, _url: &str, work_dir: &Path) -> Result<MediaBundle> {
        self.gate.acquire().await.unwrap().forget();
        let audio = work_dir.join("audio.mp3");
        std::fs::write(&audio, b"ID3").unwrap();
        Ok(MediaBundle {
            audio,
            keyframes: Vec::new(),
        })
    }
}

struct TestApp {
    app: Router,
    gate: Arc<Semaphore>,
    store: MemoryResultStore,
    _temp: TempDir,
}

fn test_app(open_permits: usize) -> TestApp {
    let temp = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(open_permits));
    let store = MemoryResultStore::new();
    let analyzer = RetryingAnalyzer::new(
        ScriptedBackend::always(sample_response_json(), 10),
        RetryPolicy::default().with_base_delay(Duration::from_millis(10)),
    );

    let runner = PipelineRunner::new(
        PipelineConfig::default()
            .with_temp_dir(temp.path())
            .with_max_concurrent(3),
        Arc::new(GatedAcquirer { gate: gate.clone() }),
        Arc::new(analyzer),
        Arc::new(store.clone()),
        Arc::new(NoopActivityRecorder),
    );

    TestApp {
        app: router(AppState::new(runner), cors_layer(None)),
        gate,
        store,
        _temp: temp,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_analyze(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_for_status(app: &Router, job_id: &str, wanted: &str) -> Value {
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        let (status, body) = send(app, get(&format!("/api/status/{}", job_id))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == wanted {
            return body;
        }
        if std::time::Instant::now() > deadline {
            panic!("Timeout waiting for job {} to reach {}: {}", job_id, wanted, body);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_health() {
    let t = test_app(0);
    let (status, body) = send(&t.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_root_welcome() {
    let t = test_app(0);
    let (status, body) = send(&t.app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("factlens"));
}

#[tokio::test]
async fn test_analyze_then_poll_to_complete() {
    let t = test_app(10);

    let (status, body) = send(
        &t.app,
        post_analyze(json!({"url": "https://www.youtube.com/watch?v=abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let done = wait_for_status(&t.app, &job_id, "complete").await;
    assert_eq!(done["job_id"], job_id.as_str());
    assert_eq!(done["results"]["platform"], "youtube");
    assert_eq!(done["results"]["duration_seconds"], 30);
    assert!(!done["results"]["claims"].as_array().unwrap().is_empty());
    assert!(done.get("error").is_none());
}

#[tokio::test]
async fn test_fourth_submission_gets_429() {
    let t = test_app(0);

    for i in 0..3 {
        let (status, body) = send(
            &t.app,
            post_analyze(json!({"url": format!("https://youtu.be/v{}", i)})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");
    }

    let (status, body) = send(&t.app, post_analyze(json!({"url": "https://youtu.be/v3"}))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], CAPACITY_MESSAGE);

    t.gate.add_permits(3);
}

#[tokio::test]
async fn test_cached_url_completes_immediately() {
    let t = test_app(0);
    let url = "https://youtu.be/cached";
    t.store
        .insert(
            &cache_key(url),
            url,
            AnalysisResult {
                title: "Stored".to_string(),
                ..Default::default()
            },
        )
        .await;

    let (status, body) = send(&t.app, post_analyze(json!({"url": url, "user_id": "u1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");

    let job_id = body["job_id"].as_str().unwrap();
    let (status, body) = send(&t.app, get(&format!("/api/status/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"]["title"], "Stored");
}

#[tokio::test]
async fn test_invalid_submissions_get_400() {
    let t = test_app(0);

    let (status, body) = send(&t.app, post_analyze(json!({"url": "not a url"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&t.app, post_analyze(json!({"user_id": "u1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_and_malformed_job_ids_get_404() {
    let t = test_app(0);

    let unknown = format!("/api/status/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&t.app, get(&unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");

    let (status, _) = send(&t.app, get("/api/status/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let t = test_app(0);
    let response = t.app.clone().oneshot(get("/api/health")).await.unwrap();
    let id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert_eq!(uuid::Uuid::parse_str(id).unwrap().get_version_num(), 7);
}

#[tokio::test]
async fn test_restricted_cors_allows_listed_origin() {
    let t = test_app(0);
    let temp = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(
        PipelineConfig::default().with_temp_dir(temp.path()),
        Arc::new(GatedAcquirer { gate: t.gate.clone() }),
        Arc::new(RetryingAnalyzer::new(
            ScriptedBackend::new(vec![]),
            RetryPolicy::default(),
        )),
        Arc::new(MemoryResultStore::new()),
        Arc::new(NoopActivityRecorder),
    );
    let app = router(
        AppState::new(runner),
        cors_layer(Some("https://app.example")),
    );

    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://app.example"
    );

    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
