//! Router tests over the in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use vapi_api::{create_router, ApiConfig, AppState};
use vapi_media::{MediaConfig, MediaInspector};
use vapi_queue::{BrokerConfig, BrokerManager, MemoryBroker, TaskService};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

struct Harness {
    app: Router,
    memory: MemoryBroker,
    tasks: TaskService,
    _storage: tempfile::TempDir,
}

fn harness() -> Harness {
    let memory = MemoryBroker::new();
    let broker_config = BrokerConfig {
        url: "memory://".to_string(),
        retry_attempts: 2,
        retry_backoff: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(2),
        ..BrokerConfig::default()
    };
    let tasks = TaskService::new(Arc::new(BrokerManager::new(
        Arc::new(memory.clone()),
        broker_config,
    )));
    let storage = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(storage.path().join("2024/01/02")).unwrap();
    std::fs::write(storage.path().join("2024/01/02/out.txt"), b"artifact").unwrap();

    let config = ApiConfig {
        api_key: Some(KEY.to_string()),
        ..ApiConfig::default()
    };
    let media = MediaInspector::new(&MediaConfig {
        temp_dir: storage.path().join("scratch"),
        download_timeout: Duration::from_secs(5),
        ..MediaConfig::default()
    })
    .unwrap();
    let state = AppState::new(config, tasks.clone(), storage.path(), media);

    Harness {
        app: create_router(state, None),
        memory,
        tasks,
        _storage: storage,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-API-Key", KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("X-API-Key", KEY)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_submit_then_poll() {
    let h = harness();

    let (status, body) = call(
        &h.app,
        post(
            "/api/v1/media/media-to-mp3",
            json!({
                "media_url": "https://example.com/talk.mp4",
                "bitrate": "128k",
                "webhook_url": "https://hooks.example.com/done"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, record) = call(&h.app, get(&format!("/api/v1/jobs/{job_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["task_type"], "extract_audio");
    assert_eq!(record["status"], "queued");
    assert_eq!(record["callback_address"], "https://hooks.example.com/done");
    assert_eq!(
        record["arguments"],
        json!({"media_url": "https://example.com/talk.mp4", "bitrate": "128k"})
    );
}

#[tokio::test]
async fn test_caller_supplied_id_and_duplicate() {
    let h = harness();
    let body = json!({
        "video_url": "https://example.com/v.mp4",
        "id": "job-fixed-1"
    });

    let (status, receipt) = call(&h.app, post("/api/v1/image/thumbnail", body.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(receipt["job_id"], "job-fixed-1");

    let (status, error) = call(&h.app, post("/api/v1/image/thumbnail", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["status"], "error");
    assert_eq!(error["error"], "conflict_error");
}

#[tokio::test]
async fn test_meme_overlay_maps_to_overlay_task() {
    let h = harness();
    let (status, receipt) = call(
        &h.app,
        post(
            "/api/v1/video/meme-overlay",
            json!({
                "video_url": "https://example.com/v.mp4",
                "meme_url": "https://example.com/m.png",
                "position": "x=10%,y=20%"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let job_id = receipt["job_id"].as_str().unwrap();
    let record = h.tasks.get_status(&job_id.into()).await.unwrap().unwrap();
    assert_eq!(record.task_type, "overlay_image_on_video");
}

#[tokio::test]
async fn test_validation_errors() {
    let h = harness();

    let (status, error) = call(
        &h.app,
        post(
            "/api/v1/video/concatenate",
            json!({"video_urls": ["https://example.com/a.mp4"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "validation_error");

    let (status, _) = call(
        &h.app,
        post("/api/v1/video/caption", json!({"video_url": "https://example.com/v.mp4"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.app,
        post(
            "/api/v1/image/thumbnail",
            json!({"video_url": "https://example.com/v.mp4", "id": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generic_route() {
    let h = harness();

    let (status, receipt) = call(
        &h.app,
        post(
            "/api/v1/tasks/generate_thumbnail",
            json!({"video_url": "https://example.com/v.mp4", "id": "generic-1", "time": 3}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(receipt["job_id"], "generic-1");

    let record = h.tasks.get_status(&"generic-1".into()).await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&record.arguments).unwrap(),
        json!({"video_url": "https://example.com/v.mp4", "time": 3})
    );

    let (status, error) = call(&h.app, post("/api/v1/tasks/transcribe", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "Unknown task type: transcribe");
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let h = harness();
    let (status, error) = call(&h.app, get("/api/v1/jobs/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "not_found_error");
}

#[tokio::test]
async fn test_api_key_required() {
    let h = harness();

    let request = Request::get("/api/v1/system/queue").body(Body::empty()).unwrap();
    let (status, error) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["message"], "API key is required");

    let request = Request::get("/api/v1/system/queue")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Health routes stay open
    let request = Request::get("/api/v1/system/health").body(Body::empty()).unwrap();
    let (status, body) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_queue_stats() {
    let h = harness();
    for _ in 0..2 {
        call(
            &h.app,
            post(
                "/api/v1/image/thumbnail",
                json!({"video_url": "https://example.com/v.mp4"}),
            ),
        )
        .await;
    }

    let (status, stats) = call(&h.app, get("/api/v1/system/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["queue_length"], 2);
    assert_eq!(stats["total_tasks"], 2);
    assert_eq!(stats["tasks_by_status"]["queued"], 2);
}

#[tokio::test]
async fn test_broker_outage_is_503() {
    let h = harness();
    h.memory.fail_next_connects(10);

    let (status, error) = call(
        &h.app,
        post(
            "/api/v1/image/thumbnail",
            json!({"video_url": "https://example.com/v.mp4"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error["error"], "service_unavailable");

    let request = Request::get("/ready").body(Body::empty()).unwrap();
    let (status, body) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["broker"]["status"], "error");
}

#[tokio::test]
async fn test_storage_is_served() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/storage/2024/01/02/out.txt").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"artifact");
}

#[tokio::test]
async fn test_media_info_rejects_bad_input() {
    let h = harness();

    let (status, error) = call(
        &h.app,
        post("/api/v1/ffmpeg/media-info", json!({"media_url": "not a url"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "validation_error");

    let (status, _) = call(
        &h.app,
        post(
            "/api/v1/ffmpeg/media-info",
            json!({"media_url": "https://example.com/a.mp4", "extra": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::post("/api/v1/ffmpeg/media-info")
        .header("content-type", "application/json")
        .body(Body::from(json!({"media_url": "https://example.com/a.mp4"}).to_string()))
        .unwrap();
    let (status, _) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_media_info_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let h = harness();

    let (status, error) = call(
        &h.app,
        post(
            "/api/v1/ffmpeg/media-info",
            json!({"media_url": format!("{}/missing.mp4", server.uri())}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["status"], "error");
    assert_eq!(error["error"], "processing_error");
    assert!(error["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_system_version_is_open() {
    let h = harness();
    let request = Request::get("/api/v1/system/version").body(Body::empty()).unwrap();
    let (status, body) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_version"], "v1");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["platform"].as_str().unwrap().contains(std::env::consts::OS));
}

#[tokio::test]
async fn test_system_status() {
    let h = harness();
    call(
        &h.app,
        post(
            "/api/v1/image/thumbnail",
            json!({"video_url": "https://example.com/v.mp4"}),
        ),
    )
    .await;

    let (status, body) = call(&h.app, get("/api/v1/system/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["queue"]["queue_length"], 1);
    assert_eq!(body["queue"]["tasks_by_status"]["queued"], 1);
    assert!(body["system"]["memory"]["total"].is_u64());
    assert!(body["system"]["cpu_percent"].is_number());

    let request = Request::get("/api/v1/system/status").body(Body::empty()).unwrap();
    let (status, _) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
