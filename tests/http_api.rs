//! End-to-end tests of the HTTP transport: requests go through the real
//! axum router into a real `JobQueue`, with no network calls involved.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use leadforge_pipeline::ai::AiClient;
use leadforge_pipeline::api::{router, AppState};
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::domain::models::Engine;
use leadforge_pipeline::error::CoreResult;
use leadforge_pipeline::orchestrator::analyze::AnalyzeRunner;
use leadforge_pipeline::orchestrator::default_adapters::{LocalContentStore, UnavailableScreenshotter};
use leadforge_pipeline::orchestrator::runner::RunnerDeps;
use leadforge_pipeline::queue::JobQueue;
use leadforge_pipeline::remote::RemoteStore;
use serde_json::{json, Value};
use tower::ServiceExt;

struct UnreachableRemote;

#[async_trait::async_trait]
impl RemoteStore for UnreachableRemote {
    async fn upsert(&self, _engine: Engine, _key: &str, _data: &Value) -> CoreResult<String> {
        unreachable!("tests in this file never let a runner reach the remote store")
    }
}

struct UnreachableAi;

#[async_trait::async_trait]
impl AiClient for UnreachableAi {
    async fn complete(&self, _prompt: &str) -> CoreResult<String> {
        unreachable!("tests in this file never let a runner reach the AI provider")
    }
}

fn test_state(tmp: &tempfile::TempDir) -> Arc<AppState> {
    let queue = Arc::new(JobQueue::open(tmp.path().join("queue.log"), 100).unwrap());
    let deps = RunnerDeps {
        backup: Arc::new(BackupStore::new(tmp.path().join("backups"))),
        remote: Arc::new(UnreachableRemote),
    };
    let analyze_runner = Arc::new(AnalyzeRunner::new(
        reqwest::Client::new(),
        Some(Arc::new(UnreachableAi)),
        Arc::new(UnavailableScreenshotter),
        Arc::new(LocalContentStore::new(tmp.path().join("content"))),
        deps,
    ));
    Arc::new(AppState { queue, analyze_runner })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "leadforge-pipeline");
}

#[tokio::test]
async fn enqueue_then_status_then_cancel_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    let enqueue_request = Request::builder()
        .method("POST")
        .uri("/api/prospect-queue")
        .header("content-type", "application/json")
        .body(Body::from(json!({"priority": 2, "payload": {"icp_brief": "dentists in Ohio"}}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(enqueue_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert!(!job_id.is_empty());

    let status_request = Request::builder()
        .uri(format!("/api/prospect-status?job_ids={job_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(status_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(body["jobs"][0]["job_id"], job_id);
    assert_eq!(body["summary"]["queued"], 1);

    let cancel_request = Request::builder()
        .method("POST")
        .uri("/api/cancel-prospect")
        .header("content-type", "application/json")
        .body(Body::from(json!({"job_ids": [job_id]}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(cancel_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"][0]["cancelled"], true);
}

#[tokio::test]
async fn cancel_accepts_a_batch_of_job_ids_and_reports_each_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    let mut job_ids = Vec::new();
    for _ in 0..2 {
        let enqueue_request = Request::builder()
            .method("POST")
            .uri("/api/prospect-queue")
            .header("content-type", "application/json")
            .body(Body::from(json!({"payload": {"icp_brief": "dentists"}}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(enqueue_request).await.unwrap();
        let body = body_json(response).await;
        job_ids.push(body["job_id"].as_str().unwrap().to_string());
    }

    let cancel_request = Request::builder()
        .method("POST")
        .uri("/api/cancel-prospect")
        .header("content-type", "application/json")
        .body(Body::from(json!({"job_ids": [job_ids[0], "does-not-exist"]}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(cancel_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["job_id"], job_ids[0]);
    assert_eq!(results[0]["cancelled"], true);
    assert_eq!(results[1]["job_id"], "does-not-exist");
    assert_eq!(results[1]["not_found"], true);

    let status_request = Request::builder()
        .uri(format!("/api/prospect-status?job_ids={}", job_ids[1]))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(status_request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["jobs"][0]["state"], "queued");
}

#[tokio::test]
async fn status_for_one_work_type_never_leaks_jobs_from_another() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    for (route, payload) in [
        ("/api/analyze-queue", json!({"payload": {"url": "https://acme.test"}})),
        ("/api/compose-queue", json!({"payload": {"lead_id": "1", "platform": "email"}})),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri(route)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/analyze-status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(Request::builder().uri("/api/compose-status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_unknown_job_reports_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    let request = Request::builder()
        .method("POST")
        .uri("/api/cancel-analyze")
        .header("content-type", "application/json")
        .body(Body::from(json!({"job_ids": ["does-not-exist"]}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"][0]["not_found"], true);
    assert_eq!(body["results"][0]["cancelled"], false);
}

#[tokio::test]
async fn analyze_url_sync_rejects_a_flat_body_missing_url_without_touching_the_queue() {
    let tmp = tempfile::tempdir().unwrap();
    let app = router(test_state(&tmp));

    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-url")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_input");
}
