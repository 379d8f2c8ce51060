//! Axum router implementing the HTTP API. Every handler marshals JSON
//! into a `JobQueue`/runner call and back - core logic lives in `queue`,
//! `orchestrator`, and `backup`, not here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::domain::models::{Job, WorkType};
use crate::error::ApiError;
use crate::orchestrator::analyze::AnalyzeRunner;
use crate::queue::{JobQueue, RunContext, StageRunner};

use super::dto::{
    AnalyzeUrlRequest, CancelOutcome, CancelRequest, CancelResponse, EnqueueRequest, EnqueueResponse, HealthResponse, StatusQuery,
};

pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub analyze_runner: Arc<AnalyzeRunner>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/prospect-queue", post(prospect_queue))
        .route("/api/analyze-queue", post(analyze_queue))
        .route("/api/analyze-url", post(analyze_url_sync))
        .route("/api/compose-queue", post(compose_queue))
        .route("/api/generate-queue", post(generate_queue))
        .route("/api/prospect-status", get(prospect_status))
        .route("/api/analyze-status", get(analyze_status))
        .route("/api/compose-status", get(compose_status))
        .route("/api/generate-status", get(generate_status))
        .route("/api/cancel-prospect", post(cancel_prospect))
        .route("/api/cancel-analyze", post(cancel_analyze))
        .route("/api/cancel-compose", post(cancel_compose))
        .route("/api/cancel-generate", post(cancel_generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "leadforge-pipeline",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
    })
}

fn enqueue(queue: &JobQueue, work_type: WorkType, req: EnqueueRequest) -> Result<Json<EnqueueResponse>, ApiError> {
    let job_id = queue.enqueue(work_type, req.priority, req.payload)?;
    Ok(Json(EnqueueResponse { job_id }))
}

async fn prospect_queue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    enqueue(&state.queue, WorkType::Prospecting, req)
}

async fn analyze_queue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    enqueue(&state.queue, WorkType::AnalyzeUrl, req)
}

async fn compose_queue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    enqueue(&state.queue, WorkType::ComposeOutreach, req)
}

async fn generate_queue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    enqueue(&state.queue, WorkType::GenerateReport, req)
}

/// Synchronous convenience path for a single URL: runs the analyze
/// stage runner inline, bypassing the queue entirely. Takes a flat body
/// (`url`, `company_name`, `industry`), not the `{priority, payload}`
/// envelope the queue-backed endpoints use.
async fn analyze_url_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeUrlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let payload = serde_json::json!({
        "url": req.url,
        "company_name": req.company_name,
        "industry": req.industry,
    });
    let job = Job::new(WorkType::AnalyzeUrl, 0, payload);
    let ctx = RunContext::for_sync_call(state.queue.clone(), job.id.clone());
    let result = state.analyze_runner.run(job, ctx).await?;
    Ok(Json(result))
}

fn status(queue: &JobQueue, query: StatusQuery, work_type: WorkType) -> Json<serde_json::Value> {
    let ids: Vec<String> = query
        .job_ids
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let (snapshots, summary) = queue.status(&ids);
    let filtered: Vec<_> = snapshots.into_iter().filter(|s| s.work_type == work_type).collect();
    let summary = crate::domain::models::StatusSummary::tally(&filtered);
    Json(serde_json::json!({ "jobs": filtered, "summary": summary }))
}

async fn prospect_status(State(state): State<Arc<AppState>>, Query(q): Query<StatusQuery>) -> Json<serde_json::Value> {
    status(&state.queue, q, WorkType::Prospecting)
}

async fn analyze_status(State(state): State<Arc<AppState>>, Query(q): Query<StatusQuery>) -> Json<serde_json::Value> {
    status(&state.queue, q, WorkType::AnalyzeUrl)
}

async fn compose_status(State(state): State<Arc<AppState>>, Query(q): Query<StatusQuery>) -> Json<serde_json::Value> {
    status(&state.queue, q, WorkType::ComposeOutreach)
}

async fn generate_status(State(state): State<Arc<AppState>>, Query(q): Query<StatusQuery>) -> Json<serde_json::Value> {
    status(&state.queue, q, WorkType::GenerateReport)
}

fn cancel(queue: &JobQueue, req: CancelRequest) -> Json<CancelResponse> {
    let results = req
        .job_ids
        .into_iter()
        .map(|job_id| {
            let outcome = match queue.cancel(&job_id) {
                Ok(true) => (true, false, false),
                Ok(false) => (false, false, true),
                Err(_) => (false, true, false),
            };
            CancelOutcome {
                job_id,
                cancelled: outcome.0,
                not_found: outcome.1,
                already_started: outcome.2,
            }
        })
        .collect();
    Json(CancelResponse { results })
}

async fn cancel_prospect(State(state): State<Arc<AppState>>, Json(req): Json<CancelRequest>) -> Json<CancelResponse> {
    cancel(&state.queue, req)
}

async fn cancel_analyze(State(state): State<Arc<AppState>>, Json(req): Json<CancelRequest>) -> Json<CancelResponse> {
    cancel(&state.queue, req)
}

async fn cancel_compose(State(state): State<Arc<AppState>>, Json(req): Json<CancelRequest>) -> Json<CancelResponse> {
    cancel(&state.queue, req)
}

async fn cancel_generate(State(state): State<Arc<AppState>>, Json(req): Json<CancelRequest>) -> Json<CancelResponse> {
    cancel(&state.queue, req)
}
