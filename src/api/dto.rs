//! Request/response shapes for the HTTP transport. These are
//! wire-format only - no business logic lives here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub priority: i32,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

/// Flat body for the synchronous `/api/analyze-url` path - no `payload`
/// wrapper, unlike the queue-backed endpoints.
#[derive(Debug, Deserialize)]
pub struct AnalyzeUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub job_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub job_id: String,
    pub cancelled: bool,
    pub not_found: bool,
    pub already_started: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub results: Vec<CancelOutcome>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
