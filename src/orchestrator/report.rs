//! `generate_report` stage runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::models::{BackupMeta, Engine, Job};
use crate::error::{AppError, CoreResult};
use crate::queue::{RunContext, StageRunner};

use super::adapters::ContentStore;
use super::runner::{persist_result, RunnerDeps};

/// Section order is fixed so two renders of the same analysis produce byte-
/// identical documents modulo timestamps.
const SECTION_ORDER: [&str; 4] = ["summary", "scores", "issues", "recommendations"];

#[derive(Debug, Deserialize)]
struct ReportPayload {
    lead_id: String,
    #[serde(default = "default_format")]
    format: String,
    analysis: serde_json::Value,
}

fn default_format() -> String {
    "pdf".to_string()
}

fn render_document(analysis: &serde_json::Value, format: &str) -> Vec<u8> {
    let mut doc = format!("# Report ({format})\n\n");
    for section in SECTION_ORDER {
        doc.push_str(&format!("## {section}\n"));
        let value = analysis.get(section).cloned().unwrap_or(serde_json::Value::Null);
        doc.push_str(&serde_json::to_string_pretty(&value).unwrap_or_default());
        doc.push_str("\n\n");
    }
    doc.into_bytes()
}

fn content_type_for(format: &str) -> &'static str {
    match format {
        "html" => "text/html",
        "json" => "application/json",
        _ => "application/pdf",
    }
}

pub struct ReportRunner {
    content_store: Arc<dyn ContentStore>,
    deps: RunnerDeps,
}

impl ReportRunner {
    pub fn new(content_store: Arc<dyn ContentStore>, deps: RunnerDeps) -> Self {
        Self { content_store, deps }
    }
}

#[async_trait]
impl StageRunner for ReportRunner {
    async fn run(&self, job: Job, ctx: RunContext) -> CoreResult<serde_json::Value> {
        let payload: ReportPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::invalid_input(format!("invalid report payload: {e}")))?;

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        ctx.report(0, 2, Some("rendering document".to_string()));

        let bytes = render_document(&payload.analysis, &payload.format);
        let filename = format!("{}.{}", payload.lead_id, payload.format);

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        ctx.report(1, 2, Some("uploading document".to_string()));

        let blob_url = self.content_store.upload(&filename, bytes, content_type_for(&payload.format)).await?;

        // The blob itself is never part of the backup - only this metadata row is.
        let data = serde_json::json!({
            "lead_id": payload.lead_id,
            "format": payload.format,
            "blob_url": blob_url,
            "section_order": SECTION_ORDER,
            "rendered_at": chrono::Utc::now(),
        });

        let natural_key = format!("{}|{}", payload.lead_id, payload.format);
        let meta = BackupMeta {
            company_name: None,
            url: None,
            grade: None,
            overall_score: None,
            industry: None,
            extra: Default::default(),
        };

        persist_result(&self.deps, Engine::Reports, &natural_key, data, meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_fixed_order() {
        let analysis = serde_json::json!({"summary": "ok", "scores": {"seo": 90}});
        let doc = String::from_utf8(render_document(&analysis, "html")).unwrap();
        let summary_pos = doc.find("## summary").unwrap();
        let scores_pos = doc.find("## scores").unwrap();
        let issues_pos = doc.find("## issues").unwrap();
        assert!(summary_pos < scores_pos);
        assert!(scores_pos < issues_pos);
    }
}
