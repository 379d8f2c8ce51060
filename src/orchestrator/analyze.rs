//! `analyze_url` stage runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ai::{strip_markdown_fence, AiClient};
use crate::discovery;
use crate::domain::models::{BackupMeta, Engine, Job};
use crate::error::{AppError, CoreResult};
use crate::queue::{RunContext, StageRunner};

use super::adapters::{ContentStore, Screenshotter, Viewport};
use super::grade::{grade_for, overall_score, DimensionScore};
use super::runner::{persist_result, RunnerDeps};

const AI_CALL_ATTEMPTS: u32 = 3;
const AI_CALL_BASE_DELAY: Duration = Duration::from_millis(500);
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(30);

/// The six score dimensions the analyzer fans out per site (distinct from
/// `domain::models::Dimension`, the four axes the AI page-selector picks
/// pages for).
const SCORE_DIMENSIONS: [&str; 6] = ["seo", "content", "visual_desktop", "visual_mobile", "social", "accessibility"];

#[derive(Debug, Deserialize)]
struct AnalyzePayload {
    url: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DimensionResponse {
    score: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    strengths: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
struct DimensionOutcome {
    score: Option<f64>,
    issues: Vec<String>,
    strengths: Vec<String>,
    screenshot_url: Option<String>,
}

pub struct AnalyzeRunner {
    http: reqwest::Client,
    ai: Option<Arc<dyn AiClient>>,
    screenshotter: Arc<dyn Screenshotter>,
    content_store: Arc<dyn ContentStore>,
    deps: RunnerDeps,
}

impl AnalyzeRunner {
    pub fn new(
        http: reqwest::Client,
        ai: Option<Arc<dyn AiClient>>,
        screenshotter: Arc<dyn Screenshotter>,
        content_store: Arc<dyn ContentStore>,
        deps: RunnerDeps,
    ) -> Self {
        Self { http, ai, screenshotter, content_store, deps }
    }

    async fn score_dimension(&self, dimension: &str, url: &str) -> DimensionOutcome {
        let mut outcome = self.score_dimension_text(dimension, url).await;

        let viewport = match dimension {
            "visual_desktop" => Some(Viewport::Desktop),
            "visual_mobile" => Some(Viewport::Mobile),
            _ => None,
        };
        if let Some(viewport) = viewport {
            outcome.screenshot_url = self.capture_screenshot(url, viewport).await;
        }

        outcome
    }

    async fn capture_screenshot(&self, url: &str, viewport: Viewport) -> Option<String> {
        let bytes = match tokio::time::timeout(SCREENSHOT_TIMEOUT, self.screenshotter.capture(url, viewport)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::warn!(viewport = viewport.as_str(), error = %e, "screenshot capture failed, nulling it");
                return None;
            }
            Err(_) => {
                tracing::warn!(viewport = viewport.as_str(), "screenshot capture timed out, nulling it");
                return None;
            }
        };

        let filename = format!("{}-{}.png", slug_for_url(url), viewport.as_str());
        match self.content_store.upload(&filename, bytes, "image/png").await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(viewport = viewport.as_str(), error = %e, "screenshot upload failed, nulling it");
                None
            }
        }
    }

    async fn score_dimension_text(&self, dimension: &str, url: &str) -> DimensionOutcome {
        let Some(ai) = &self.ai else {
            return DimensionOutcome::default();
        };

        let prompt = format!(
            "Audit {url} for the {dimension} dimension of a website quality review. \
             Respond with ONLY a JSON object {{\"score\": 0-100, \"issues\": [...], \"strengths\": [...]}}."
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match ai.complete(&prompt).await {
                Ok(text) => {
                    let cleaned = strip_markdown_fence(&text);
                    match serde_json::from_str::<DimensionResponse>(cleaned) {
                        Ok(parsed) => {
                            return DimensionOutcome {
                                score: Some(parsed.score.clamp(0.0, 100.0)),
                                issues: parsed.issues,
                                strengths: parsed.strengths,
                                screenshot_url: None,
                            }
                        }
                        Err(_) if attempt >= AI_CALL_ATTEMPTS => return DimensionOutcome::default(),
                        Err(_) => {}
                    }
                }
                Err(e) if !e.is_retryable() || attempt >= AI_CALL_ATTEMPTS => {
                    tracing::warn!(dimension, error = %e, "dimension scoring failed, nulling it");
                    return DimensionOutcome::default();
                }
                Err(_) => {}
            }
            let delay = AI_CALL_BASE_DELAY * 2u32.pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Filename-safe stand-in for a URL, reusing the same slug discipline
/// `BackupStore` uses for its record filenames.
fn slug_for_url(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[async_trait]
impl StageRunner for AnalyzeRunner {
    async fn run(&self, job: Job, ctx: RunContext) -> CoreResult<serde_json::Value> {
        let payload: AnalyzePayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::invalid_input(format!("invalid analyze payload: {e}")))?;
        let site_root = Url::parse(&payload.url).map_err(|e| AppError::invalid_input(format!("invalid url: {e}")))?;

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        ctx.report(0, SCORE_DIMENSIONS.len() as u64 + 1, Some("discovering pages".to_string()));
        let plan = discovery::build_plan(&self.http, &site_root, self.ai.as_deref()).await?;

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut outcomes = Vec::with_capacity(SCORE_DIMENSIONS.len());
        for (i, dimension) in SCORE_DIMENSIONS.iter().enumerate() {
            let outcome = self.score_dimension(dimension, &payload.url).await;
            outcomes.push((*dimension, outcome));
            ctx.report(
                i as u64 + 1,
                SCORE_DIMENSIONS.len() as u64 + 1,
                Some(format!("scored {dimension}")),
            );
        }

        let dim_scores: Vec<DimensionScore> = outcomes.iter().map(|(_, o)| DimensionScore { score: o.score }).collect();
        let score = overall_score(&dim_scores);
        let grade = grade_for(&dim_scores);

        let critical_findings: Vec<String> = outcomes
            .iter()
            .flat_map(|(dim, o)| o.issues.iter().map(move |issue| format!("[{dim}] {issue}")))
            .collect();

        let issues_json: serde_json::Value = outcomes
            .iter()
            .map(|(dim, o)| {
                (
                    dim.to_string(),
                    if o.score.is_none() {
                        serde_json::Value::Null
                    } else {
                        serde_json::json!({
                            "score": o.score,
                            "issues": o.issues,
                            "strengths": o.strengths,
                            "screenshot_url": o.screenshot_url,
                        })
                    },
                )
            })
            .collect::<serde_json::Map<_, _>>()
            .into();

        let discovery_log = serde_json::json!({
            "summary": format!("analyzed {} candidate pages", plan.all_pages.len()),
            "all_pages": plan.all_pages,
            "total_pages_count": plan.all_pages.len(),
            "ai_selection": {
                "reasoning": plan.selection.reasoning,
                "selected_pages": plan.selection,
                "pages_analyzed": [&payload.url],
            },
            "discovery_issues": plan.issues,
            "critical_findings": critical_findings,
            "technical_details": { "sources": plan.sources },
            "analysis_metrics": { "overall_score": score, "grade": grade.as_str() },
            "logged_at": chrono::Utc::now(),
        });

        let data = serde_json::json!({
            "url": payload.url,
            "overall_score": score,
            "grade": grade.as_str(),
            "issues": issues_json,
            "discovery_log": discovery_log,
        });

        let meta = BackupMeta {
            company_name: payload.company_name.clone(),
            url: Some(payload.url.clone()),
            grade: Some(grade.as_str().to_string()),
            overall_score: Some(score),
            industry: payload.industry.clone(),
            extra: Default::default(),
        };

        persist_result(&self.deps, Engine::Analysis, &payload.url, data, meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_requires_a_url_field() {
        let bad: Result<AnalyzePayload, _> = serde_json::from_value(serde_json::json!({}));
        assert!(bad.is_err());
    }
}
