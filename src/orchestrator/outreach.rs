//! `compose_outreach` stage runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{strip_markdown_fence, AiClient};
use crate::domain::models::{BackupMeta, Engine, Job};
use crate::error::{AppError, CoreResult};
use crate::queue::{RunContext, StageRunner};

use super::runner::{persist_result, RunnerDeps};

const BANNED_PHRASES: [&str; 4] = ["dear sir or madam", "to whom it may concern", "act now", "guaranteed results"];
const MIN_LENGTH: usize = 20;
const MAX_LENGTH: usize = 2_000;

#[derive(Debug, Deserialize)]
struct OutreachPayload {
    lead_id: String,
    company_name: String,
    #[serde(default = "default_platforms")]
    platforms: Vec<String>,
}

fn default_platforms() -> Vec<String> {
    vec!["email".to_string()]
}

#[derive(Debug, Clone, Serialize)]
struct VariantOutcome {
    platform: String,
    text: String,
    accepted: bool,
    rejection_reasons: Vec<String>,
}

/// Checks banned phrases, unfilled template placeholders, and length bounds.
/// Never errors - a variant that fails every check is simply `accepted: false`.
fn validate_variant(text: &str) -> (bool, Vec<String>) {
    let mut reasons = Vec::new();
    let lower = text.to_ascii_lowercase();

    for phrase in BANNED_PHRASES {
        if lower.contains(phrase) {
            reasons.push(format!("contains banned phrase: {phrase}"));
        }
    }
    if text.contains("{{") || text.contains("}}") || text.contains("[object Object]") {
        reasons.push("contains unfilled placeholder".to_string());
    }
    if text.len() < MIN_LENGTH {
        reasons.push(format!("too short ({} chars, minimum {MIN_LENGTH})", text.len()));
    }
    if text.len() > MAX_LENGTH {
        reasons.push(format!("too long ({} chars, maximum {MAX_LENGTH})", text.len()));
    }

    (reasons.is_empty(), reasons)
}

pub struct OutreachRunner {
    ai: Arc<dyn AiClient>,
    deps: RunnerDeps,
}

impl OutreachRunner {
    pub fn new(ai: Arc<dyn AiClient>, deps: RunnerDeps) -> Self {
        Self { ai, deps }
    }
}

#[async_trait]
impl StageRunner for OutreachRunner {
    async fn run(&self, job: Job, ctx: RunContext) -> CoreResult<serde_json::Value> {
        let payload: OutreachPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::invalid_input(format!("invalid outreach payload: {e}")))?;

        let mut variants = Vec::with_capacity(payload.platforms.len());
        let mut persist_failure = None;

        for (i, platform) in payload.platforms.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            ctx.report(i as u64, payload.platforms.len() as u64, Some(format!("composing {platform}")));

            let prompt = format!(
                "Write a short outreach message for {platform} addressed to {}. \
                 Keep it personal, specific, and free of generic boilerplate.",
                payload.company_name
            );
            let text = match self.ai.complete(&prompt).await {
                Ok(raw) => strip_markdown_fence(&raw).to_string(),
                Err(e) => {
                    tracing::warn!(platform, error = %e, "outreach composition failed for platform");
                    continue;
                }
            };

            let (accepted, rejection_reasons) = validate_variant(&text);
            let outcome = VariantOutcome {
                platform: platform.clone(),
                text,
                accepted,
                rejection_reasons,
            };

            let natural_key = format!("{}|{}", payload.lead_id, platform);
            let meta = BackupMeta {
                company_name: Some(payload.company_name.clone()),
                url: None,
                grade: None,
                overall_score: None,
                industry: None,
                extra: Default::default(),
            };
            let record = serde_json::to_value(&outcome)?;

            match persist_result(&self.deps, Engine::Outreach, &natural_key, record, meta).await {
                Ok(_) => variants.push(outcome),
                Err(e) => {
                    tracing::warn!(platform, error = %e, "failed to persist outreach variant");
                    persist_failure.get_or_insert(e);
                }
            }
        }

        if variants.is_empty() {
            if let Some(e) = persist_failure {
                return Err(e);
            }
        }

        Ok(serde_json::json!({
            "lead_id": payload.lead_id,
            "variants": variants,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_banned_phrases() {
        let (accepted, reasons) = validate_variant("Dear Sir or Madam, we would like to introduce our services today.");
        assert!(!accepted);
        assert!(reasons.iter().any(|r| r.contains("banned phrase")));
    }

    #[test]
    fn rejects_unfilled_placeholders() {
        let (accepted, reasons) = validate_variant("Hi {{name}}, loved your work on this long enough message.");
        assert!(!accepted);
        assert!(reasons.iter().any(|r| r.contains("placeholder")));
    }

    #[test]
    fn accepts_a_clean_message() {
        let (accepted, reasons) =
            validate_variant("Hi Jordan, I noticed your team just shipped a new pricing page and wanted to compliment the layout.");
        assert!(accepted);
        assert!(reasons.is_empty());
    }

    #[test]
    fn rejects_too_short_messages() {
        let (accepted, _) = validate_variant("Hi there!");
        assert!(!accepted);
    }
}
