//! `prospecting` stage runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::{BackupMeta, Engine, Job};
use crate::error::{AppError, CoreResult};
use crate::queue::{RunContext, StageRunner};

use super::adapters::{ProspectCandidate, ProspectSource, ProspectVerifier};
use super::runner::{persist_result, RunnerDeps};

#[derive(Debug, Deserialize)]
struct ProspectPayload {
    icp_brief: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ProspectOutcome {
    candidate: ProspectCandidate,
    verification: super::adapters::VerificationOutcome,
}

pub struct ProspectRunner {
    source: Arc<dyn ProspectSource>,
    verifier: Arc<dyn ProspectVerifier>,
    deps: RunnerDeps,
}

impl ProspectRunner {
    pub fn new(source: Arc<dyn ProspectSource>, verifier: Arc<dyn ProspectVerifier>, deps: RunnerDeps) -> Self {
        Self { source, verifier, deps }
    }
}

#[async_trait]
impl StageRunner for ProspectRunner {
    async fn run(&self, job: Job, ctx: RunContext) -> CoreResult<serde_json::Value> {
        let payload: ProspectPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::invalid_input(format!("invalid prospect payload: {e}")))?;

        if payload.count == 0 {
            return Err(AppError::invalid_input("count must be greater than zero"));
        }

        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let candidates = self.source.find_candidates(&payload.icp_brief, payload.count).await?;

        let mut accepted = Vec::new();
        let mut persist_failure = None;

        for (i, candidate) in candidates.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            ctx.report(i as u64, candidates.len() as u64, Some(format!("verifying {}", candidate.company_name)));

            let verification = match self.verifier.verify(candidate).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(company = %candidate.company_name, error = %e, "verification failed, skipping candidate");
                    continue;
                }
            };
            if !verification.passed() {
                continue;
            }

            // Each candidate backs up and upserts independently on its own
            // natural key, so one bad upstream write never loses the
            // others already on disk.
            let meta = BackupMeta {
                company_name: Some(candidate.company_name.clone()),
                url: candidate.website.clone(),
                grade: None,
                overall_score: None,
                industry: candidate.industry.clone(),
                extra: Default::default(),
            };
            let record = serde_json::to_value(ProspectOutcome {
                candidate: candidate.clone(),
                verification,
            })?;

            match persist_result(&self.deps, Engine::Prospecting, &candidate.natural_key(), record, meta).await {
                Ok(persisted) => accepted.push(persisted),
                Err(e) => {
                    tracing::warn!(company = %candidate.company_name, error = %e, "failed to persist candidate");
                    persist_failure.get_or_insert(e);
                }
            }
        }

        if accepted.is_empty() {
            if let Some(e) = persist_failure {
                return Err(e);
            }
        }

        Ok(serde_json::json!({
            "icp_brief": payload.icp_brief,
            "requested_count": payload.count,
            "found_count": candidates.len(),
            "accepted": accepted,
        }))
    }
}
