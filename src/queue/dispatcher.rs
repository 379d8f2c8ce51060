//! Per-work-type worker pools. Generic over a
//! `StageRunner` so the queue crate has no dependency on analyze/prospect/
//! outreach/report specifics - the orchestrator supplies those.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::domain::models::{Job, WorkType};
use crate::error::{AppError, CoreResult};

use super::job_queue::JobQueue;

/// Handed to a `StageRunner` so it can observe cancellation and report
/// progress without holding a reference to the whole queue.
pub struct RunContext {
    queue: Arc<JobQueue>,
    job_id: String,
    cancel_flag: Arc<AtomicBool>,
}

impl RunContext {
    /// Builds a context for a runner invoked outside the queue (the
    /// synchronous `/api/analyze-url` path): progress reports are
    /// accepted but ignored since no job row backs `job_id`, and the
    /// cancellation flag is unreachable from the API.
    pub fn for_sync_call(queue: Arc<JobQueue>, job_id: String) -> Self {
        Self {
            queue,
            job_id,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn report(&self, current: u64, total: u64, message: Option<String>) {
        self.queue.report_progress(&self.job_id, current, total, message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Runs one job to completion. A return of `Err(AppError::Cancelled)`
    /// means the runner itself observed `ctx.is_cancelled()` and stopped;
    /// any other error is recorded as a normal job failure.
    async fn run(&self, job: Job, ctx: RunContext) -> CoreResult<serde_json::Value>;
}

/// Spawns `count` worker tasks pulling from `work_type`'s ready heap, each
/// enforcing `work_type.timeout()` as a wall-clock cap.
pub fn spawn_workers(
    queue: Arc<JobQueue>,
    work_type: WorkType,
    count: usize,
    runner: Arc<dyn StageRunner>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_index| {
            let queue = queue.clone();
            let runner = runner.clone();
            tokio::spawn(async move {
                tracing::info!(work_type = %work_type, worker_index, "worker started");
                loop {
                    let Some(job) = queue.dequeue(work_type).await else {
                        break;
                    };
                    run_one(&queue, &runner, job).await;
                }
                tracing::info!(work_type = %work_type, worker_index, "worker stopped");
            })
        })
        .collect()
}

async fn run_one(queue: &Arc<JobQueue>, runner: &Arc<dyn StageRunner>, job: Job) {
    let job_id = job.id.clone();
    let work_type = job.work_type;
    let cancel_flag = queue.cancellation_flag(&job_id);
    let ctx = RunContext {
        queue: queue.clone(),
        job_id: job_id.clone(),
        cancel_flag,
    };

    let outcome = tokio::time::timeout(work_type.timeout(), runner.run(job, ctx)).await;

    let result = match outcome {
        Ok(Ok(value)) => queue.complete(&job_id, value),
        Ok(Err(AppError::Cancelled)) => queue.mark_cancelled(&job_id),
        Ok(Err(other)) => {
            tracing::warn!(job_id = %job_id, error = %other, "job failed");
            queue.fail(&job_id, other.to_string())
        }
        Err(_elapsed) => {
            let msg = AppError::Timeout(work_type.timeout()).to_string();
            tracing::warn!(job_id = %job_id, "job timed out");
            queue.fail(&job_id, msg)
        }
    };

    if let Err(e) = result {
        tracing::error!(job_id = %job_id, error = %e, "failed to record job outcome");
    }
}
