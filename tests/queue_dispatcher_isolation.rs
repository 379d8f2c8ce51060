//! Confirms worker pools are isolated per work type and that queue shutdown
//! waits for an in-flight job to finish before the pool stops, rather than
//! abandoning it mid-run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadforge_pipeline::domain::models::{Job, JobState, WorkType};
use leadforge_pipeline::error::CoreResult;
use leadforge_pipeline::queue::{spawn_workers, JobQueue, RunContext, StageRunner};
use serde_json::json;
use tempfile::tempdir;

struct SlowEcho {
    delay: Duration,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl StageRunner for SlowEcho {
    async fn run(&self, job: Job, _ctx: RunContext) -> CoreResult<serde_json::Value> {
        tokio::time::sleep(self.delay).await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(job.payload)
    }
}

#[tokio::test]
async fn a_work_type_pool_never_picks_up_another_work_type_job() {
    let dir = tempdir().unwrap();
    let queue = Arc::new(JobQueue::open(dir.path().join("queue.log"), 100).unwrap());

    let analyze_id = queue.enqueue(WorkType::AnalyzeUrl, 0, json!({"kind": "analyze"})).unwrap();
    let compose_id = queue.enqueue(WorkType::ComposeOutreach, 0, json!({"kind": "compose"})).unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let analyze_runner = Arc::new(SlowEcho { delay: Duration::from_millis(10), runs: runs.clone() });
    let mut handles = spawn_workers(queue.clone(), WorkType::AnalyzeUrl, 1, analyze_runner);

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(queue.get(&analyze_id).unwrap().state, JobState::Completed);
    assert_eq!(queue.get(&compose_id).unwrap().state, JobState::Queued);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    queue.shutdown();
    for h in handles.drain(..) {
        let _ = h.await;
    }
}

#[tokio::test]
async fn shutdown_waits_for_an_in_flight_job_before_the_pool_stops() {
    let dir = tempdir().unwrap();
    let queue = Arc::new(JobQueue::open(dir.path().join("queue.log"), 100).unwrap());
    let id = queue.enqueue(WorkType::GenerateReport, 0, json!({})).unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let runner = Arc::new(SlowEcho { delay: Duration::from_millis(150), runs: runs.clone() });
    let handles = spawn_workers(queue.clone(), WorkType::GenerateReport, 1, runner);

    // Give the worker time to dequeue and start its sleep, then shut down
    // while it is still mid-run.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(queue.get(&id).unwrap().state, JobState::Running);
    queue.shutdown();

    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1, "in-flight job must run to completion, not be dropped");
    assert_eq!(queue.get(&id).unwrap().state, JobState::Completed);
}
