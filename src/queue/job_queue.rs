//! The durable, concurrent job queue itself.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::domain::models::{Job, JobSnapshot, JobState, Progress, StatusSummary, WorkType};
use crate::error::{AppError, CoreResult};

use super::cancellation::CancellationRegistry;
use super::log::PersistenceLog;

const ALL_WORK_TYPES: [WorkType; 5] = [
    WorkType::Prospecting,
    WorkType::AnalyzeUrl,
    WorkType::AnalyzeProspect,
    WorkType::ComposeOutreach,
    WorkType::GenerateReport,
];

#[derive(Clone)]
struct ReadyEntry {
    priority: i32,
    enqueued_at: DateTime<Utc>,
    job_id: String,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueued_at == other.enqueued_at
    }
}
impl Eq for ReadyEntry {}

impl Ord for ReadyEntry {
    /// `priority DESC, enqueued_at ASC`: higher priority pops
    /// first; ties broken by whichever entry is older.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}
impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct JobQueue {
    jobs: Mutex<HashMap<String, Job>>,
    ready: Mutex<HashMap<WorkType, BinaryHeap<ReadyEntry>>>,
    notify: HashMap<WorkType, Notify>,
    cancellation: CancellationRegistry,
    log: PersistenceLog,
    high_water_mark: usize,
    shutting_down: AtomicBool,
}

impl JobQueue {
    /// Opens (or creates) the persistence log at `log_path`, replaying it -
    /// jobs left `running` come back as `queued` and rejoin their ready heap.
    pub fn open(log_path: impl Into<std::path::PathBuf>, high_water_mark: usize) -> CoreResult<Self> {
        let log = PersistenceLog::open(log_path)?;
        let jobs = log.replay()?;

        let mut ready: HashMap<WorkType, BinaryHeap<ReadyEntry>> =
            ALL_WORK_TYPES.iter().map(|wt| (*wt, BinaryHeap::new())).collect();
        for job in jobs.values() {
            if job.state == JobState::Queued {
                ready.entry(job.work_type).or_default().push(ReadyEntry {
                    priority: job.priority,
                    enqueued_at: job.enqueued_at,
                    job_id: job.id.clone(),
                });
            }
        }

        let notify = ALL_WORK_TYPES.iter().map(|wt| (*wt, Notify::new())).collect();

        Ok(Self {
            jobs: Mutex::new(jobs),
            ready: Mutex::new(ready),
            notify,
            cancellation: CancellationRegistry::new(),
            log,
            high_water_mark,
            shutting_down: AtomicBool::new(false),
        })
    }

    fn non_terminal_count(jobs: &HashMap<String, Job>) -> usize {
        jobs.values().filter(|j| !j.state.is_terminal()).count()
    }

    /// Non-blocking by design. Fails fast once the
    /// queue holds `high_water_mark` non-terminal jobs.
    pub fn enqueue(&self, work_type: WorkType, priority: i32, payload: serde_json::Value) -> CoreResult<String> {
        let mut jobs = self.jobs.lock().expect("job table mutex poisoned");
        if Self::non_terminal_count(&jobs) >= self.high_water_mark {
            return Err(AppError::transient(format!(
                "queue at high-water mark ({} jobs)",
                self.high_water_mark
            )));
        }

        let job = Job::new(work_type, priority, payload);
        self.log.append(&job)?;

        let entry = ReadyEntry {
            priority: job.priority,
            enqueued_at: job.enqueued_at,
            job_id: job.id.clone(),
        };
        let job_id = job.id.clone();
        jobs.insert(job_id.clone(), job);
        drop(jobs);

        self.ready.lock().expect("ready heap mutex poisoned").entry(work_type).or_default().push(entry);
        if let Some(notify) = self.notify.get(&work_type) {
            notify.notify_one();
        }
        Ok(job_id)
    }

    /// Blocks until a job of `work_type` is ready or the queue is shutting down.
    pub async fn dequeue(&self, work_type: WorkType) -> Option<Job> {
        loop {
            let notified = self.notify.get(&work_type).map(|n| n.notified());

            {
                let mut ready = self.ready.lock().expect("ready heap mutex poisoned");
                if let Some(entry) = ready.get_mut(&work_type).and_then(|h| h.pop()) {
                    let mut jobs = self.jobs.lock().expect("job table mutex poisoned");
                    if let Some(job) = jobs.get_mut(&entry.job_id) {
                        if job.state != JobState::Queued {
                            // stale ready-heap entry: the job already left `queued`
                            // (e.g. cancelled) without the heap entry being removed.
                            continue;
                        }
                        if self.cancellation.is_cancelled(&job.id) {
                            job.state = JobState::Cancelled;
                            job.ended_at = Some(Utc::now());
                            let _ = self.log.append(job);
                            self.cancellation.forget(&job.id);
                            continue;
                        }
                        job.state = JobState::Running;
                        job.started_at = Some(Utc::now());
                        let _ = self.log.append(job);
                        return Some(job.clone());
                    }
                    continue;
                }
                if self.shutting_down.load(AtomicOrdering::Relaxed) {
                    return None;
                }
            }

            match notified {
                Some(n) => n.await,
                None => return None,
            }
        }
    }

    pub fn report_progress(&self, job_id: &str, current: u64, total: u64, message: Option<String>) {
        if let Some(job) = self.jobs.lock().expect("job table mutex poisoned").get_mut(job_id) {
            job.progress = Progress::new(current, total, message);
        }
    }

    pub fn complete(&self, job_id: &str, result: serde_json::Value) -> CoreResult<()> {
        self.finish(job_id, JobState::Completed, Some(result), None)
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) -> CoreResult<()> {
        self.finish(job_id, JobState::Failed, None, Some(error.into()))
    }

    /// Used when a runner observes the cooperative cancellation signal before
    /// completing - the only way a `running` job ends up
    /// `cancelled` rather than `completed`/`failed`.
    pub fn mark_cancelled(&self, job_id: &str) -> CoreResult<()> {
        self.finish(job_id, JobState::Cancelled, None, None)
    }

    fn finish(
        &self,
        job_id: &str,
        state: JobState,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> CoreResult<()> {
        let mut jobs = self.jobs.lock().expect("job table mutex poisoned");
        let job = jobs.get_mut(job_id).ok_or_else(|| AppError::not_found(format!("job {job_id} not found")))?;
        job.state = state;
        job.result = result;
        job.error = error;
        job.ended_at = Some(Utc::now());
        self.log.append(job)?;
        self.cancellation.forget(job_id);
        Ok(())
    }

    /// Succeeds only while the job is still `queued`; a
    /// `running` job just has its cooperative flag raised.
    pub fn cancel(&self, job_id: &str) -> CoreResult<bool> {
        self.cancellation.cancel(job_id);

        let mut jobs = self.jobs.lock().expect("job table mutex poisoned");
        let job = jobs.get_mut(job_id).ok_or_else(|| AppError::not_found(format!("job {job_id} not found")))?;
        if job.state == JobState::Queued {
            job.state = JobState::Cancelled;
            job.ended_at = Some(Utc::now());
            self.log.append(job)?;
            self.cancellation.forget(job_id);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn cancellation_flag(&self, job_id: &str) -> std::sync::Arc<AtomicBool> {
        self.cancellation.flag_for(job_id)
    }

    pub fn status(&self, job_ids: &[String]) -> (Vec<JobSnapshot>, StatusSummary) {
        let jobs = self.jobs.lock().expect("job table mutex poisoned");
        let snapshots: Vec<JobSnapshot> = if job_ids.is_empty() {
            jobs.values().map(JobSnapshot::from).collect()
        } else {
            job_ids.iter().filter_map(|id| jobs.get(id)).map(JobSnapshot::from).collect()
        };
        let summary = StatusSummary::tally(&snapshots);
        (snapshots, summary)
    }

    pub fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.lock().expect("job table mutex poisoned").get(job_id).map(JobSnapshot::from)
    }

    /// Drops terminal jobs older than `max_age` from the in-memory table.
    /// Never touches `queued`/`running` jobs.
    pub fn prune_terminal(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut jobs = self.jobs.lock().expect("job table mutex poisoned");
        let before = jobs.len();
        jobs.retain(|_, job| !(job.state.is_terminal() && job.ended_at.map(|t| t < cutoff).unwrap_or(false)));
        before - jobs.len()
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, AtomicOrdering::Relaxed);
        for notify in self.notify.values() {
            notify.notify_waiters();
        }
    }
}
