//! Append-only persistence log backing the queue.
//!
//! Every state transition is appended as one JSON line before the caller is
//! acknowledged. On startup the log is replayed in order; the last line seen
//! for a job id wins. Jobs still `running` after replay are moved back to
//! `queued` - the process that was running them is gone.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::models::{Job, JobState};
use crate::error::CoreResult;

pub struct PersistenceLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl PersistenceLog {
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Appends one job snapshot and fsyncs before returning, so the caller's
    /// "acknowledged" really means "on disk".
    pub fn append(&self, job: &Job) -> CoreResult<()> {
        let mut line = serde_json::to_vec(job)?;
        line.push(b'\n');
        let mut file = self.file.lock().expect("persistence log mutex poisoned");
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Replays the log into a job table, moving any job still `running` back
    /// to `queued`. Returns the rebuilt table plus a flag for which job ids
    /// were requeued, so the caller can re-append those transitions.
    pub fn replay(&self) -> CoreResult<HashMap<String, Job>> {
        let mut jobs: HashMap<String, Job> = HashMap::new();
        let reader = match std::fs::File::open(&self.path) {
            Ok(f) => std::io::BufReader::new(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(e.into()),
        };

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Job>(&line) {
                Ok(job) => {
                    jobs.insert(job.id.clone(), job);
                }
                Err(e) => tracing::warn!(error = %e, "skipping unreadable persistence log line"),
            }
        }

        let mut requeued = Vec::new();
        for job in jobs.values_mut() {
            if job.state == JobState::Running {
                job.state = JobState::Queued;
                job.started_at = None;
                requeued.push(job.clone());
            }
        }
        for job in &requeued {
            self.append(job)?;
        }

        Ok(jobs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::WorkType;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn replay_requeues_running_jobs() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("queue.log");
        let log = PersistenceLog::open(&log_path).unwrap();

        let mut job = Job::new(WorkType::AnalyzeUrl, 0, json!({}));
        log.append(&job).unwrap();
        job.state = JobState::Running;
        job.started_at = Some(chrono::Utc::now());
        log.append(&job).unwrap();

        let replayed = log.replay().unwrap();
        let restored = replayed.get(&job.id).unwrap();
        assert_eq!(restored.state, JobState::Queued);
        assert!(restored.started_at.is_none());
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = PersistenceLog::open(dir.path().join("does-not-exist.log")).unwrap();
        assert!(log.replay().unwrap().is_empty());
    }

    #[test]
    fn later_lines_win_for_same_job_id() {
        let dir = tempdir().unwrap();
        let log = PersistenceLog::open(dir.path().join("queue.log")).unwrap();

        let mut job = Job::new(WorkType::AnalyzeUrl, 0, json!({}));
        log.append(&job).unwrap();
        job.state = JobState::Completed;
        job.result = Some(json!({"ok": true}));
        log.append(&job).unwrap();

        let replayed = log.replay().unwrap();
        assert_eq!(replayed.get(&job.id).unwrap().state, JobState::Completed);
    }
}
