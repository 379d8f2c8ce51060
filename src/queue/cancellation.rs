//! Per-job cooperative cancellation flags, backed by a
//! `DashMap<String, Arc<AtomicBool>>` keyed on job id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Default)]
pub struct CancellationRegistry {
    flags: DashMap<String, Arc<AtomicBool>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_for(&self, job_id: &str) -> Arc<AtomicBool> {
        self.flags
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    pub fn cancel(&self, job_id: &str) {
        self.flag_for(job_id).store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self, job_id: &str) -> bool {
        self.flags
            .get(job_id)
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Drops the flag once a job reaches a terminal state - otherwise the
    /// map grows unbounded over the life of the process.
    pub fn forget(&self, job_id: &str) {
        self.flags.remove(job_id);
    }
}
