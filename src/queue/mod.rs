//! Durable, concurrent, per-work-type job queue.

pub mod cancellation;
pub mod dispatcher;
pub mod job_queue;
pub mod log;

pub use dispatcher::{spawn_workers, RunContext, StageRunner};
pub use job_queue::JobQueue;
