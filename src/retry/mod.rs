//! Offline scan + replay for failed uploads.

pub mod coordinator;

pub use coordinator::{RetryCoordinator, RetryFilter, RetryOutcome};
