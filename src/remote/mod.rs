//! The remote datastore boundary every stage runner writes through, and the
//! two implementations of it.
//!
//! `RemoteStore` is accessed purely via trait - the wire shape is
//! illustrative, not normative; only the upsert-by-natural-key contract
//! is load-bearing.

pub mod http_store;
pub mod sqlite_store;

use async_trait::async_trait;

use crate::domain::models::Engine;
use crate::error::CoreResult;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upserts `data` keyed by `natural_key` within `engine`'s table/collection.
    /// Retrying the same `(engine, natural_key)` with new `data` must never
    /// produce a duplicate row. Returns the
    /// remote-assigned id to store as `BackupRecord::database_id`.
    async fn upsert(&self, engine: Engine, natural_key: &str, data: &serde_json::Value) -> CoreResult<String>;
}

pub use http_store::HttpRemoteStore;
pub use sqlite_store::SqliteRemoteStore;
