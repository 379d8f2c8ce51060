//! The stage-runner shape common to every work type:
//! `parse → work → backup.save → remote.upsert → mark uploaded/failed`.
//! Concrete runners (analyze/prospect/outreach/report) do steps 1-2
//! themselves and call `persist_result` for steps 3-5, so the
//! backup-precedes-remote-write invariant lives in exactly one place.

use std::sync::Arc;

use crate::backup::BackupStore;
use crate::domain::models::{BackupMeta, Engine};
use crate::error::CoreResult;
use crate::remote::RemoteStore;

#[derive(Clone)]
pub struct RunnerDeps {
    pub backup: Arc<BackupStore>,
    pub remote: Arc<dyn RemoteStore>,
}

/// Saves `data` locally, then attempts the remote upsert. On success the
/// backup is flipped to `uploaded` and `{data, database_id}` is returned as
/// the job result; on failure the backup is flipped to `failed` and the
/// error is propagated so the caller's job ends up `failed` too - the
/// backup itself is never lost either way.
pub async fn persist_result(
    deps: &RunnerDeps,
    engine: Engine,
    natural_key: &str,
    data: serde_json::Value,
    meta: BackupMeta,
) -> CoreResult<serde_json::Value> {
    let path = deps.backup.save(engine, data.clone(), meta)?;

    match deps.remote.upsert(engine, natural_key, &data).await {
        Ok(database_id) => match deps.backup.mark_uploaded(&path, &database_id) {
            Ok(()) => Ok(serde_json::json!({ "data": data, "database_id": database_id })),
            Err(e) => {
                // The remote write already succeeded; a local I/O failure here
                // must not surface as an upload failure, or a retry would
                // re-upsert a record the remote already has. Degrade to
                // `failed` so the operator's replay is just an idempotent upsert.
                deps.backup.mark_failed(&path, e.to_string())?;
                Err(e)
            }
        },
        Err(e) => {
            deps.backup.mark_failed(&path, e.to_string())?;
            Err(e)
        }
    }
}
