//! Offline scan + replay tool for failed uploads, also invocable on
//! process startup.

use std::sync::Arc;

use crate::backup::BackupStore;
use crate::domain::models::Engine;
use crate::error::CoreResult;
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Default)]
pub struct RetryFilter {
    pub engine: Option<Engine>,
    pub company_contains: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RetryOutcome {
    pub file_id: String,
    pub engine: Engine,
    pub company_name: Option<String>,
    pub succeeded: bool,
    pub detail: Option<String>,
}

pub struct RetryCoordinator {
    backup: Arc<BackupStore>,
    remote: Arc<dyn RemoteStore>,
}

impl RetryCoordinator {
    pub fn new(backup: Arc<BackupStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { backup, remote }
    }

    /// Enumerates failed records matching `filter` without writing anything -
    /// dry-run is mandatory for the actual retry path, this is what backs it
    ///.
    pub fn plan(&self, filter: &RetryFilter) -> CoreResult<Vec<RetryOutcome>> {
        let mut candidates = self.backup.list_failed(filter.engine)?;
        if let Some(needle) = &filter.company_contains {
            candidates.retain(|(_, r)| r.company_name.as_deref().map(|c| c.contains(needle.as_str())).unwrap_or(false));
        }
        if let Some(limit) = filter.limit {
            candidates.truncate(limit);
        }

        Ok(candidates
            .into_iter()
            .map(|(_, r)| RetryOutcome {
                file_id: r.file_id,
                engine: r.engine,
                company_name: r.company_name,
                succeeded: false,
                detail: Some("would retry upload".to_string()),
            })
            .collect())
    }

    /// Replays every matching failed record's upsert. On success the backup
    /// moves back to `leads/` as `uploaded`; on failure it stays in
    /// `failed-uploads/` with `upload_error`/`failed_at` refreshed.
    pub async fn run(&self, filter: &RetryFilter) -> CoreResult<Vec<RetryOutcome>> {
        let mut candidates = self.backup.list_failed(filter.engine)?;
        if let Some(needle) = &filter.company_contains {
            candidates.retain(|(_, r)| r.company_name.as_deref().map(|c| c.contains(needle.as_str())).unwrap_or(false));
        }
        if let Some(limit) = filter.limit {
            candidates.truncate(limit);
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        for (path, record) in candidates {
            let natural_key = record.url.clone().unwrap_or_else(|| record.file_id.clone());
            match self.remote.upsert(record.engine, &natural_key, &record.data).await {
                Ok(database_id) => {
                    self.backup.mark_retried_success(&path, &database_id)?;
                    outcomes.push(RetryOutcome {
                        file_id: record.file_id,
                        engine: record.engine,
                        company_name: record.company_name,
                        succeeded: true,
                        detail: Some(database_id),
                    });
                }
                Err(e) => {
                    self.backup.mark_retry_failed(&path, e.to_string())?;
                    outcomes.push(RetryOutcome {
                        file_id: record.file_id,
                        engine: record.engine,
                        company_name: record.company_name,
                        succeeded: false,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    struct AlwaysSucceeds;

    #[async_trait]
    impl RemoteStore for AlwaysSucceeds {
        async fn upsert(&self, _engine: Engine, _key: &str, _data: &serde_json::Value) -> CoreResult<String> {
            Ok("db-1".to_string())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl RemoteStore for AlwaysFails {
        async fn upsert(&self, _engine: Engine, _key: &str, _data: &serde_json::Value) -> CoreResult<String> {
            Err(crate::error::AppError::transient("still down"))
        }
    }

    fn seed_failed_record(backup: &BackupStore, company: &str) {
        let meta = crate::domain::models::BackupMeta {
            company_name: Some(company.to_string()),
            url: Some(format!("https://{company}.test")),
            grade: None,
            overall_score: None,
            industry: None,
            extra: Default::default(),
        };
        let path = backup.save(Engine::Analysis, json!({"score": 10}), meta).unwrap();
        backup.mark_failed(&path, "Invalid API key").unwrap();
    }

    #[tokio::test]
    async fn run_moves_successful_retries_back_to_uploaded() {
        let dir = tempdir().unwrap();
        let backup = Arc::new(BackupStore::new(dir.path()));
        seed_failed_record(&backup, "Acme");

        let coordinator = RetryCoordinator::new(backup.clone(), Arc::new(AlwaysSucceeds));
        let outcomes = coordinator.run(&RetryFilter::default()).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded);
        assert!(backup.list_failed(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_leaves_repeat_failures_in_failed_uploads() {
        let dir = tempdir().unwrap();
        let backup = Arc::new(BackupStore::new(dir.path()));
        seed_failed_record(&backup, "Acme");

        let coordinator = RetryCoordinator::new(backup.clone(), Arc::new(AlwaysFails));
        let outcomes = coordinator.run(&RetryFilter::default()).await.unwrap();

        assert!(!outcomes[0].succeeded);
        let failed = backup.list_failed(None).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1.retry_count, 2);
    }

    #[tokio::test]
    async fn plan_never_writes_anything() {
        let dir = tempdir().unwrap();
        let backup = Arc::new(BackupStore::new(dir.path()));
        seed_failed_record(&backup, "Acme");

        let coordinator = RetryCoordinator::new(backup.clone(), Arc::new(AlwaysSucceeds));
        let outcomes = coordinator.plan(&RetryFilter::default()).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].succeeded);
        assert_eq!(backup.list_failed(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn company_filter_narrows_candidates() {
        let dir = tempdir().unwrap();
        let backup = Arc::new(BackupStore::new(dir.path()));
        seed_failed_record(&backup, "Acme");
        seed_failed_record(&backup, "Globex");

        let coordinator = RetryCoordinator::new(backup.clone(), Arc::new(AlwaysSucceeds));
        let filter = RetryFilter {
            company_contains: Some("Glob".to_string()),
            ..Default::default()
        };
        let outcomes = coordinator.run(&filter).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].company_name.as_deref(), Some("Globex"));
    }
}
