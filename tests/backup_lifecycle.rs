//! Exercises `BackupStore`, legacy migration, and `RetryCoordinator` as a
//! pipeline rather than as isolated units: a legacy-shaped file on disk
//! gets migrated, fails its first upload, and is then recovered by a
//! retry pass against a remote store that starts working again.

use std::sync::Arc;

use async_trait::async_trait;
use leadforge_pipeline::backup::migrate::migrate_engine_dir;
use leadforge_pipeline::backup::BackupStore;
use leadforge_pipeline::domain::models::{BackupMeta, Engine, UploadStatus};
use leadforge_pipeline::error::{AppError, CoreResult};
use leadforge_pipeline::remote::RemoteStore;
use leadforge_pipeline::retry::{RetryCoordinator, RetryFilter};
use serde_json::json;
use tempfile::tempdir;

struct FlipFlopRemote {
    should_fail: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl RemoteStore for FlipFlopRemote {
    async fn upsert(&self, _engine: Engine, _key: &str, data: &serde_json::Value) -> CoreResult<String> {
        if self.should_fail.load(std::sync::atomic::Ordering::Relaxed) {
            Err(AppError::transient("database unreachable"))
        } else {
            Ok(format!("db-{}", data["score"]))
        }
    }
}

#[tokio::test]
async fn legacy_file_migrates_fails_then_recovers_on_retry() {
    let root = tempdir().unwrap();
    let leads_dir = root.path().join("analysis").join("leads");
    std::fs::create_dir_all(&leads_dir).unwrap();
    std::fs::write(
        leads_dir.join("acme.json"),
        serde_json::to_vec(&json!({
            "company_name": "Acme",
            "url": "https://acme.test",
            "analysis_result": {"score": 91.5},
            "score": 91.5
        }))
        .unwrap(),
    )
    .unwrap();

    let report = migrate_engine_dir(root.path(), Engine::Analysis).unwrap();
    assert_eq!(report.migrated, 1);

    let backup = Arc::new(BackupStore::new(root.path()));
    let pending = backup.list_pending(Engine::Analysis).unwrap();
    assert_eq!(pending.len(), 1);
    let (path, record) = &pending[0];
    assert_eq!(record.company_name.as_deref(), Some("Acme"));

    let remote = Arc::new(FlipFlopRemote {
        should_fail: std::sync::atomic::AtomicBool::new(true),
    });
    let upload_attempt = remote.upsert(Engine::Analysis, &record.url.clone().unwrap(), &record.data).await;
    assert!(upload_attempt.is_err());
    backup.mark_failed(path, upload_attempt.unwrap_err().to_string()).unwrap();

    assert!(backup.list_pending(Engine::Analysis).unwrap().is_empty());
    let failed = backup.list_failed(Some(Engine::Analysis)).unwrap();
    assert_eq!(failed.len(), 1);

    remote.should_fail.store(false, std::sync::atomic::Ordering::Relaxed);
    let coordinator = RetryCoordinator::new(backup.clone(), remote.clone());
    let outcomes = coordinator.run(&RetryFilter::default()).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].succeeded);
    assert!(backup.list_failed(Some(Engine::Analysis)).unwrap().is_empty());

    let uploaded = backup.list_all(Engine::Analysis).unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].1.upload_status, UploadStatus::Uploaded);
    assert_eq!(uploaded[0].1.database_id.as_deref(), Some("db-91.5"));
}

#[tokio::test]
async fn cleanup_only_removes_aged_uploaded_records_even_after_a_retry() {
    let root = tempdir().unwrap();
    let backup = Arc::new(BackupStore::new(root.path()));

    let meta = BackupMeta {
        company_name: Some("Globex".to_string()),
        url: Some("https://globex.test".to_string()),
        grade: None,
        overall_score: None,
        industry: None,
        extra: Default::default(),
    };
    let path = backup.save(Engine::Analysis, json!({"score": 40}), meta.clone()).unwrap();
    backup.mark_failed(&path, "timeout").unwrap();

    let still_pending_path = backup.save(Engine::Analysis, json!({"score": 10}), meta).unwrap();

    let remote = Arc::new(FlipFlopRemote {
        should_fail: std::sync::atomic::AtomicBool::new(false),
    });
    let coordinator = RetryCoordinator::new(backup.clone(), remote);
    let outcomes = coordinator.run(&RetryFilter::default()).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].succeeded);

    let removed = backup.cleanup_uploaded(None, chrono::Duration::seconds(-1), false).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(still_pending_path.exists());
}
