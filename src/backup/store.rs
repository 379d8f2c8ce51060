//! Content-addressed, atomic local JSON store per engine.
//!
//! Every record the orchestrator persists lives in exactly one of two
//! directories under `<root>/<engine>/`: `leads/` for `pending`/`uploaded`,
//! `failed-uploads/` for `failed`. `save`/`markUploaded`/`markFailed` are the
//! only operations that change `upload_status`, and all three write via a
//! temp-file-then-rename discipline so readers never observe partial JSON.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::domain::models::{BackupMeta, BackupRecord, BackupStats, Engine, UploadStatus};
use crate::error::{AppError, CoreResult};

/// Bumped once per process start and combined with a millisecond timestamp
/// to build a strictly monotonic filename suffix even when two `save` calls
/// land in the same millisecond.
static SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

const MAX_RENAME_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

/// A `BackupStore` value carries its own root path - there is no process-wide
/// singleton, so tests and multiple engines can use independent roots.
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn leads_dir(&self, engine: Engine) -> PathBuf {
        self.root.join(engine.as_str()).join("leads")
    }

    fn failed_dir(&self, engine: Engine) -> PathBuf {
        self.root.join(engine.as_str()).join("failed-uploads")
    }

    fn ensure_dirs(&self, engine: Engine) -> CoreResult<()> {
        std::fs::create_dir_all(self.leads_dir(engine))?;
        std::fs::create_dir_all(self.failed_dir(engine))?;
        Ok(())
    }

    /// Writes a new `pending` record into `<engine>/leads/`. I/O errors here
    /// are fatal to the caller - the orchestrator must
    /// surface them, never silently continue past a failed backup.
    pub fn save(
        &self,
        engine: Engine,
        data: serde_json::Value,
        meta: BackupMeta,
    ) -> CoreResult<PathBuf> {
        self.ensure_dirs(engine)?;

        let file_id = self.next_file_id(&meta);
        let record = BackupRecord {
            file_id: file_id.clone(),
            engine,
            saved_at: Utc::now(),
            company_name: meta.company_name,
            url: meta.url,
            grade: meta.grade,
            overall_score: meta.overall_score,
            industry: meta.industry,
            extra_metadata: meta.extra,
            data,
            uploaded_to_db: false,
            upload_status: UploadStatus::Pending,
            uploaded_at: None,
            database_id: None,
            upload_error: None,
            failed_at: None,
            retry_count: 0,
        };

        let path = self.leads_dir(engine).join(format!("{file_id}.json"));
        self.write_atomic(&path, &record)?;
        Ok(path)
    }

    /// Builds `{slug(company)}-YYYY-MM-DD-{monotonic}`, falling back
    /// to the URL host when no company name is given.
    fn next_file_id(&self, meta: &BackupMeta) -> String {
        let basis = meta
            .company_name
            .clone()
            .or_else(|| meta.url.as_ref().and_then(|u| url::Url::parse(u).ok()).and_then(|u| u.host_str().map(str::to_string)))
            .unwrap_or_else(|| "unknown".to_string());
        let slug = slugify(&basis);
        let date = Utc::now().format("%Y-%m-%d");
        let suffix = monotonic_suffix();
        format!("{slug}-{date}-{suffix}")
    }

    /// Sets `upload_status=uploaded`, `uploaded_to_db=true`, `database_id`,
    /// `uploaded_at=now` and writes the record atomically in place.
    pub fn mark_uploaded(&self, path: &Path, database_id: impl Into<String>) -> CoreResult<()> {
        let mut record = self.read_record(path)?;
        record.upload_status = UploadStatus::Uploaded;
        record.uploaded_to_db = true;
        record.database_id = Some(database_id.into());
        record.uploaded_at = Some(Utc::now());
        self.write_atomic(path, &record)
    }

    /// Moves the record into `failed-uploads/`, bumping `retry_count` and
    /// recording the error. If the delete of the old file fails after the
    /// new one lands, the `failed-uploads/` copy is authoritative; the
    /// original is picked up as a tombstone on the next directory scan.
    pub fn mark_failed(&self, path: &Path, error: impl Into<String>) -> CoreResult<PathBuf> {
        let mut record = self.read_record(path)?;
        record.upload_status = UploadStatus::Failed;
        record.upload_error = Some(error.into());
        record.failed_at = Some(Utc::now());
        record.retry_count += 1;

        self.ensure_dirs(record.engine)?;
        let new_path = self.failed_dir(record.engine).join(format!("{}.json", record.file_id));
        self.write_atomic(&new_path, &record)?;

        if new_path != path {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(
                    file_id = %record.file_id,
                    error = %e,
                    "failed to remove superseded backup record; failed-uploads copy is authoritative"
                );
            }
        }
        Ok(new_path)
    }

    /// Moves a `failed` record back into `leads/` as `uploaded` - used by
    /// `RetryCoordinator` on a successful replay.
    pub fn mark_retried_success(&self, path: &Path, database_id: impl Into<String>) -> CoreResult<PathBuf> {
        let mut record = self.read_record(path)?;
        record.upload_status = UploadStatus::Uploaded;
        record.uploaded_to_db = true;
        record.database_id = Some(database_id.into());
        record.uploaded_at = Some(Utc::now());
        record.retry_count += 1;

        self.ensure_dirs(record.engine)?;
        let new_path = self.leads_dir(record.engine).join(format!("{}.json", record.file_id));
        self.write_atomic(&new_path, &record)?;
        if new_path != path {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(file_id = %record.file_id, error = %e, "failed to remove retried backup record from failed-uploads");
            }
        }
        Ok(new_path)
    }

    /// Updates `upload_error`/`failed_at` on a record already in `failed-uploads/`
    /// without moving it - used by `RetryCoordinator` after a repeat failure.
    pub fn mark_retry_failed(&self, path: &Path, error: impl Into<String>) -> CoreResult<()> {
        let mut record = self.read_record(path)?;
        record.upload_error = Some(error.into());
        record.failed_at = Some(Utc::now());
        record.retry_count += 1;
        self.write_atomic(path, &record)
    }

    pub fn list_pending(&self, engine: Engine) -> CoreResult<Vec<(PathBuf, BackupRecord)>> {
        self.scan_dir(self.leads_dir(engine), |r| r.upload_status == UploadStatus::Pending)
    }

    /// Every record under `<engine>/`, `leads/` and `failed-uploads/` alike -
    /// used by `validate-existing-backups` and `migrate-old-backups`, which
    /// need to walk every file regardless of `upload_status`.
    pub fn list_all(&self, engine: Engine) -> CoreResult<Vec<(PathBuf, BackupRecord)>> {
        let mut out = self.scan_dir(self.leads_dir(engine), |_| true)?;
        out.extend(self.scan_dir(self.failed_dir(engine), |_| true)?);
        Ok(out)
    }

    pub fn list_failed(&self, engine: Option<Engine>) -> CoreResult<Vec<(PathBuf, BackupRecord)>> {
        let mut out = Vec::new();
        let engines: Vec<Engine> = engine.map(|e| vec![e]).unwrap_or_else(|| Engine::ALL.to_vec());
        for e in engines {
            out.extend(self.scan_dir(self.failed_dir(e), |_| true)?);
        }
        Ok(out)
    }

    pub fn stats(&self, engine: Option<Engine>) -> CoreResult<BackupStats> {
        let engines: Vec<Engine> = engine.map(|e| vec![e]).unwrap_or_else(|| Engine::ALL.to_vec());
        let mut stats = BackupStats::default();
        for e in engines {
            let leads = self.scan_dir(self.leads_dir(e), |_| true)?;
            let failed = self.scan_dir(self.failed_dir(e), |_| true)?;
            for (_, r) in &leads {
                stats.total += 1;
                match r.upload_status {
                    UploadStatus::Uploaded => stats.uploaded += 1,
                    UploadStatus::Pending => stats.pending += 1,
                    UploadStatus::Failed => stats.failed += 1,
                }
            }
            stats.total += failed.len() as u64;
            stats.failed += failed.len() as u64;
        }
        stats.success_rate = if stats.total > 0 {
            stats.uploaded as f64 / stats.total as f64
        } else {
            0.0
        };
        Ok(stats)
    }

    /// Parses, checks required fields, and confirms `upload_status` matches
    /// the directory the file lives in.
    pub fn validate(&self, path: &Path) -> ValidationResult {
        let record = match self.read_record(path) {
            Ok(r) => r,
            Err(e) => {
                return ValidationResult {
                    valid: false,
                    reason: Some(e.to_string()),
                }
            }
        };

        let in_failed_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n == "failed-uploads")
            .unwrap_or(false);

        let consistent = match record.upload_status {
            UploadStatus::Failed => in_failed_dir,
            UploadStatus::Pending | UploadStatus::Uploaded => !in_failed_dir,
        };

        if !consistent {
            return ValidationResult {
                valid: false,
                reason: Some(format!(
                    "upload_status {:?} inconsistent with directory placement",
                    record.upload_status
                )),
            };
        }

        if record.data.is_null() {
            return ValidationResult {
                valid: false,
                reason: Some("data field is empty".to_string()),
            };
        }

        ValidationResult { valid: true, reason: None }
    }

    /// Deletes `uploaded` records older than `max_age`, for `cleanup-backups`
    /// - `pending` and `failed` records are never touched regardless of
    /// age, since they are the only copy of work not yet durably elsewhere.
    pub fn cleanup_uploaded(&self, engine: Option<Engine>, max_age: chrono::Duration, dry_run: bool) -> CoreResult<Vec<PathBuf>> {
        let cutoff = Utc::now() - max_age;
        let engines: Vec<Engine> = engine.map(|e| vec![e]).unwrap_or_else(|| Engine::ALL.to_vec());
        let mut removed = Vec::new();

        for e in engines {
            let leads = self.scan_dir(self.leads_dir(e), |r| r.upload_status == UploadStatus::Uploaded)?;
            for (path, record) in leads {
                let eligible = record.uploaded_at.map(|t| t < cutoff).unwrap_or(false);
                if !eligible {
                    continue;
                }
                if !dry_run {
                    std::fs::remove_file(&path)?;
                }
                removed.push(path);
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_dir(
        &self,
        dir: PathBuf,
        predicate: impl Fn(&BackupRecord) -> bool,
    ) -> CoreResult<Vec<(PathBuf, BackupRecord)>> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            // `.tmp` files are in-flight writes from a concurrent `save`/`mark*`;
            // readers tolerate them by skipping, never by parsing a partial write.
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(record) if predicate(&record) => out.push((path, record)),
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable backup record"),
            }
        }
        Ok(out)
    }

    fn read_record(&self, path: &Path) -> CoreResult<BackupRecord> {
        let bytes = std::fs::read(path)?;
        let record: BackupRecord = serde_json::from_slice(&bytes)?;
        Ok(record)
    }

    /// Serializes to `<path>.tmp`, fsyncs, then renames over `path`. Retries
    /// with a fresh temp name up to `MAX_RENAME_RETRIES` times if the rename
    /// itself fails (e.g. a transient cross-device or permission race).
    fn write_atomic(&self, path: &Path, record: &BackupRecord) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(record)?;

        let mut last_err = None;
        for attempt in 0..=MAX_RENAME_RETRIES {
            let tmp_path = path.with_extension(format!("tmp{attempt}"));
            let write_result = (|| -> std::io::Result<()> {
                let mut file = std::fs::File::create(&tmp_path)?;
                std::io::Write::write_all(&mut file, &bytes)?;
                file.sync_all().ok();
                Ok(())
            })();

            if let Err(e) = write_result {
                last_err = Some(AppError::from(e));
                continue;
            }

            match std::fs::rename(&tmp_path, path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let _ = std::fs::remove_file(&tmp_path);
                    last_err = Some(AppError::from(e));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::fatal("atomic write failed with no recorded error")))
    }
}

fn monotonic_suffix() -> String {
    let millis = Utc::now().timestamp_millis();
    let counter = SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{millis}{counter:04}")
}

/// Lowercase ASCII slug: non-alphanumeric runs collapse to a single `-`,
/// leading/trailing dashes trimmed. Empty input becomes `"site"`.
fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "site".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BackupMeta;
    use serde_json::json;
    use tempfile::tempdir;

    fn meta(company: &str) -> BackupMeta {
        BackupMeta {
            company_name: Some(company.to_string()),
            url: Some("https://example.com".to_string()),
            grade: Some("B".to_string()),
            overall_score: Some(72.0),
            industry: Some("technology".to_string()),
            extra: Default::default(),
        }
    }

    #[test]
    fn save_writes_pending_record_in_leads() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let path = store
            .save(Engine::Analysis, json!({"score": 72}), meta("Anthropic"))
            .unwrap();

        assert!(path.starts_with(dir.path().join("analysis").join("leads")));
        let record = store.read_record(&path).unwrap();
        assert_eq!(record.upload_status, UploadStatus::Pending);
        assert!(!record.uploaded_to_db);
        assert_eq!(record.company_name.as_deref(), Some("Anthropic"));
    }

    #[test]
    fn mark_uploaded_sets_fields_in_place() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let path = store.save(Engine::Analysis, json!({"a": 1}), meta("Acme")).unwrap();

        store.mark_uploaded(&path, "db-123").unwrap();

        let record = store.read_record(&path).unwrap();
        assert_eq!(record.upload_status, UploadStatus::Uploaded);
        assert!(record.uploaded_to_db);
        assert_eq!(record.database_id.as_deref(), Some("db-123"));
        assert!(path.starts_with(dir.path().join("analysis").join("leads")));
    }

    #[test]
    fn mark_failed_moves_record_to_failed_uploads() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let path = store.save(Engine::Analysis, json!({"a": 1}), meta("Acme")).unwrap();

        let new_path = store.mark_failed(&path, "Invalid API key").unwrap();

        assert!(new_path.starts_with(dir.path().join("analysis").join("failed-uploads")));
        assert!(!path.exists());
        let record = store.read_record(&new_path).unwrap();
        assert_eq!(record.upload_status, UploadStatus::Failed);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.upload_error.as_deref(), Some("Invalid API key"));
    }

    #[test]
    fn stats_reflect_mixed_outcomes() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let p1 = store.save(Engine::Analysis, json!({}), meta("One")).unwrap();
        store.mark_uploaded(&p1, "1").unwrap();

        let p2 = store.save(Engine::Analysis, json!({}), meta("Two")).unwrap();
        store.mark_failed(&p2, "boom").unwrap();

        store.save(Engine::Analysis, json!({}), meta("Three")).unwrap();

        let stats = store.stats(Some(Engine::Analysis)).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn validate_detects_directory_mismatch() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let path = store.save(Engine::Analysis, json!({"x": 1}), meta("Acme")).unwrap();

        let result = store.validate(&path);
        assert!(result.valid);

        let failed_path = store.mark_failed(&path, "oops").unwrap();
        let result = store.validate(&failed_path);
        assert!(result.valid);
    }

    #[test]
    fn cleanup_uploaded_skips_pending_and_failed_regardless_of_age() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let uploaded_path = store.save(Engine::Analysis, json!({}), meta("Old")).unwrap();
        store.mark_uploaded(&uploaded_path, "1").unwrap();

        let pending_path = store.save(Engine::Analysis, json!({}), meta("Pending")).unwrap();
        let failed_path = store.save(Engine::Analysis, json!({}), meta("Failed")).unwrap();
        let failed_path = store.mark_failed(&failed_path, "boom").unwrap();

        let removed = store.cleanup_uploaded(None, chrono::Duration::seconds(-1), false).unwrap();

        assert_eq!(removed, vec![uploaded_path.clone()]);
        assert!(!uploaded_path.exists());
        assert!(pending_path.exists());
        assert!(failed_path.exists());
    }

    #[test]
    fn cleanup_uploaded_dry_run_deletes_nothing() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let path = store.save(Engine::Analysis, json!({}), meta("Old")).unwrap();
        store.mark_uploaded(&path, "1").unwrap();

        let removed = store.cleanup_uploaded(None, chrono::Duration::seconds(-1), true).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(path.exists());
    }

    #[test]
    fn list_pending_excludes_uploaded_and_failed() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());

        let p1 = store.save(Engine::Analysis, json!({}), meta("One")).unwrap();
        store.mark_uploaded(&p1, "1").unwrap();
        store.save(Engine::Analysis, json!({}), meta("Two")).unwrap();

        let pending = store.list_pending(Engine::Analysis).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1.company_name.as_deref(), Some("Two"));
    }

    #[test]
    fn slugify_handles_punctuation_and_unicode() {
        assert_eq!(slugify("Anthropic, Inc."), "anthropic-inc");
        assert_eq!(slugify("  leading/trailing  "), "leading-trailing");
        assert_eq!(slugify(""), "site");
    }

    #[test]
    fn filenames_are_monotonic_under_rapid_saves() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let path = store.save(Engine::Analysis, json!({}), meta("Acme")).unwrap();
            assert!(seen.insert(path), "duplicate backup filename generated");
        }
    }
}
