//! One-shot structural migration of legacy flat-shape backup files into the
//! canonical `BackupRecord` shape. Only touches local JSON files -
//! never talks to a remote store, so it is safe to run repeatedly.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::models::{BackupRecord, Engine, UploadStatus};
use crate::error::CoreResult;

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub scanned: u64,
    pub migrated: u64,
    pub already_canonical: u64,
    pub skipped: Vec<(PathBuf, String)>,
}

/// A file is legacy if it parses as an object but lacks the canonical
/// envelope fields (`data`, `upload_status`) while carrying the old
/// `analysis_result` key the original tool wrote results under.
fn is_legacy_shape(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    !obj.contains_key("data") && !obj.contains_key("upload_status") && obj.contains_key("analysis_result")
}

fn migrate_value(mut value: Value, engine: Engine) -> Option<BackupRecord> {
    let obj = value.as_object_mut()?;
    let analysis_result = obj.remove("analysis_result")?;
    let lead_data = obj.remove("lead_data");

    let mut data = serde_json::Map::new();
    data.insert("analysis_result".to_string(), analysis_result);
    if let Some(lead_data) = lead_data {
        data.insert("lead_data".to_string(), lead_data);
    }
    let data = Value::Object(data);

    let company_name = obj.remove("company_name").and_then(|v| v.as_str().map(str::to_string));
    let url = obj.remove("url").and_then(|v| v.as_str().map(str::to_string));
    let grade = obj.remove("grade").and_then(|v| v.as_str().map(str::to_string));
    let overall_score = obj.remove("overall_score").or_else(|| obj.remove("score")).and_then(|v| v.as_f64());
    let industry = obj.remove("industry").and_then(|v| v.as_str().map(str::to_string));
    let saved_at = obj
        .remove("saved_at")
        .or_else(|| obj.remove("timestamp"))
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or_else(chrono::Utc::now);
    let file_id = obj
        .remove("id")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut extra_metadata = std::collections::HashMap::new();
    for (k, v) in obj.iter() {
        extra_metadata.insert(k.clone(), v.clone());
    }

    Some(BackupRecord {
        file_id,
        engine,
        saved_at,
        company_name,
        url,
        grade,
        overall_score,
        industry,
        extra_metadata,
        data,
        uploaded_to_db: false,
        upload_status: UploadStatus::Pending,
        uploaded_at: None,
        database_id: None,
        upload_error: None,
        failed_at: None,
        retry_count: 0,
    })
}

/// Options for `migrate_engine_dir_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// Re-serialize already-canonical records too, picking up any field
    /// defaults added since the file was written.
    pub force: bool,
}

/// Walks every `*.json` file directly under `<root>/<engine>/leads/` for the
/// given engine and rewrites legacy-shaped files in place (atomic tmp+rename,
/// matching `BackupStore::write_atomic`'s discipline).
pub fn migrate_engine_dir(root: &Path, engine: Engine) -> CoreResult<MigrationReport> {
    migrate_engine_dir_with(root, engine, MigrateOptions::default())
}

pub fn migrate_engine_dir_with(root: &Path, engine: Engine, options: MigrateOptions) -> CoreResult<MigrationReport> {
    let dir = root.join(engine.as_str()).join("leads");
    let mut report = MigrationReport::default();

    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        report.scanned += 1;

        let bytes = std::fs::read(&path)?;
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                report.skipped.push((path, format!("invalid json: {e}")));
                continue;
            }
        };

        if !is_legacy_shape(&value) {
            report.already_canonical += 1;
            if options.force && !options.dry_run {
                if let Ok(record) = serde_json::from_value::<BackupRecord>(value) {
                    write_canonical(&path, &record)?;
                }
            }
            continue;
        }

        match migrate_value(value, engine) {
            Some(record) => {
                if !options.dry_run {
                    write_canonical(&path, &record)?;
                }
                report.migrated += 1;
            }
            None => report.skipped.push((path, "missing analysis_result field".to_string())),
        }
    }

    Ok(report)
}

fn write_canonical(path: &Path, record: &BackupRecord) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(record)?;
    let tmp_path = path.with_extension("tmp0");
    std::fs::write(&tmp_path, &bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
