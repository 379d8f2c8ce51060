//! Process-wide configuration resolved once at boot from environment
//! variables. Required keys cause fail-fast; everything
//! else falls back to a documented default.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::models::WorkType;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory backup files are written under (`local-backups/` layout).
    pub backup_root: PathBuf,

    /// Remote store connection (`REMOTE_STORE_URL` / `REMOTE_STORE_SERVICE_KEY`).
    /// `None` selects the embedded sqlite-backed store used for local dev/tests.
    pub remote_store: Option<RemoteStoreConfig>,

    /// AI provider API key, required for discovery AI selection and outreach composition.
    pub ai_api_key: String,

    /// Per-work-type worker pool sizes, defaulting per `WorkType::default_worker_count`.
    pub worker_pool_sizes: HashMap<WorkType, usize>,

    /// Max concurrent AI calls to the configured provider, shared across all runners.
    pub ai_rate_limit: usize,

    /// `enqueue` fails fast with a retryable error once the queue holds this many jobs.
    pub queue_high_water_mark: usize,

    /// Age, in days, after which `uploaded` backups become eligible for `cleanup-backups`.
    pub backup_retention_days: u32,

    /// Bind address for the HTTP API.
    pub listen_addr: String,
}

#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub url: String,
    pub service_key: String,
}

/// A missing or malformed required environment variable. Returned, never
/// panicked on, so the caller can log and exit(1) at a single call site.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ai_api_key = require_env("AI_PROVIDER_API_KEY")?;

        let remote_store = match std::env::var("REMOTE_STORE_URL") {
            Ok(url) if !url.is_empty() => {
                let service_key = require_env("REMOTE_STORE_SERVICE_KEY")?;
                Some(RemoteStoreConfig { url, service_key })
            }
            _ => None,
        };

        let backup_root = std::env::var("BACKUP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("local-backups"));

        let mut worker_pool_sizes = HashMap::new();
        for wt in [
            WorkType::Prospecting,
            WorkType::AnalyzeUrl,
            WorkType::AnalyzeProspect,
            WorkType::ComposeOutreach,
            WorkType::GenerateReport,
        ] {
            let env_key = format!("WORKERS_{}", wt.as_str().to_uppercase());
            let count = optional_env_usize(&env_key)?.unwrap_or_else(|| wt.default_worker_count());
            worker_pool_sizes.insert(wt, count);
        }

        let ai_rate_limit = optional_env_usize("AI_RATE_LIMIT")?.unwrap_or(4);
        let queue_high_water_mark = optional_env_usize("QUEUE_HIGH_WATER_MARK")?.unwrap_or(10_000);
        let backup_retention_days = optional_env_usize("BACKUP_RETENTION_DAYS")?.unwrap_or(30) as u32;
        let listen_addr =
            std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Self {
            backup_root,
            remote_store,
            ai_api_key,
            worker_pool_sizes,
            ai_rate_limit,
            queue_high_water_mark,
            backup_retention_days,
            listen_addr,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(format!("missing required env var {key}")))
}

fn optional_env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError(format!("{key} must be a positive integer, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}
