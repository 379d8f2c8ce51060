//! Process startup and shutdown orchestration: logging, wiring every
//! collaborator together, spawning the worker pools, and stopping them
//! cleanly on signal.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ai::{GeminiClient, RateLimitedAiClient};
use crate::api::AppState;
use crate::backup::BackupStore;
use crate::config::AppConfig;
use crate::domain::models::WorkType;
use crate::error::CoreResult;
use crate::orchestrator::analyze::AnalyzeRunner;
use crate::orchestrator::default_adapters::{AiProspectSource, HttpProspectVerifier, LocalContentStore, UnavailableScreenshotter};
use crate::orchestrator::outreach::OutreachRunner;
use crate::orchestrator::prospect::ProspectRunner;
use crate::orchestrator::report::ReportRunner;
use crate::orchestrator::RunnerDeps;
use crate::queue::{spawn_workers, JobQueue, StageRunner};
use crate::remote::{HttpRemoteStore, RemoteStore, SqliteRemoteStore};

/// Initializes `tracing_subscriber`, honouring `RUST_LOG` with a sane
/// default when it's unset.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sqlx=warn".parse().unwrap())
                .add_directive("leadforge_pipeline=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .compact()
        .with_target(false)
        .init();
}

/// Every long-lived handle the server binary needs to hold onto: the queue
/// (for the HTTP API), the worker join handles (to await on shutdown), and
/// the app state axum serves from.
pub struct Services {
    pub queue: Arc<JobQueue>,
    pub app_state: Arc<AppState>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl Services {
    /// Signals every worker pool to stop accepting new jobs and waits for
    /// in-flight jobs to finish (workers drain their
    /// current job before exiting, nothing new is dequeued).
    pub async fn shutdown(self) {
        self.queue.shutdown();
        for handle in self.worker_handles {
            let _ = handle.await;
        }
    }
}

/// Builds the `RemoteStore` `config` points at - the HTTP-backed store when
/// `REMOTE_STORE_URL` is configured, otherwise the embedded sqlite store.
/// Shared by the server binary and every offline CLI under `src/bin/` so
/// they all resolve the same remote regardless of which process they run in.
pub async fn build_remote_store(config: &AppConfig) -> CoreResult<Arc<dyn RemoteStore>> {
    match &config.remote_store {
        Some(remote_cfg) => Ok(Arc::new(HttpRemoteStore::new(
            reqwest::Client::new(),
            remote_cfg.url.clone(),
            remote_cfg.service_key.clone(),
        ))),
        None => {
            let db_path = config.backup_root.join("pipeline.db");
            let url = format!("sqlite://{}?mode=rwc", db_path.display());
            Ok(Arc::new(SqliteRemoteStore::connect(&url).await?))
        }
    }
}

/// Builds every collaborator from `config` and spawns each work type's
/// worker pool. Fallible only on things that can't be deferred to request
/// time: opening the persistence log, migrating the remote schema.
pub async fn build_services(config: &AppConfig) -> CoreResult<Services> {
    let backup = Arc::new(BackupStore::new(&config.backup_root));
    let remote = build_remote_store(config).await?;

    let http = reqwest::Client::builder().build().map_err(crate::error::AppError::from)?;
    let gemini: Arc<dyn crate::ai::AiClient> = Arc::new(GeminiClient::new(http.clone(), config.ai_api_key.clone()));
    let ai: Arc<dyn crate::ai::AiClient> = Arc::new(RateLimitedAiClient::new(gemini, config.ai_rate_limit));

    let deps = RunnerDeps { backup: backup.clone(), remote: remote.clone() };

    let log_path = config.backup_root.join("queue.log");
    let queue = Arc::new(JobQueue::open(log_path, config.queue_high_water_mark)?);

    let content_store: Arc<dyn crate::orchestrator::adapters::ContentStore> =
        Arc::new(LocalContentStore::new(config.backup_root.join("content")));
    let screenshotter: Arc<dyn crate::orchestrator::adapters::Screenshotter> = Arc::new(UnavailableScreenshotter);
    let analyze_runner: Arc<AnalyzeRunner> = Arc::new(AnalyzeRunner::new(
        http.clone(),
        Some(ai.clone()),
        screenshotter,
        content_store.clone(),
        deps.clone(),
    ));
    let prospect_source = Arc::new(AiProspectSource::new(ai.clone()));
    let prospect_verifier = Arc::new(HttpProspectVerifier::new(http.clone()));
    let prospect_runner: Arc<dyn StageRunner> = Arc::new(ProspectRunner::new(prospect_source, prospect_verifier, deps.clone()));
    let outreach_runner: Arc<dyn StageRunner> = Arc::new(OutreachRunner::new(ai.clone(), deps.clone()));
    let report_runner: Arc<dyn StageRunner> = Arc::new(ReportRunner::new(content_store, deps.clone()));

    let mut worker_handles = Vec::new();
    let worker_count = |wt: WorkType| *config.worker_pool_sizes.get(&wt).unwrap_or(&wt.default_worker_count());

    worker_handles.extend(spawn_workers(queue.clone(), WorkType::Prospecting, worker_count(WorkType::Prospecting), prospect_runner));
    worker_handles.extend(spawn_workers(
        queue.clone(),
        WorkType::AnalyzeUrl,
        worker_count(WorkType::AnalyzeUrl),
        analyze_runner.clone(),
    ));
    worker_handles.extend(spawn_workers(
        queue.clone(),
        WorkType::AnalyzeProspect,
        worker_count(WorkType::AnalyzeProspect),
        analyze_runner.clone(),
    ));
    worker_handles.extend(spawn_workers(queue.clone(), WorkType::ComposeOutreach, worker_count(WorkType::ComposeOutreach), outreach_runner));
    worker_handles.extend(spawn_workers(queue.clone(), WorkType::GenerateReport, worker_count(WorkType::GenerateReport), report_runner));

    let app_state = Arc::new(AppState { queue: queue.clone(), analyze_runner });

    Ok(Services { queue, app_state, worker_handles })
}
