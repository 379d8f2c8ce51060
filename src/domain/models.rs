//! Core entities shared by every component: jobs, backup records, and
//! discovery plans. These are semantic types, not storage types - the
//! `queue`, `backup`, and `discovery` modules own how each is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// WORK TYPE
// ============================================================================

/// The five kinds of long-running work the queue schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Prospecting,
    AnalyzeUrl,
    AnalyzeProspect,
    ComposeOutreach,
    GenerateReport,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prospecting => "prospecting",
            Self::AnalyzeUrl => "analyze_url",
            Self::AnalyzeProspect => "analyze_prospect",
            Self::ComposeOutreach => "compose_outreach",
            Self::GenerateReport => "generate_report",
        }
    }

    /// Default parallel worker budget for this work type. Heavy
    /// visual/AI work gets a single worker so it cannot starve cheaper types.
    pub fn default_worker_count(&self) -> usize {
        match self {
            Self::Prospecting | Self::AnalyzeUrl => 4,
            Self::AnalyzeProspect | Self::ComposeOutreach | Self::GenerateReport => 1,
        }
    }

    /// Wall-clock cap before the queue force-fails the job as `Timeout`.
    pub fn timeout(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            Self::Prospecting => Duration::from_secs(5 * 60),
            Self::AnalyzeUrl | Self::AnalyzeProspect => Duration::from_secs(10 * 60),
            Self::ComposeOutreach => Duration::from_secs(3 * 60),
            Self::GenerateReport => Duration::from_secs(2 * 60),
        }
    }

    /// The backup engine this work type's results are persisted under.
    pub fn engine(&self) -> Engine {
        match self {
            Self::Prospecting => Engine::Prospecting,
            Self::AnalyzeUrl | Self::AnalyzeProspect => Engine::Analysis,
            Self::ComposeOutreach => Engine::Outreach,
            Self::GenerateReport => Engine::Reports,
        }
    }
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prospecting" => Ok(Self::Prospecting),
            "analyze_url" => Ok(Self::AnalyzeUrl),
            "analyze_prospect" => Ok(Self::AnalyzeProspect),
            "compose_outreach" => Ok(Self::ComposeOutreach),
            "generate_report" => Ok(Self::GenerateReport),
            _ => Err(()),
        }
    }
}

// ============================================================================
// JOB
// ============================================================================

/// Lifecycle state of a `Job`. Terminal states are `Completed`, `Failed`,
/// `Cancelled`. Transitions out of `Running` are exclusive: exactly one of
/// `Completed`/`Failed` is ever written for a given run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress marker a stage runner reports via `report(current, total, message)`.
/// Stored as the queue's "latest value" - not persisted on every update, so it
/// is lossy across crashes by design (only `state` is durable).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub message: Option<String>,
}

impl Progress {
    pub fn new(current: u64, total: u64, message: impl Into<Option<String>>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
        }
    }
}

/// A unit of schedulable work. Payload and result are opaque JSON blobs - the
/// stage runner for `work_type` is the only code that interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub work_type: WorkType,
    pub priority: i32,
    pub state: JobState,
    pub payload: serde_json::Value,
    pub progress: Progress,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(work_type: WorkType, priority: i32, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            work_type,
            priority,
            state: JobState::Queued,
            payload,
            progress: Progress::default(),
            result: None,
            error: None,
            enqueued_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }
}

/// A point-in-time read of a job's status, safe to hand out without holding
/// any lock - `JobQueue::status` builds these from a single lock acquisition
/// so concurrent readers never observe a torn mix of fields.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub work_type: WorkType,
    pub state: JobState,
    pub priority: i32,
    pub progress: Progress,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            work_type: job.work_type,
            state: job.state,
            priority: job.priority,
            progress: job.progress.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            ended_at: job.ended_at,
        }
    }
}

/// Histogram summary returned alongside a batch `status()` query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusSummary {
    pub fn tally(snapshots: &[JobSnapshot]) -> Self {
        let mut s = Self {
            total: snapshots.len(),
            ..Default::default()
        };
        for snap in snapshots {
            match snap.state {
                JobState::Queued => s.queued += 1,
                JobState::Running => s.running += 1,
                JobState::Completed => s.completed += 1,
                JobState::Failed => s.failed += 1,
                JobState::Cancelled => s.cancelled += 1,
            }
        }
        s
    }
}

// ============================================================================
// BACKUP RECORD
// ============================================================================

/// The four engines a `BackupRecord` can belong to - each gets its own
/// `leads/` + `failed-uploads/` directory pair under the backup root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Prospecting,
    Analysis,
    Outreach,
    Reports,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prospecting => "prospecting",
            Self::Analysis => "analysis",
            Self::Outreach => "outreach",
            Self::Reports => "reports",
        }
    }

    pub const ALL: [Engine; 4] = [Self::Prospecting, Self::Analysis, Self::Outreach, Self::Reports];
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Engine {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prospecting" => Ok(Self::Prospecting),
            "analysis" => Ok(Self::Analysis),
            "outreach" => Ok(Self::Outreach),
            "reports" => Ok(Self::Reports),
            _ => Err(()),
        }
    }
}

/// `upload_status` lifecycle. The directory a record lives in must always
/// match this field: `leads/` for `Pending`/`Uploaded`, `failed-uploads/` for `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        }
    }
}

/// The canonical on-disk backup record shape.
/// Denormalized metadata sits at the top level so directory scans can filter
/// without opening `data`; `data` is the payload the remote store receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub file_id: String,
    pub engine: Engine,
    pub saved_at: DateTime<Utc>,

    pub company_name: Option<String>,
    pub url: Option<String>,
    pub grade: Option<String>,
    pub overall_score: Option<f64>,
    pub industry: Option<String>,
    #[serde(default)]
    pub extra_metadata: HashMap<String, serde_json::Value>,

    pub data: serde_json::Value,

    pub uploaded_to_db: bool,
    pub upload_status: UploadStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub database_id: Option<String>,

    pub upload_error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
}

/// Caller-supplied metadata for `BackupStore::save` - the denormalized
/// columns that let directory scans filter without parsing `data`.
#[derive(Debug, Clone, Default)]
pub struct BackupMeta {
    pub company_name: Option<String>,
    pub url: Option<String>,
    pub grade: Option<String>,
    pub overall_score: Option<f64>,
    pub industry: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// `{total, uploaded, pending, failed, success_rate}` as returned by `BackupStore::stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupStats {
    pub total: u64,
    pub uploaded: u64,
    pub pending: u64,
    pub failed: u64,
    pub success_rate: f64,
}

// ============================================================================
// DISCOVERY PLAN
// ============================================================================

/// Where a discovered URL first came from. Earliest source in this ordering
/// wins when the same URL is found by more than one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Sitemap,
    Robots,
    Navigation,
    Fallback,
}

impl PageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap",
            Self::Robots => "robots",
            Self::Navigation => "navigation",
            Self::Fallback => "fallback",
        }
    }
}

/// Path-semantics classification used both for display and for the AI
/// pre-filter's type-priority ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Home,
    About,
    Service,
    Blog,
    Contact,
    Product,
    Pricing,
    Other,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::About => "about",
            Self::Service => "service",
            Self::Blog => "blog",
            Self::Contact => "contact",
            Self::Product => "product",
            Self::Pricing => "pricing",
            Self::Other => "other",
        }
    }

    /// Lower is preferred when truncating the AI pre-filter list to the top 200.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Home => 0,
            Self::Service => 1,
            Self::Product => 2,
            Self::About => 3,
            Self::Contact => 4,
            Self::Blog => 5,
            Self::Pricing => 6,
            Self::Other => 7,
        }
    }
}

/// One entry in a `DiscoveryPlan::all_pages` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    pub url: String,
    pub page_type: PageType,
    pub level: u32,
    pub source: PageSource,
}

/// Per-source URL counts, copied into the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub sitemap: usize,
    pub robots: usize,
    pub navigation: usize,
}

/// Non-fatal problems encountered while building the plan - always recorded,
/// never block the analysis from proceeding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryIssues {
    pub sitemap_missing: bool,
    pub sitemap_error: Option<String>,
    pub robots_missing: bool,
    pub robots_error: Option<String>,
    pub navigation_error: Option<String>,
    #[serde(default)]
    pub crawl_failures: Vec<String>,
}

/// The analyzer dimensions the AI selector picks pages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Seo,
    Content,
    Visual,
    Social,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [Self::Seo, Self::Content, Self::Visual, Self::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seo => "seo",
            Self::Content => "content",
            Self::Visual => "visual",
            Self::Social => "social",
        }
    }
}

/// Per-dimension URL picks plus the model's stated reasoning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSelection {
    pub seo: Vec<String>,
    pub content: Vec<String>,
    pub visual: Vec<String>,
    pub social: Vec<String>,
    pub reasoning: String,
}

impl PageSelection {
    pub fn for_dimension(&self, dim: Dimension) -> &[String] {
        match dim {
            Dimension::Seo => &self.seo,
            Dimension::Content => &self.content,
            Dimension::Visual => &self.visual,
            Dimension::Social => &self.social,
        }
    }
}

/// The merged, ranked result of page discovery for one site - constructed
/// per analysis, discarded once persisted; `selection` is copied into the
/// final analysis result for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPlan {
    pub site_root: String,
    pub all_pages: Vec<PageEntry>,
    pub sources: SourceCounts,
    pub issues: DiscoveryIssues,
    pub selection: PageSelection,
}

// ============================================================================
// GRADE
// ============================================================================

/// Letter grade derived from `overall_score` by the pure mapping below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// `grade = A if score >= 85; B if >= 70; C if >= 55; D if >= 40; F otherwise`.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::A
        } else if score >= 70.0 {
            Self::B
        } else if score >= 55.0 {
            Self::C
        } else if score >= 40.0 {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
