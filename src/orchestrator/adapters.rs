//! External-collaborator trait boundaries the runners depend on. Keeping
//! these as traits (rather than concrete `reqwest`/provider types) is what
//! lets `tests::` swap in mockito-backed or in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// One lead candidate surfaced by a prospect source, before any
/// verification has run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectCandidate {
    pub company_name: String,
    pub website: Option<String>,
    pub google_place_id: Option<String>,
    pub industry: Option<String>,
    pub address: Option<String>,
}

impl ProspectCandidate {
    /// `google_place_id` if present, else `(company_name, website)` -
    /// the idempotent upsert key for the prospect runner.
    pub fn natural_key(&self) -> String {
        match &self.google_place_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}|{}", self.company_name, self.website.clone().unwrap_or_default()),
        }
    }
}

#[async_trait]
pub trait ProspectSource: Send + Sync {
    /// Returns up to `count` candidates matching `icp_brief` (a free-text
    /// ideal-customer-profile description).
    async fn find_candidates(&self, icp_brief: &str, count: usize) -> CoreResult<Vec<ProspectCandidate>>;
}

/// Reachability / parked-domain / industry-match checks run against each
/// candidate before it is backed up.
#[async_trait]
pub trait ProspectVerifier: Send + Sync {
    async fn verify(&self, candidate: &ProspectCandidate) -> CoreResult<VerificationOutcome>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub reachable: bool,
    pub site_parked: bool,
    pub industry_match: bool,
}

impl VerificationOutcome {
    pub fn passed(&self) -> bool {
        self.reachable && !self.site_parked && self.industry_match
    }
}

/// Uploads a rendered report document and returns its public/blob URL -
/// the backup stores only the metadata row, never the blob itself.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upload(&self, filename: &str, bytes: Vec<u8>, content_type: &str) -> CoreResult<String>;
}

/// The two viewports the analyze runner captures visual dimensions against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    Desktop,
    Mobile,
}

impl Viewport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

/// Captures a full-page screenshot of `url` at `viewport`. A failure here
/// nulls the screenshot for that dimension rather than failing the job -
/// the same partial-failure semantics as a failed AI scoring call.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, url: &str, viewport: Viewport) -> CoreResult<Vec<u8>>;
}
