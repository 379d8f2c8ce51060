//! Concrete default implementations of the `adapters` traits used when the
//! server boots without a bespoke prospect/content provider wired in:
//! AI-driven prospecting, a plain reachability/parked-domain verifier, and
//! a local filesystem content store.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::ai::{strip_markdown_fence, AiClient};
use crate::error::{AppError, CoreResult};

use super::adapters::{ContentStore, ProspectCandidate, ProspectSource, ProspectVerifier, Screenshotter, VerificationOutcome, Viewport};

/// Asks the configured AI provider to name candidates matching an ICP brief.
/// The only prospecting strategy available without a paid data provider
/// wired in, so this is what boots by default.
pub struct AiProspectSource {
    ai: std::sync::Arc<dyn AiClient>,
}

impl AiProspectSource {
    pub fn new(ai: std::sync::Arc<dyn AiClient>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl ProspectSource for AiProspectSource {
    async fn find_candidates(&self, icp_brief: &str, count: usize) -> CoreResult<Vec<ProspectCandidate>> {
        let prompt = format!(
            "List {count} real companies matching this ideal-customer profile: \"{icp_brief}\". \
             Respond with ONLY a JSON array of objects \
             {{\"company_name\": str, \"website\": str|null, \"google_place_id\": str|null, \
             \"industry\": str|null, \"address\": str|null}}."
        );
        let text = self.ai.complete(&prompt).await?;
        let cleaned = strip_markdown_fence(&text);
        serde_json::from_str(cleaned).map_err(|e| AppError::invalid_input(format!("ai returned unparseable candidates: {e}")))
    }
}

/// Verifies a candidate by fetching its homepage: unreachable or a
/// parked-domain page fails the candidate outright, otherwise the stated
/// industry is trusted as a match since nothing upstream contradicts it.
pub struct HttpProspectVerifier {
    http: reqwest::Client,
}

impl HttpProspectVerifier {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

const PARKED_DOMAIN_MARKERS: [&str; 3] = ["domain is for sale", "this domain is parked", "buy this domain"];

#[async_trait]
impl ProspectVerifier for HttpProspectVerifier {
    async fn verify(&self, candidate: &ProspectCandidate) -> CoreResult<VerificationOutcome> {
        let Some(website) = &candidate.website else {
            return Ok(VerificationOutcome {
                reachable: false,
                site_parked: false,
                industry_match: candidate.industry.is_some(),
            });
        };

        let response = match self.http.get(website).send().await {
            Ok(r) if r.status().is_success() => r,
            _ => {
                return Ok(VerificationOutcome {
                    reachable: false,
                    site_parked: false,
                    industry_match: false,
                })
            }
        };

        let body = response.text().await.unwrap_or_default().to_ascii_lowercase();
        let site_parked = PARKED_DOMAIN_MARKERS.iter().any(|marker| body.contains(marker));

        Ok(VerificationOutcome {
            reachable: true,
            site_parked,
            industry_match: candidate.industry.is_some(),
        })
    }
}

/// Writes rendered report blobs under `<backup_root>/content/` and returns a
/// `file://` URL. A local-first stand-in for an object-storage bucket,
/// consistent with the rest of the pipeline defaulting to disk over a paid
/// third party when none is configured.
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn upload(&self, filename: &str, bytes: Vec<u8>, _content_type: &str) -> CoreResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("file://{}", path.display()))
    }
}

/// Refuses every capture. Rendering a page to a bitmap needs a real browser
/// engine, which nothing in this stack carries a dependency on; visual
/// dimensions are still scored by the AI reviewer, they just come back
/// without a `screenshot_url` until a real capturer is configured.
pub struct UnavailableScreenshotter;

#[async_trait]
impl Screenshotter for UnavailableScreenshotter {
    async fn capture(&self, _url: &str, _viewport: Viewport) -> CoreResult<Vec<u8>> {
        Err(AppError::Quality("no screenshot capturer configured".to_string()))
    }
}
