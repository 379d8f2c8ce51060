//! Thin AI text-completion boundary shared by discovery's page selector and
//! the analyze/outreach runners, generalized behind a trait so runners and
//! tests don't depend on a specific provider.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{AppError, CoreResult};

#[async_trait]
pub trait AiClient: Send + Sync {
    /// Sends `prompt` to the model and returns the raw text completion.
    /// Implementations map non-2xx responses to `AppError::Transient` (server
    /// errors, plausibly retryable) or `AppError::InvalidInput` (4xx, e.g. a
    /// bad API key) - callers decide whether that fails the job or just the
    /// one dimension.
    async fn complete(&self, prompt: &str) -> CoreResult<String>;
}

/// Calls the Gemini `generateContent` endpoint: `contents[0].parts[0].text`
/// in, same path out.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> CoreResult<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                AppError::transient(format!("gemini api error {status}: {text}"))
            } else {
                AppError::invalid_input(format!("gemini api error {status}: {text}"))
            });
        }

        let parsed: serde_json::Value = response.json().await?;
        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::transient("gemini response missing candidates[0].content.parts[0].text"))
    }
}

/// Caps concurrent calls into an inner `AiClient` with a shared semaphore,
/// so discovery's page selector and every stage runner draw from one
/// process-wide budget against the configured provider rather than each
/// opening unbounded concurrent requests.
pub struct RateLimitedAiClient {
    inner: Arc<dyn AiClient>,
    permits: Arc<Semaphore>,
}

impl RateLimitedAiClient {
    pub fn new(inner: Arc<dyn AiClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl AiClient for RateLimitedAiClient {
    async fn complete(&self, prompt: &str) -> CoreResult<String> {
        let _permit = self.permits.acquire().await.expect("semaphore is never closed");
        self.inner.complete(prompt).await
    }
}

/// Strips a leading/trailing ```` ``` ```` or ```` ```json ```` fence, which
/// text models routinely wrap JSON output in despite being asked not to.
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
