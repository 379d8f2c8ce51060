//! AI-driven per-dimension page selection with a heuristic fallback.

use crate::ai::{strip_markdown_fence, AiClient};
use crate::domain::models::{Dimension, PageEntry, PageSelection};

const MAX_URLS_PER_DIMENSION: usize = 5;

#[derive(serde::Deserialize)]
struct RawSelection {
    #[serde(default)]
    seo: Vec<String>,
    #[serde(default)]
    content: Vec<String>,
    #[serde(default)]
    visual: Vec<String>,
    #[serde(default)]
    social: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

fn build_prompt(prefiltered: &[PageEntry]) -> String {
    let urls: Vec<&str> = prefiltered.iter().map(|e| e.url.as_str()).collect();
    format!(
        "You are selecting pages to analyze for a website audit across four dimensions: \
         seo, content, visual, social. From the candidate URL list below, pick at most {MAX_URLS_PER_DIMENSION} \
         URLs per dimension that would be most informative to analyze. Respond with ONLY a JSON object \
         of the shape {{\"seo\": [...], \"content\": [...], \"visual\": [...], \"social\": [...], \"reasoning\": \"...\"}}, \
         using URLs taken verbatim from this list:\n{}",
        urls.join("\n")
    )
}

/// Picks the top `MAX_URLS_PER_DIMENSION` URLs per dimension from a
/// prefiltered list without calling any model - used both as the AI
/// selector's fallback and directly when no `AiClient` is configured.
pub fn heuristic_selection(prefiltered: &[PageEntry]) -> PageSelection {
    let take = |n: usize| prefiltered.iter().take(n).map(|e| e.url.clone()).collect::<Vec<_>>();
    PageSelection {
        seo: take(MAX_URLS_PER_DIMENSION),
        content: take(MAX_URLS_PER_DIMENSION),
        visual: take(MAX_URLS_PER_DIMENSION),
        social: take(MAX_URLS_PER_DIMENSION),
        reasoning: "heuristic fallback: top pages by type priority and depth".to_string(),
    }
}

/// Asks the model to pick pages per dimension, defensively parsing the
/// response: strips markdown fences, rejects URLs that are not in
/// `prefiltered`, caps each dimension at 5, and falls back to the heuristic
/// selection wholesale on any parse failure or an all-empty response.
pub async fn select_pages(ai: &dyn AiClient, prefiltered: &[PageEntry]) -> PageSelection {
    if prefiltered.is_empty() {
        return PageSelection::default();
    }

    let prompt = build_prompt(prefiltered);
    let raw_text = match ai.complete(&prompt).await {
        Ok(t) => t,
        Err(_) => return heuristic_selection(prefiltered),
    };

    let cleaned = strip_markdown_fence(&raw_text);
    let parsed: RawSelection = match serde_json::from_str(cleaned) {
        Ok(p) => p,
        Err(_) => return heuristic_selection(prefiltered),
    };

    let known: std::collections::HashSet<&str> = prefiltered.iter().map(|e| e.url.as_str()).collect();
    let sanitize = |urls: Vec<String>| -> Vec<String> {
        urls.into_iter()
            .filter(|u| known.contains(u.as_str()))
            .take(MAX_URLS_PER_DIMENSION)
            .collect()
    };

    let selection = PageSelection {
        seo: sanitize(parsed.seo),
        content: sanitize(parsed.content),
        visual: sanitize(parsed.visual),
        social: sanitize(parsed.social),
        reasoning: parsed.reasoning,
    };

    let all_empty = Dimension::ALL.iter().all(|d| selection.for_dimension(*d).is_empty());
    if all_empty {
        heuristic_selection(prefiltered)
    } else {
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PageSource, PageType};
    use async_trait::async_trait;
    use crate::error::{AppError, CoreResult};

    struct StubAi(String);

    #[async_trait]
    impl AiClient for StubAi {
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingAi;

    #[async_trait]
    impl AiClient for FailingAi {
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            Err(AppError::transient("down"))
        }
    }

    fn page(url: &str) -> PageEntry {
        PageEntry {
            url: url.to_string(),
            page_type: PageType::Other,
            level: 1,
            source: PageSource::Sitemap,
        }
    }

    #[tokio::test]
    async fn selects_pages_from_fenced_json() {
        let pages = vec![page("https://example.com/a"), page("https://example.com/b")];
        let ai = StubAi("```json\n{\"seo\":[\"https://example.com/a\"],\"content\":[],\"visual\":[],\"social\":[],\"reasoning\":\"ok\"}\n```".to_string());
        let selection = select_pages(&ai, &pages).await;
        assert_eq!(selection.seo, vec!["https://example.com/a"]);
        assert_eq!(selection.reasoning, "ok");
    }

    #[tokio::test]
    async fn rejects_urls_not_in_candidate_list() {
        let pages = vec![page("https://example.com/a")];
        let ai = StubAi("{\"seo\":[\"https://evil.com/x\"],\"content\":[],\"visual\":[],\"social\":[],\"reasoning\":\"ok\"}".to_string());
        let selection = select_pages(&ai, &pages).await;
        assert!(selection.seo.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_on_ai_failure() {
        let pages = vec![page("https://example.com/a")];
        let selection = select_pages(&FailingAi, &pages).await;
        assert_eq!(selection.seo, vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_on_unparseable_response() {
        let pages = vec![page("https://example.com/a")];
        let ai = StubAi("not json at all".to_string());
        let selection = select_pages(&ai, &pages).await;
        assert_eq!(selection.seo, vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_when_all_dimensions_empty() {
        let pages = vec![page("https://example.com/a")];
        let ai = StubAi("{\"seo\":[],\"content\":[],\"visual\":[],\"social\":[],\"reasoning\":\"nothing useful\"}".to_string());
        let selection = select_pages(&ai, &pages).await;
        assert_eq!(selection.seo, vec!["https://example.com/a"]);
    }
}
