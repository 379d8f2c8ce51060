//! Top-level discovery orchestration: fan out to the three sources with a
//! per-source timeout, merge, run the AI selector, and build a
//! `DiscoveryPlan`. Falls back to a single-page plan only when the site
//! root itself is unreachable after retrying.

use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::ai::AiClient;
use crate::domain::models::{DiscoveryIssues, DiscoveryPlan, PageEntry, PageSource, PageType, SourceCounts};
use crate::error::{AppError, CoreResult};

use super::{crawler, merge, robots, sitemap};

const SOURCE_TIMEOUT: Duration = Duration::from_secs(15);
const ROOT_FETCH_ATTEMPTS: u32 = 3;
const ROOT_FETCH_BASE_DELAY: Duration = Duration::from_millis(500);

/// Fetches `site_root` with up to `ROOT_FETCH_ATTEMPTS` tries, exponential
/// backoff (factor 2) and ±25% jitter between attempts. This is the one
/// fetch whose failure is allowed to fail discovery outright.
async fn fetch_site_root_with_retry(client: &reqwest::Client, site_root: &Url) -> CoreResult<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(site_root.clone()).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                if attempt >= ROOT_FETCH_ATTEMPTS {
                    return Err(AppError::transient(format!(
                        "site root returned {} after {attempt} attempts",
                        resp.status()
                    )));
                }
            }
            Err(e) => {
                if attempt >= ROOT_FETCH_ATTEMPTS {
                    return Err(e.into());
                }
            }
        }

        let base_ms = ROOT_FETCH_BASE_DELAY.as_millis() as u64 * 2u64.pow(attempt - 1);
        let jitter_fraction = rand::thread_rng().gen_range(-0.25..=0.25);
        let delay_ms = (base_ms as f64 * (1.0 + jitter_fraction)).max(0.0) as u64;
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn fallback_plan(site_root: &Url, issues: DiscoveryIssues) -> DiscoveryPlan {
    DiscoveryPlan {
        site_root: site_root.to_string(),
        all_pages: vec![PageEntry {
            url: site_root.to_string(),
            page_type: PageType::Home,
            level: 0,
            source: PageSource::Fallback,
        }],
        sources: SourceCounts::default(),
        issues,
        selection: Default::default(),
    }
}

/// Builds a full `DiscoveryPlan` for `site_root`. `ai` is optional: when
/// `None`, page selection falls back straight to the heuristic ranking.
pub async fn build_plan(
    client: &reqwest::Client,
    site_root: &Url,
    ai: Option<&dyn AiClient>,
) -> CoreResult<DiscoveryPlan> {
    let mut issues = DiscoveryIssues::default();

    if let Err(e) = fetch_site_root_with_retry(client, site_root).await {
        issues.crawl_failures.push(format!("site root unreachable: {e}"));
        return Ok(fallback_plan(site_root, issues));
    }

    let (sitemap_result, robots_result, nav_result) = tokio::join!(
        timeout_source(sitemap::fetch_sitemap_urls(client, site_root)),
        timeout_source(robots::fetch_robots_sitemaps(client, site_root)),
        timeout_source(crawler::crawl_homepage_links(client, site_root)),
    );

    let sitemap_urls = match sitemap_result {
        Ok(urls) => urls,
        Err(e) => {
            issues.sitemap_missing = true;
            issues.sitemap_error = Some(e);
            Vec::new()
        }
    };

    let mut robots_urls = Vec::new();
    match robots_result {
        Ok(urls) => robots_urls.extend(urls),
        Err(e) => {
            issues.robots_missing = true;
            issues.robots_error = Some(e);
        }
    }

    let navigation_urls = match nav_result {
        Ok(urls) => urls,
        Err(e) => {
            issues.navigation_error = Some(e);
            Vec::new()
        }
    };

    if sitemap_urls.is_empty() && robots_urls.is_empty() && navigation_urls.is_empty() {
        return Ok(fallback_plan(site_root, issues));
    }

    let (mut all_pages, sources) = merge::merge_sources(sitemap_urls, robots_urls, navigation_urls);
    if all_pages.is_empty() {
        all_pages.push(PageEntry {
            url: site_root.to_string(),
            page_type: PageType::Home,
            level: 0,
            source: PageSource::Fallback,
        });
    }

    let prefiltered = merge::heuristic_prefilter(all_pages.clone());
    let selection = match ai {
        Some(client) => super::ai_selector::select_pages(client, &prefiltered).await,
        None => super::ai_selector::heuristic_selection(&prefiltered),
    };

    Ok(DiscoveryPlan {
        site_root: site_root.to_string(),
        all_pages,
        sources,
        issues,
        selection,
    })
}

async fn timeout_source<T>(fut: impl std::future::Future<Output = CoreResult<T>>) -> Result<T, String> {
    match tokio::time::timeout(SOURCE_TIMEOUT, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {SOURCE_TIMEOUT:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_plan_has_single_home_page() {
        let root = Url::parse("https://example.com").unwrap();
        let plan = fallback_plan(&root, DiscoveryIssues::default());
        assert_eq!(plan.all_pages.len(), 1);
        assert_eq!(plan.all_pages[0].source, PageSource::Fallback);
        assert_eq!(plan.all_pages[0].page_type, PageType::Home);
    }
}
