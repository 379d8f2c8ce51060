//! Homepage fetch + single-level same-origin link extraction, trimmed to
//! the one-hop crawl this engine needs instead of an unbounded BFS.

use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

use crate::error::CoreResult;

/// Fetches `site_root` and returns every same-origin link found on it,
/// fragments stripped. Non-fatal by design: callers record failures in
/// `DiscoveryIssues` rather than propagating them.
pub async fn crawl_homepage_links(client: &reqwest::Client, site_root: &Url) -> CoreResult<Vec<String>> {
    let resp = client.get(site_root.clone()).send().await?;
    let body = resp.text().await?;
    Ok(extract_same_origin_links(&body, site_root))
}

fn extract_same_origin_links(html: &str, base_url: &Url) -> Vec<String> {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    let selector = SELECTOR.get_or_init(|| Selector::parse("a[href]").unwrap());

    let base_host = base_url.host_str();
    let base_port = base_url.port_or_known_default();

    Html::parse_document(html)
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|raw| !raw.starts_with('#'))
        .filter_map(|raw| base_url.join(raw).ok())
        .filter(|u| u.host_str() == base_host && u.port_or_known_default() == base_port)
        .map(|mut u| {
            u.set_fragment(None);
            u.to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_only_same_origin_links() {
        let base = Url::parse("https://example.com/").unwrap();
        let html = r#"
            <html><body>
                <a href="/about">About</a>
                <a href="https://example.com/contact#team">Contact</a>
                <a href="https://other.com/page">Other</a>
                <a href="#top">Anchor only</a>
            </body></html>
        "#;
        let links = extract_same_origin_links(html, &base);
        assert_eq!(
            links,
            vec!["https://example.com/about", "https://example.com/contact"]
        );
    }
}
