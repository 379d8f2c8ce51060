//! `sitemap.xml` fetching and parsing, including sitemap-index recursion.

use quick_xml::events::Event;
use url::Url;

use crate::error::{AppError, CoreResult};

pub const MAX_SITEMAP_URLS: usize = 10_000;
const MAX_INDEX_DEPTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SitemapFormat {
    Xml,
    PlainText,
}

impl SitemapFormat {
    fn detect(text: &str) -> Self {
        if text.contains("<loc>") || text.contains("<urlset") || text.contains("<sitemapindex") {
            Self::Xml
        } else {
            Self::PlainText
        }
    }
}

/// Extracts every `<loc>` value (works for both `<urlset>` and `<sitemapindex>` -
/// the caller tells them apart by re-fetching entries that look like another sitemap).
fn extract_locs(text: &str) -> Vec<String> {
    let mut reader = quick_xml::Reader::from_str(text);
    let mut urls = Vec::new();
    let mut buf = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::Text(e)) if in_loc => {
                if let Ok(txt) = e.decode() {
                    urls.push(txt.trim().to_string());
                }
                in_loc = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    urls
}

fn extract_plain_text(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(|tok| Url::parse(tok).ok())
        .map(|u| u.to_string())
        .collect()
}

/// Fetches `site_root/sitemap.xml`, recursing into sitemap-index entries up to
/// `MAX_INDEX_DEPTH` levels deep, stopping once `MAX_SITEMAP_URLS` is reached.
/// Returns an error only when the top-level fetch itself fails; nested
/// fetch failures are skipped silently, the same tolerance robots/nav get.
pub async fn fetch_sitemap_urls(client: &reqwest::Client, site_root: &Url) -> CoreResult<Vec<String>> {
    let sitemap_url = site_root
        .join("sitemap.xml")
        .map_err(|e| AppError::invalid_input(format!("invalid site root: {e}")))?;

    let mut urls = Vec::new();
    let mut queue = vec![(sitemap_url, 0u32)];
    let mut visited = std::collections::HashSet::new();

    while let Some((url, depth)) = queue.pop() {
        if urls.len() >= MAX_SITEMAP_URLS {
            break;
        }
        if !visited.insert(url.clone()) {
            continue;
        }

        let text = match client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(t) => t,
                Err(_) => continue,
            },
            Ok(_) => continue,
            Err(e) => {
                if depth == 0 {
                    return Err(e.into());
                }
                continue;
            }
        };

        let locs = match SitemapFormat::detect(&text) {
            SitemapFormat::Xml => extract_locs(&text),
            SitemapFormat::PlainText => extract_plain_text(&text),
        };

        for loc in locs {
            if urls.len() >= MAX_SITEMAP_URLS {
                break;
            }
            let is_nested_sitemap = loc.ends_with(".xml") || loc.contains("sitemap");
            if is_nested_sitemap && depth < MAX_INDEX_DEPTH {
                if let Ok(nested) = Url::parse(&loc) {
                    queue.push((nested, depth + 1));
                    continue;
                }
            }
            urls.push(loc);
        }
    }

    urls.truncate(MAX_SITEMAP_URLS);
    Ok(urls)
}
