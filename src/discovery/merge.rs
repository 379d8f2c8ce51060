//! URL canonicalization, source-precedence dedup, and path-based page typing
//!.

use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::domain::models::{PageEntry, PageSource, PageType, SourceCounts};

/// Lowercases the host, strips a trailing `/`, drops the fragment, and keeps
/// the query string only when the path is `/`-only (marketing sites often
/// encode campaign params on the homepage; elsewhere a query usually means a
/// distinct dynamic page not worth deduping away).
pub fn canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    if let Some(host) = url.host_str() {
        let lower = host.to_ascii_lowercase();
        url.set_host(Some(&lower)).ok()?;
    }
    if url.path() != "/" {
        url.set_query(None);
    }

    let mut out = url.to_string();
    if url.path() != "/" && out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

fn page_type_for_path(path: &str) -> PageType {
    static PATTERNS: OnceLock<Vec<(Regex, PageType)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"^/about").unwrap(), PageType::About),
            (Regex::new(r"^/contact").unwrap(), PageType::Contact),
            (Regex::new(r"^/blog").unwrap(), PageType::Blog),
            (Regex::new(r"^/(services|service/)").unwrap(), PageType::Service),
            (Regex::new(r"^/(products|product/)").unwrap(), PageType::Product),
            (Regex::new(r"^/pricing").unwrap(), PageType::Pricing),
        ]
    });

    if path == "/" || path.is_empty() {
        return PageType::Home;
    }
    for (re, ty) in patterns.iter() {
        if re.is_match(path) {
            return *ty;
        }
    }
    PageType::Other
}

fn level_for_path(path: &str) -> u32 {
    path.split('/').filter(|s| !s.is_empty()).count() as u32
}

/// Merges the three raw URL lists into deduplicated `PageEntry` values.
/// Earlier sources win ties, matching `PageSource`'s declaration order
/// (sitemap < robots < navigation).
pub fn merge_sources(
    sitemap: Vec<String>,
    robots: Vec<String>,
    navigation: Vec<String>,
) -> (Vec<PageEntry>, SourceCounts) {
    let counts = SourceCounts {
        sitemap: sitemap.len(),
        robots: robots.len(),
        navigation: navigation.len(),
    };

    let mut winners: HashMap<String, PageSource> = HashMap::new();
    for (urls, source) in [
        (sitemap, PageSource::Sitemap),
        (robots, PageSource::Robots),
        (navigation, PageSource::Navigation),
    ] {
        for raw in urls {
            let Some(canonical) = canonicalize(&raw) else { continue };
            winners
                .entry(canonical)
                .and_modify(|existing| {
                    if source < *existing {
                        *existing = source;
                    }
                })
                .or_insert(source);
        }
    }

    let mut entries: Vec<PageEntry> = winners
        .into_iter()
        .filter_map(|(canonical, source)| {
            let parsed = Url::parse(&canonical).ok()?;
            Some(PageEntry {
                page_type: page_type_for_path(parsed.path()),
                level: level_for_path(parsed.path()),
                url: canonical,
                source,
            })
        })
        .collect();

    entries.sort_by(|a, b| a.url.cmp(&b.url));
    (entries, counts)
}

/// Orders entries for the AI pre-filter truncation: home first, then
/// shallower paths, then by `PageType::priority`, capped at 200.
pub fn heuristic_prefilter(mut entries: Vec<PageEntry>) -> Vec<PageEntry> {
    entries.sort_by(|a, b| {
        a.page_type
            .priority()
            .cmp(&b.page_type.priority())
            .then(a.level.cmp(&b.level))
            .then(a.url.cmp(&b.url))
    });
    entries.truncate(200);
    entries
}
