//! `robots.txt` fetching - only the `Sitemap:` directives matter here, the
//! full disallow/allow grammar is out of scope.

use url::Url;

use crate::error::{AppError, CoreResult};

/// Fetches `site_root/robots.txt` and returns every `Sitemap:` URL it lists.
pub async fn fetch_robots_sitemaps(client: &reqwest::Client, site_root: &Url) -> CoreResult<Vec<String>> {
    let robots_url = site_root
        .join("robots.txt")
        .map_err(|e| AppError::invalid_input(format!("invalid site root: {e}")))?;

    let resp = client.get(robots_url).send().await?;
    if !resp.status().is_success() {
        return Ok(Vec::new());
    }
    let text = resp.text().await?;
    Ok(parse_sitemap_directives(&text))
}

fn parse_sitemap_directives(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line
                .strip_prefix("Sitemap:")
                .or_else(|| line.strip_prefix("sitemap:"))?;
            Some(rest.trim().to_string())
        })
        .filter(|s| Url::parse(s).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sitemap_directives_case_insensitively() {
        let text = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap.xml\nsitemap: https://example.com/news-sitemap.xml\n";
        let sitemaps = parse_sitemap_directives(text);
        assert_eq!(
            sitemaps,
            vec!["https://example.com/sitemap.xml", "https://example.com/news-sitemap.xml"]
        );
    }

    #[test]
    fn ignores_malformed_directives() {
        let text = "Sitemap: not a url\nDisallow: /\n";
        assert!(parse_sitemap_directives(text).is_empty());
    }
}
