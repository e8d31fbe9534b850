//! HTML parsing for the crawl loop
//!
//! Extracts the page title, a short text excerpt for the relevance oracle,
//! and every followable `<a href>` as a [`CrawlLink`].

use crate::url::{normalize, CrawlLink};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Characters of body text kept as the page excerpt
const EXCERPT_CHARS: usize = 500;

/// What the crawl loop needs from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,

    /// Leading body text, whitespace-collapsed
    pub excerpt: String,

    /// Links in document order, normalized, one per target
    pub links: Vec<CrawlLink>,
}

/// Parses `html` fetched from `page_url` at `depth`
///
/// # Link Extraction Rules
///
/// **Include:** `<a href>` anywhere in the document, `rel="nofollow"` too
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links (`#section`)
/// - anything that does not resolve to http(s)
///
/// # Example
///
/// ```
/// use docshop::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_page(html, &base_url, 0);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].depth, 1);
/// ```
pub fn parse_page(html: &str, page_url: &Url, depth: u32) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        excerpt: extract_excerpt(&document),
        links: extract_links(&document, page_url, depth),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_excerpt(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&body_selector)
        .next()
        .map(|body| collapse(&body.text().collect::<String>()))
        .map(|text| text.chars().take(EXCERPT_CHARS).collect())
        .unwrap_or_default()
}

fn extract_links(document: &Html, page_url: &Url, depth: u32) -> Vec<CrawlLink> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, page_url)) else {
            continue;
        };
        if !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let text = collapse(&element.text().collect::<String>());
        let title = element
            .value()
            .attr("title")
            .map(collapse)
            .filter(|t| !t.is_empty());

        links.push(CrawlLink::new(url, text, title, page_url.clone(), depth + 1));
    }

    links
}

/// Resolves an href against the page URL and normalizes it
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| normalize(&absolute))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
