//! Link classification and the documentation heuristic

use super::domain::{extract_domain, is_subdomain_pair, last_path_segment};
use serde::Serialize;
use std::fmt;
use url::Url;

/// Substrings that mark a link as noise (account flows, commerce, binaries)
const DENY_PATTERNS: &[&str] = &[
    "login",
    "signup",
    "register",
    "cart",
    "checkout",
    "download",
    "install",
    "pricing",
    "contact",
    ".zip",
    ".tar",
    ".gz",
    ".exe",
    ".dmg",
    ".pkg",
    "mailto:",
    "tel:",
    "javascript:",
];

/// Substrings that mark a link as documentation
const ALLOW_PATTERNS: &[&str] = &[
    "doc",
    "guide",
    "tutorial",
    "api",
    "reference",
    "manual",
    "help",
    "wiki",
    "readme",
    "getting-started",
    "quickstart",
    "overview",
    "concepts",
    "examples",
];

/// Relationship of a link target to the page it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Internal,
    Subdomain,
    External,
    Unknown,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Subdomain => "subdomain",
            Self::External => "external",
            Self::Unknown => "unknown",
        }
    }

    /// Internal and subdomain links stay on the documentation site
    pub fn is_same_site(&self) -> bool {
        matches!(self, Self::Internal | Self::Subdomain)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link discovered during a crawl session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlLink {
    pub url: Url,
    /// Anchor text, whitespace-collapsed
    pub text: String,
    pub title: Option<String>,
    pub source_url: Url,
    /// Source page depth + 1
    pub depth: u32,
    pub link_type: LinkType,
}

impl CrawlLink {
    /// Builds a link and classifies it against its source page
    pub fn new(url: Url, text: String, title: Option<String>, source_url: Url, depth: u32) -> Self {
        let link_type = classify(&url, &source_url);
        Self {
            url,
            text,
            title,
            source_url,
            depth,
            link_type,
        }
    }

    /// Anchor text, else title attribute, else last path segment
    pub fn display_text(&self) -> String {
        if !self.text.trim().is_empty() {
            return self.text.trim().to_string();
        }
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        last_path_segment(&self.url)
    }
}

/// Classifies `url` relative to the page it was found on
///
/// Equal hosts are internal. Hosts where one is a suffix of the other are
/// subdomains, but the suffix has to start at a label boundary rather
/// than anywhere in the string:
/// `api.example.com` is a subdomain of `example.com` while
/// `notexample.com` is external to it.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docshop::url::{classify, LinkType};
///
/// let source = Url::parse("https://example.com/docs").unwrap();
/// let sub = Url::parse("https://api.example.com/v1").unwrap();
/// let other = Url::parse("https://other.org/").unwrap();
///
/// assert_eq!(classify(&source, &source), LinkType::Internal);
/// assert_eq!(classify(&sub, &source), LinkType::Subdomain);
/// assert_eq!(classify(&other, &source), LinkType::External);
///
/// let lookalike = Url::parse("https://notexample.com/").unwrap();
/// assert_eq!(classify(&lookalike, &source), LinkType::External);
/// ```
pub fn classify(url: &Url, source_url: &Url) -> LinkType {
    let (Some(host), Some(source_host)) = (extract_domain(url), extract_domain(source_url)) else {
        return LinkType::Unknown;
    };

    if host == source_host {
        LinkType::Internal
    } else if is_subdomain_pair(&host, &source_host) {
        LinkType::Subdomain
    } else {
        LinkType::External
    }
}

/// Decides whether a link looks like documentation worth crawling
///
/// Deny patterns are checked first against path, anchor text and full URL,
/// then allow patterns against path and anchor text. Links matching neither
/// are kept only when they stay on the same site.
pub fn is_documentation_link(link: &CrawlLink) -> bool {
    let path = link.url.path().to_lowercase();
    let text = link.text.to_lowercase();
    let full = link.url.as_str().to_lowercase();

    if is_bare_fragment(link) {
        return false;
    }

    let denied = DENY_PATTERNS
        .iter()
        .any(|p| path.contains(p) || text.contains(p) || full.contains(p));
    if denied {
        return false;
    }

    let allowed = ALLOW_PATTERNS
        .iter()
        .any(|p| path.contains(p) || text.contains(p));
    if allowed {
        return true;
    }

    link.link_type.is_same_site()
}

/// An in-page anchor such as `href="#section"`
fn is_bare_fragment(link: &CrawlLink) -> bool {
    if link.url.fragment().is_none() {
        return false;
    }
    let mut target = link.url.clone();
    let mut source = link.source_url.clone();
    target.set_fragment(None);
    source.set_fragment(None);
    target == source
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, text: &str) -> CrawlLink {
        CrawlLink::new(
            Url::parse(url).unwrap(),
            text.to_string(),
            None,
            Url::parse("https://example.com/docs/").unwrap(),
            1,
        )
    }

    #[test]
    fn test_classify_unknown_without_host() {
        let source = Url::parse("https://example.com/").unwrap();
        let mail = Url::parse("mailto:a@example.com").unwrap();
        assert_eq!(classify(&mail, &source), LinkType::Unknown);
        assert_eq!(classify(&source, &mail), LinkType::Unknown);
    }

    #[test]
    fn test_classify_subdomain_both_directions() {
        let root = Url::parse("https://example.com/").unwrap();
        let sub = Url::parse("https://docs.example.com/").unwrap();
        assert_eq!(classify(&sub, &root), LinkType::Subdomain);
        assert_eq!(classify(&root, &sub), LinkType::Subdomain);
    }

    #[test]
    fn test_classify_lookalike_is_external() {
        let root = Url::parse("https://example.com/").unwrap();
        let lookalike = Url::parse("https://notexample.com/").unwrap();
        assert_eq!(classify(&lookalike, &root), LinkType::External);
    }

    #[test]
    fn test_deny_list_wins_over_allow_list() {
        assert!(!is_documentation_link(&link(
            "https://example.com/docs/login",
            "Docs"
        )));
        assert!(!is_documentation_link(&link(
            "https://example.com/guide/installer.dmg",
            "Guide"
        )));
        assert!(!is_documentation_link(&link(
            "https://example.com/about",
            "Contact us"
        )));
    }

    #[test]
    fn test_deny_scheme_links() {
        assert!(!is_documentation_link(&link("mailto:docs@example.com", "Mail")));
        assert!(!is_documentation_link(&link("javascript:void(0)", "Docs")));
    }

    #[test]
    fn test_bare_fragment_rejected_but_deep_anchor_kept() {
        assert!(!is_documentation_link(&link(
            "https://example.com/docs/#top",
            "Back to top"
        )));
        assert!(is_documentation_link(&link(
            "https://example.com/docs/api#methods",
            "Methods"
        )));
    }

    #[test]
    fn test_allow_list_accepts_external() {
        assert!(is_documentation_link(&link(
            "https://other.org/reference/core",
            "Core"
        )));
        assert!(is_documentation_link(&link(
            "https://other.org/blog/post",
            "Read the tutorial"
        )));
    }

    #[test]
    fn test_default_policy_by_link_type() {
        assert!(is_documentation_link(&link("https://example.com/changelog", "Changes")));
        assert!(is_documentation_link(&link(
            "https://blog.example.com/news",
            "News"
        )));
        assert!(!is_documentation_link(&link("https://other.org/blog", "Blog")));
    }

    #[test]
    fn test_repeated_calls_agree() {
        let source = Url::parse("https://example.com/docs/").unwrap();
        for (url, text) in [
            ("https://example.com/docs/intro", "Intro"),
            ("https://api.example.com/v1", "API"),
            ("https://other.org/pricing", "Pricing"),
            ("mailto:team@example.com", "Mail"),
        ] {
            let target = Url::parse(url).unwrap();
            assert_eq!(classify(&target, &source), classify(&target, &source));
            let l = link(url, text);
            assert_eq!(is_documentation_link(&l), is_documentation_link(&l));
        }
    }

    #[test]
    fn test_display_text_fallbacks() {
        let mut l = link("https://example.com/docs/setup/", "  Setup  ");
        assert_eq!(l.display_text(), "Setup");

        l.text.clear();
        l.title = Some("Project setup".to_string());
        assert_eq!(l.display_text(), "Project setup");

        l.title = None;
        assert_eq!(l.display_text(), "setup");
    }
}
