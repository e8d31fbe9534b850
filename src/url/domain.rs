use super::matches_wildcard;
use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docshop::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.COM/guide").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
///
/// let url = Url::parse("mailto:team@example.com").unwrap();
/// assert_eq!(extract_domain(&url), None);
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// True when one host is a dot-separated suffix of the other
///
/// `docs.example.com` and `example.com` are related; `badexample.com` and
/// `example.com` are not.
pub fn is_subdomain_pair(a: &str, b: &str) -> bool {
    a != b && (matches_wildcard(&format!("*.{}", b), a) || matches_wildcard(&format!("*.{}", a), b))
}

/// Last non-empty path segment of a URL, `None` for root paths
pub fn path_filename(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
}

/// Last non-empty path segment of a URL, or the host for root paths
pub fn last_path_segment(url: &Url) -> String {
    path_filename(url)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.as_str().to_string())
}
