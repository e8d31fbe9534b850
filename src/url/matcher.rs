/// Checks a host against a domain pattern
///
/// `example.com` matches only itself. `*.example.com` matches the bare
/// domain and any subdomain at any depth.
///
/// # Examples
///
/// ```
/// use docshop::url::matches_wildcard;
///
/// assert!(matches_wildcard("tracker.net", "tracker.net"));
/// assert!(matches_wildcard("*.tracker.net", "tracker.net"));
/// assert!(matches_wildcard("*.tracker.net", "cdn.eu.tracker.net"));
/// assert!(!matches_wildcard("*.tracker.net", "nottracker.net"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
