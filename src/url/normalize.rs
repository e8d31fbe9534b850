use crate::UrlError;
use url::Url;

/// Query parameters that identify a referral, not a page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "_hsenc", "_hsmi"];

/// Parses and normalizes a URL string into its visited-set key form
///
/// See [`normalize`] for the rules applied.
///
/// # Examples
///
/// ```
/// use docshop::url::normalize_url;
///
/// let url = normalize_url("https://Docs.Example.com/guide/?utm_source=x#install").unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/guide");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(normalize(&url))
}

/// Normalizes an already parsed URL
///
/// - host is lowercased (the parser already does this for http/https)
/// - fragment is dropped
/// - empty and `.` path segments are collapsed, `..` pops a segment
/// - trailing slash is removed except for the root path
/// - tracking parameters are removed and the rest sorted by key
///
/// Scheme and `www.` prefix are left alone: documentation hosts often serve
/// different content on `www` and plain `http` mirrors.
pub fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    let path = collapse_path(url.path());
    url.set_path(&path);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    url
}

fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
