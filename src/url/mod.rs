//! URL handling
//!
//! Normalization for the visited set, host extraction, wildcard domain
//! patterns, link classification and the security policy applied before a
//! link is admitted to a crawl.

mod classify;
mod domain;
mod matcher;
mod normalize;
mod security;

pub use classify::{classify, is_documentation_link, CrawlLink, LinkType};
pub use domain::{extract_domain, is_subdomain_pair, last_path_segment, path_filename};
pub use matcher::matches_wildcard;
pub use normalize::{normalize, normalize_url};
pub use security::UrlPolicy;
