use super::matches_wildcard;
use crate::config::SecurityConfig;
use crate::UrlError;
use std::net::Ipv4Addr;
use url::{Host, Url};

/// Validation applied to every link before it is admitted to the frontier
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    block_private_hosts: bool,
    blocked_domains: Vec<String>,
    max_url_length: usize,
}

impl UrlPolicy {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            block_private_hosts: config.block_private_hosts,
            blocked_domains: config
                .blocked_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            max_url_length: config.max_url_length,
        }
    }

    /// Checks a URL against the policy
    ///
    /// # Errors
    ///
    /// * `InvalidScheme` - anything other than http/https
    /// * `MissingDomain` - no host
    /// * `Malformed` - embedded credentials
    /// * `TooLong` - longer than the configured limit
    /// * `Blocked` - blocked domain pattern, or a private/loopback host when
    ///   private hosts are blocked
    pub fn validate(&self, url: &Url) -> Result<(), UrlError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        let host = url.host().ok_or(UrlError::MissingDomain)?;

        if !url.username().is_empty() || url.password().is_some() {
            return Err(UrlError::Malformed("embedded credentials".to_string()));
        }

        if url.as_str().len() > self.max_url_length {
            return Err(UrlError::TooLong {
                max: self.max_url_length,
            });
        }

        let host_str = host.to_string().to_lowercase();
        if let Some(pattern) = self
            .blocked_domains
            .iter()
            .find(|p| matches_wildcard(p, &host_str))
        {
            return Err(UrlError::Blocked(format!("{} matches {}", host_str, pattern)));
        }

        if self.block_private_hosts && is_private_host(&host) {
            return Err(UrlError::Blocked(format!("{} is a private address", host_str)));
        }

        Ok(())
    }
}

fn is_private_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_lowercase();
            domain == "localhost" || domain.ends_with(".localhost") || domain.ends_with(".local")
        }
        Host::Ipv4(ip) => is_private_v4(ip),
        Host::Ipv6(ip) => {
            ip.is_loopback()
                || ip.is_unspecified()
                || (ip.segments()[0] & 0xfe00) == 0xfc00
                || (ip.segments()[0] & 0xffc0) == 0xfe80
                || ip.to_ipv4_mapped().is_some_and(|v4| is_private_v4(&v4))
        }
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}
