//! HTTP fetching for crawled pages and URL imports
//!
//! One client per session, carrying the crawler's user agent, a total
//! request timeout and a connect timeout. Transient failures (timeouts,
//! connection errors, 5xx, 429) are retried through [`RetryPolicy`].

use crate::config::UserAgentConfig;
use crate::document::DocumentFormat;
use crate::retry::{FailureType, RetryPolicy};
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(DocumentFormat::from_content_type)
            == Some(DocumentFormat::Html)
    }

    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } => FailureType::Transient,
            Self::Status { status, .. }
                if *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16() =>
            {
                FailureType::Transient
            }
            _ => FailureType::Permanent,
        }
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Builds the HTTP client used for page and robots.txt fetches
///
/// # Arguments
///
/// * `config` - Identity sent in the `User-Agent` header
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Client with gzip and brotli decoding and a bounded redirect chain
/// * `Err(reqwest::Error)` - The TLS backend could not be initialized
///
/// # Example
///
/// ```no_run
/// use docshop::config::UserAgentConfig;
/// use docshop::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "DocShop".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches `url`, retrying transient failures
///
/// Network errors, timeouts, 429 and 5xx responses are retried under
/// `retry`; other 4xx responses fail at once.
///
/// # Arguments
///
/// * `client` - Client built by [`build_http_client`]
/// * `url` - Absolute URL to fetch
/// * `retry` - Backoff policy for transient failures
///
/// # Returns
///
/// * `Ok(FetchedPage)` - Final URL after redirects, status, content type and body
/// * `Err(FetchError)` - The last failure once retries are exhausted
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    retry: &RetryPolicy,
) -> Result<FetchedPage, FetchError> {
    retry
        .run(
            &format!("fetch {}", url),
            || fetch_once(client, url),
            FetchError::failure_type,
        )
        .await
}

async fn fetch_once(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    Ok(FetchedPage {
        url: final_url,
        status: status.as_u16(),
        content_type,
        body: body.to_vec(),
    })
}
