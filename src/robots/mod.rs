//! robots.txt handling
//!
//! Each host's robots.txt is fetched once per crawl session. A missing,
//! unreachable or non-200 robots.txt allows everything.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

/// Fetches the robots.txt governing `url`
pub async fn fetch_robots(client: &Client, url: &Url) -> RobotsRules {
    let robots_url = match url.join("/robots.txt") {
        Ok(u) => u,
        Err(_) => return RobotsRules::allow_all(),
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return RobotsRules::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        debug!("robots.txt at {} returned {}", robots_url, response.status());
        return RobotsRules::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRules::from_content(&body),
        Err(e) => {
            debug!("robots.txt body unreadable at {}: {}", robots_url, e);
            RobotsRules::allow_all()
        }
    }
}
