use super::{fetch_robots, RobotsRules};
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// robots.txt rules fetched during one crawl session, keyed by origin
#[derive(Debug, Default)]
pub struct RobotsCache {
    agent: String,
    rules: HashMap<String, RobotsRules>,
}

impl RobotsCache {
    /// `agent` is the product token matched against `User-agent` lines
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            rules: HashMap::new(),
        }
    }

    /// Checks `url`, fetching its host's robots.txt on first use
    pub async fn is_allowed(&mut self, client: &Client, url: &Url) -> bool {
        let key = self.ensure_loaded(client, url).await;
        self.rules
            .get(&key)
            .map_or(true, |rules| rules.is_allowed(url.as_str(), &self.agent))
    }

    /// Crawl-delay for the host of `url`, if its robots.txt has been read
    pub fn crawl_delay(&self, url: &Url) -> Option<f64> {
        self.rules
            .get(&origin_key(url))
            .and_then(|r| r.crawl_delay(&self.agent))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    async fn ensure_loaded(&mut self, client: &Client, url: &Url) -> String {
        let key = origin_key(url);
        if !self.rules.contains_key(&key) {
            let rules = fetch_robots(client, url).await;
            debug!(
                "robots.txt for {}: {}",
                key,
                if rules.is_allow_all() { "allow all" } else { "loaded" }
            );
            self.rules.insert(key.clone(), rules);
        }
        key
    }
}

fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
