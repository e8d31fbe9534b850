use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for DocShop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Deep crawl behavior
///
/// Mutable at runtime through [`super::SharedCrawlSettings`]; a session reads
/// it once when it starts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Master switch; `start` is a no-op when false
    #[serde(rename = "enable-deep-crawling")]
    pub enable_deep_crawling: bool,

    /// Maximum link depth from the root page (root is depth 0)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages fetched per host in one session
    #[serde(rename = "max-pages-per-domain")]
    pub max_pages_per_domain: u32,

    /// Delay between page fetches (seconds)
    #[serde(rename = "crawl-delay")]
    pub crawl_delay_secs: f64,

    /// Follow links whose host is unrelated to the page they were found on
    #[serde(rename = "follow-external-links")]
    pub follow_external_links: bool,

    #[serde(rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,

    /// Total timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    /// Pages with more raw links than this are sent to the relevance oracle
    #[serde(rename = "relevance-link-threshold")]
    pub relevance_link_threshold: usize,

    /// Minimum oracle priority (0-10) for a link to survive filtering
    #[serde(rename = "relevance-min-priority")]
    pub relevance_min_priority: u8,
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs_f64(self.crawl_delay_secs.max(0.0))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enable_deep_crawling: true,
            max_depth: 3,
            max_pages_per_domain: 50,
            crawl_delay_secs: 1.0,
            follow_external_links: false,
            respect_robots_txt: true,
            fetch_timeout_secs: 30,
            relevance_link_threshold: 10,
            relevance_min_priority: 6,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// `Name/Version (+url; email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Link admission security policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Reject loopback, private, link-local and `localhost` hosts
    #[serde(rename = "block-private-hosts")]
    pub block_private_hosts: bool,

    /// Domain patterns (`example.com` or `*.example.com`) never crawled
    #[serde(rename = "blocked-domains")]
    pub blocked_domains: Vec<String>,

    #[serde(rename = "max-url-length")]
    pub max_url_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            block_private_hosts: true,
            blocked_domains: Vec::new(),
            max_url_length: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Soft upper bound on prose chunk size (characters)
    #[serde(rename = "max-chunk-chars")]
    pub max_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,
    Sqlite,
}

/// Graph store connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,

    /// Neo4j HTTP endpoint, e.g. `http://localhost:7474`
    pub url: String,

    pub database: String,

    pub username: String,

    /// Name of the environment variable holding the Neo4j password
    #[serde(rename = "password-env")]
    pub password_env: String,

    #[serde(rename = "sqlite-path")]
    pub sqlite_path: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Sqlite,
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password_env: "NEO4J_PASSWORD".to_string(),
            sqlite_path: "./docshop.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Disabled,
    Ollama,
}

/// AI backend used for link ranking and chunk enrichment
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProvider,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "generation-model")]
    pub generation_model: String,

    #[serde(rename = "embedding-model")]
    pub embedding_model: String,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::Disabled,
            base_url: "http://localhost:11434".to_string(),
            generation_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Bounded retry for page fetches and transient store errors
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `crawl` writes its markdown report, if anywhere
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,
}
