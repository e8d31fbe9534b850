//! DocShop: a documentation crawler and graph ingestion pipeline
//!
//! This crate crawls documentation sites breadth-first, converts every page or
//! local file into a [`document::Document`], splits it into ordered
//! [`document::Chunk`]s and persists both into a graph store. Chunks are
//! enriched asynchronously with AI-derived tags and embeddings when an AI
//! backend is configured.

pub mod ai;
pub mod chunk;
pub mod config;
pub mod crawler;
pub mod document;
pub mod graph;
pub mod ingest;
pub mod output;
pub mod retry;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for DocShop operations
#[derive(Debug, Error)]
pub enum DocShopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] ingest::IngestError),

    #[error("Graph store error: {0}")]
    Store(#[from] graph::StoreError),

    #[error("AI backend error: {0}")]
    Ai(#[from] ai::AiError),

    #[error("Invalid crawl state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("URL exceeds {max} characters")]
    TooLong { max: usize },

    #[error("Blocked host: {0}")]
    Blocked(String),
}

/// Result type alias for DocShop operations
pub type Result<T> = std::result::Result<T, DocShopError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use document::{Chunk, Document, DocumentFormat};
pub use state::CrawlState;
pub use url::{classify, extract_domain, is_documentation_link, normalize_url, LinkType};
