//! AI capabilities used by the crawler and the persistence gateway
//!
//! Two narrow capabilities, each behind a trait:
//!
//! - [`LinkRanker`]: scores candidate links 0-10 for documentation relevance
//! - [`ChunkEnricher`]: derives tags and an embedding for a chunk of text
//!
//! The crawler sees the ranker through [`RelevanceOracle`], which has an
//! explicit `Unavailable` state; with it the crawl degrades to admitting
//! every link that passes the heuristic filters.

mod ollama;

pub use ollama::OllamaBackend;

use crate::config::{AiConfig, AiProvider};
use crate::url::CrawlLink;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Highest priority a ranker may assign
pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Request(String),

    #[error("AI backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse AI response: {0}")]
    Parse(String),
}

/// A link scored by a [`LinkRanker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedLink {
    pub url: String,
    /// 0 (irrelevant) to 10 (core documentation)
    pub priority: u8,
}

/// What the ranker knows about the page the links came from
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    /// Leading text of the page, possibly empty
    pub excerpt: String,
}

#[async_trait]
pub trait LinkRanker: Send + Sync {
    /// Scores `links`. Links missing from the result count as priority 0.
    ///
    /// Must tolerate an empty or very large input.
    async fn rank(&self, links: &[String], context: &PageContext)
        -> Result<Vec<RankedLink>, AiError>;
}

#[async_trait]
pub trait ChunkEnricher: Send + Sync {
    async fn tags(&self, text: &str) -> Result<Vec<String>, AiError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;
}

/// Optional link relevance capability
#[derive(Clone)]
pub enum RelevanceOracle {
    Available(Arc<dyn LinkRanker>),
    Unavailable,
}

impl std::fmt::Debug for RelevanceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("RelevanceOracle::Available"),
            Self::Unavailable => f.write_str("RelevanceOracle::Unavailable"),
        }
    }
}

impl RelevanceOracle {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Narrows `links` to the relevant ones
    ///
    /// Filtering only happens when the oracle is available and there are
    /// more than `threshold` links. A link survives with priority at least
    /// `min_priority`. When the ranker fails, or nothing survives, the input
    /// is returned unchanged.
    pub async fn filter(
        &self,
        links: Vec<CrawlLink>,
        context: &PageContext,
        threshold: usize,
        min_priority: u8,
    ) -> Vec<CrawlLink> {
        let ranker = match self {
            Self::Available(ranker) if links.len() > threshold => ranker,
            _ => return links,
        };

        let urls: Vec<String> = links.iter().map(|l| l.url.to_string()).collect();
        let ranked = match ranker.rank(&urls, context).await {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!("Link ranking failed for {}: {}", context.url, e);
                return links;
            }
        };

        let priorities: HashMap<String, u8> = ranked
            .into_iter()
            .map(|r| (r.url, r.priority.min(MAX_PRIORITY)))
            .collect();

        let total = links.len();
        let (relevant, rest): (Vec<CrawlLink>, Vec<CrawlLink>) =
            links.into_iter().partition(|link| {
                priorities
                    .get(link.url.as_str())
                    .is_some_and(|p| *p >= min_priority)
            });

        if relevant.is_empty() {
            debug!(
                "No link reached priority {} on {}; keeping all {}",
                min_priority, context.url, total
            );
            return rest;
        }

        info!(
            "Relevance filter kept {} of {} links on {}",
            relevant.len(),
            total,
            context.url
        );
        relevant
    }
}

/// AI capabilities resolved from configuration
#[derive(Clone)]
pub struct AiServices {
    pub oracle: RelevanceOracle,
    pub enricher: Option<Arc<dyn ChunkEnricher>>,
}

impl AiServices {
    /// No oracle and no enrichment
    pub fn disabled() -> Self {
        Self {
            oracle: RelevanceOracle::Unavailable,
            enricher: None,
        }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        match config.provider {
            AiProvider::Disabled => Ok(Self::disabled()),
            AiProvider::Ollama => {
                let backend = Arc::new(OllamaBackend::from_config(config)?);
                Ok(Self {
                    oracle: RelevanceOracle::Available(backend.clone()),
                    enricher: Some(backend),
                })
            }
        }
    }
}

/// Splits a comma-separated tag answer into clean tags
///
/// # Examples
///
/// ```
/// use docshop::ai::parse_tags;
///
/// assert_eq!(
///     parse_tags("Networking, #async,  , \"tokio\"\n"),
///     vec!["networking", "async", "tokio"]
/// );
/// ```
pub fn parse_tags(answer: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in answer.split(|c: char| c == ',' || c == '\n') {
        let tag = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '#' || c == '-' || c == '*')
            .trim()
            .to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
