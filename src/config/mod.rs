//! Configuration module for DocShop
//!
//! Loads, parses and validates the TOML configuration file, and provides the
//! runtime-mutable crawl settings handle.
//!
//! # Example
//!
//! ```no_run
//! use docshop::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docshop.toml")).unwrap();
//! println!("Deep crawl max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

use std::sync::{Arc, RwLock};

pub use types::{
    AiConfig, AiProvider, ChunkingConfig, Config, CrawlerConfig, GraphBackend, GraphConfig,
    OutputConfig, RetryConfig, SecurityConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

/// Crawl settings shared between the engine and whoever configures it
///
/// Updates take effect at the next `start`; a running session keeps the
/// snapshot it took.
#[derive(Debug, Clone, Default)]
pub struct SharedCrawlSettings {
    inner: Arc<RwLock<CrawlerConfig>>,
}

impl SharedCrawlSettings {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current settings
    pub fn snapshot(&self) -> CrawlerConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `f` to the settings in place
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut CrawlerConfig),
    {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_settings_snapshot_is_detached() {
        let settings = SharedCrawlSettings::new(CrawlerConfig::default());
        let before = settings.snapshot();

        settings.update(|c| c.max_depth = 7);

        assert_eq!(before.max_depth, 3);
        assert_eq!(settings.snapshot().max_depth, 7);
    }

    #[test]
    fn test_shared_settings_clones_share_state() {
        let settings = SharedCrawlSettings::default();
        let other = settings.clone();
        other.update(|c| c.follow_external_links = true);
        assert!(settings.snapshot().follow_external_links);
    }
}
