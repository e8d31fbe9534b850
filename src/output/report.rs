//! Crawl report types
//!
//! A [`CrawlReport`] is filled in by the crawl engine as the session runs and
//! handed back when it ends.

use crate::state::{CrawlState, SkipReason};
use crate::url::LinkType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while writing a report
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A page that was fetched and imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitedPage {
    pub url: String,
    pub depth: u32,
    pub document_id: Uuid,
    pub title: String,
    pub chunk_count: usize,
}

/// A frontier entry that was popped but never fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPage {
    pub url: String,
    pub depth: u32,
    pub reason: SkipReason,
}

/// A page whose fetch or import failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPage {
    pub url: String,
    pub depth: u32,
    pub message: String,
}

/// Discovered links by classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkCounts {
    pub internal: usize,
    pub subdomain: usize,
    pub external: usize,
    pub unknown: usize,
}

impl LinkCounts {
    pub fn record(&mut self, link_type: LinkType) {
        match link_type {
            LinkType::Internal => self.internal += 1,
            LinkType::Subdomain => self.subdomain += 1,
            LinkType::External => self.external += 1,
            LinkType::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, link_type: LinkType) -> usize {
        match link_type {
            LinkType::Internal => self.internal,
            LinkType::Subdomain => self.subdomain,
            LinkType::External => self.external,
            LinkType::Unknown => self.unknown,
        }
    }

    pub fn total(&self) -> usize {
        self.internal + self.subdomain + self.external + self.unknown
    }
}

/// Everything one crawl session did
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub root_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Final state of the session
    pub state: CrawlState,

    /// Human-readable status at the end of the session
    pub message: String,

    pub visited: Vec<VisitedPage>,
    pub skipped: Vec<SkippedPage>,
    pub failed: Vec<FailedPage>,
    pub links: LinkCounts,

    /// Pages fetched per host, busiest first
    pub domains: Vec<(String, u32)>,
}

impl CrawlReport {
    pub fn new(root_url: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            root_url: root_url.into(),
            started_at,
            finished_at: None,
            state: CrawlState::Running,
            message: String::new(),
            visited: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            links: LinkCounts::default(),
            domains: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, url: &str, depth: u32, reason: SkipReason) {
        self.skipped.push(SkippedPage {
            url: url.to_string(),
            depth,
            reason,
        });
    }

    pub fn record_failure(&mut self, url: &str, depth: u32, message: impl Into<String>) {
        self.failed.push(FailedPage {
            url: url.to_string(),
            depth,
            message: message.into(),
        });
    }

    pub fn finish(&mut self, state: CrawlState, message: impl Into<String>) {
        self.state = state;
        self.message = message.into();
        self.finished_at = Some(Utc::now());
    }

    /// Skipped pages grouped by reason
    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for skip in &self.skipped {
            *counts.entry(skip.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Visited pages grouped by depth
    pub fn depth_breakdown(&self) -> BTreeMap<u32, usize> {
        let mut depths = BTreeMap::new();
        for page in &self.visited {
            *depths.entry(page.depth).or_insert(0) += 1;
        }
        depths
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Share of fetched pages that were imported, as a percentage
    pub fn success_rate(&self) -> f64 {
        let attempted = self.visited.len() + self.failed.len();
        if attempted == 0 {
            return 0.0;
        }
        (self.visited.len() as f64 / attempted as f64) * 100.0
    }
}
