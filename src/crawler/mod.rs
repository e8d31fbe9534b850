//! Crawler module for deep documentation crawls
//!
//! This module contains the crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - The breadth-first frontier
//! - The crawl engine that drives a session

mod engine;
mod fetcher;
mod frontier;
mod parser;

pub use engine::{progress, CrawlEngine, CrawlSession, CrawlStatus};
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage};
pub use frontier::{Frontier, QueuedUrl};
pub use parser::{parse_page, ParsedPage};
