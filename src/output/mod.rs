//! Crawl reporting
//!
//! - [`CrawlReport`]: what one session visited, skipped and failed
//! - markdown export and console statistics for a report

mod markdown;
mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{
    CrawlReport, FailedPage, LinkCounts, OutputError, OutputResult, SkippedPage, VisitedPage,
};
pub use stats::print_statistics;
