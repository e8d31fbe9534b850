//! Crawl session state
//!
//! - `CrawlState`: engine lifecycle state machine
//! - `SkipReason`: why a frontier entry was dropped
//! - `DomainTable`: per-host page counters enforcing the per-domain cap

mod crawl_state;
mod domain_state;

pub use crawl_state::{CrawlState, SkipReason};
pub use domain_state::{DomainState, DomainTable};
