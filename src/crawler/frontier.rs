//! Breadth-first crawl frontier

use std::collections::VecDeque;
use url::Url;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedUrl {
    /// Normalized URL
    pub url: Url,

    /// Link distance from the root page
    pub depth: u32,
}

/// FIFO queue of URLs
///
/// Links are pushed at their source depth + 1, so popping in insertion order
/// visits pages in non-decreasing depth.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<QueuedUrl>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, url: Url, depth: u32) {
        self.queue.push_back(QueuedUrl { url, depth });
    }

    pub fn pop(&mut self) -> Option<QueuedUrl> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
