use serde::Serialize;
use std::fmt;

/// Lifecycle of a crawl engine
///
/// ```text
/// Idle -> Initializing -> Running -> Completed | Failed | Stopped -> Idle
/// ```
///
/// `Initializing` may also end directly in `Failed` or `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    Initializing,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl CrawlState {
    /// A session is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }

    /// The last session has ended and its results are still held
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, Running)
                | (Initializing, Failed)
                | (Initializing, Stopped)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Stopped)
                | (Completed, Idle)
                | (Failed, Idle)
                | (Stopped, Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a popped frontier entry was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Visited,
    DepthExceeded,
    DomainLimit,
    RobotsDisallowed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visited => "already visited",
            Self::DepthExceeded => "depth exceeded",
            Self::DomainLimit => "domain page limit reached",
            Self::RobotsDisallowed => "disallowed by robots.txt",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
