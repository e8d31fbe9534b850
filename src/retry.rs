//! Bounded retry with exponential backoff
//!
//! Used for page fetches and for transient graph store errors. The delay
//! after the `n`th failed attempt is `base_delay * 2^(n-1)`, capped at
//! `max_delay`. There is no jitter, so schedules are reproducible.
//!
//! # Example
//!
//! ```
//! use docshop::retry::{FailureType, RetryDecision, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1));
//! assert_eq!(
//!     policy.should_retry(FailureType::Transient, 1),
//!     RetryDecision::Retry { delay: Duration::from_millis(100), attempt: 2 }
//! );
//! assert!(matches!(
//!     policy.should_retry(FailureType::Transient, 3),
//!     RetryDecision::DoNotRetry { .. }
//! ));
//! ```

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Whether a failure is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Timeouts, connection failures, 5xx, 429
    Transient,
    /// Everything else
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        delay: Duration,
        /// The attempt about to be made (1-indexed)
        attempt: u32,
    },
    DoNotRetry {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after the `attempt`th failure (1-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decides what to do after `attempt` (1-indexed) failed with `failure`
    pub fn should_retry(&self, failure: FailureType, attempt: u32) -> RetryDecision {
        if failure == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("gave up after {} attempts", attempt),
            };
        }
        RetryDecision::Retry {
            delay: self.delay_for(attempt),
            attempt: attempt + 1,
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `classify` maps an error to its [`FailureType`]. The last error is
    /// returned when giving up.
    pub async fn run<T, E, F, Fut, C>(&self, label: &str, mut op: F, classify: C) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> FailureType,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match self.should_retry(classify(&e), attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            "{} failed (attempt {}/{}): {}; retrying in {:?}",
                            label, attempt, self.max_attempts, e, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!("{} not retried: {}", label, reason);
                        return Err(e);
                    }
                },
            }
        }
    }
}
