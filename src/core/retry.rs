//! Failure policy: requeue with a bumped retry count, or give up.

use std::time::Duration;

use crate::config::EngineConfig;

/// What to do with an item whose attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Move to `RETRY` with this retry count and requeue on the retry queue.
    Requeue {
        /// Retry count after the increment.
        next_retry_count: u32,
    },
    /// Move to `FAILED`; no further attempts.
    Exhausted,
}

/// Retry limits shared by every worker of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.max_retry, config.retry_delay())
    }
}

impl RetryPolicy {
    /// Create a policy allowing `max_retry` retries after the first attempt.
    #[must_use]
    pub const fn new(max_retry: u32, delay: Duration) -> Self {
        Self { max_retry, delay }
    }

    /// Maximum number of retries.
    #[must_use]
    pub const fn max_retry(&self) -> u32 {
        self.max_retry
    }

    /// Pause a retry worker takes before each attempt.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Decide the fate of an item that just failed with `retry_count` retries used.
    #[must_use]
    pub const fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count < self.max_retry {
            RetryDecision::Requeue {
                next_retry_count: retry_count + 1,
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}
