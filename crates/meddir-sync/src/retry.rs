//! Retry policy for pending operations
//!
//! An operation that fails is retried on later cycles until it has been
//! attempted `max_attempts` times, after which it is marked failed and
//! excluded from automatic pushes. With backoff enabled, a retry is only
//! due once `base * 2^(attempts-1)` (capped at `max`) has elapsed since the
//! last attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use meddir_core::{config::SyncConfig, domain::PendingOperation};

/// Exponential backoff between automatic attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay after `attempts` failed attempts
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempts - 1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Attempt cap plus optional backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Option<Backoff>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: None,
        }
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = Some(Backoff { base, max });
        self
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        let policy = Self::new(config.max_attempts);
        if config.backoff.enabled {
            policy.with_backoff(
                Duration::from_millis(config.backoff.base_ms),
                Duration::from_millis(config.backoff.max_ms),
            )
        } else {
            policy
        }
    }

    /// Whether `operation` should be pushed in a cycle starting at `now`
    pub fn is_due(&self, operation: &PendingOperation, now: DateTime<Utc>) -> bool {
        if operation.failed {
            return false;
        }
        let (Some(backoff), Some(last)) = (self.backoff, operation.last_attempt_at) else {
            return true;
        };

        let wait = backoff.delay(operation.attempts);
        match chrono::Duration::from_std(wait) {
            Ok(wait) => last + wait <= now,
            Err(_) => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
