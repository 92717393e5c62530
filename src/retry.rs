/// Retry module - bounded reconnection with exponential backoff
///
/// Used while the sensor network is being brought up. Each failed
/// `initialize()` is followed by a `cleanup()` and a growing pause; after
/// `max_attempts` failures the run aborts instead of spinning forever.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// RetryPolicy - attempt bound and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total `initialize()` attempts before giving up (at least 1)
    pub max_attempts: u32,

    /// Delay after the first failure
    pub base_delay_ms: u64,

    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Retry immediately, for tests and scripted facades.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0, 0)
    }

    /// Calculate exponential backoff delay
    ///
    /// Formula: delay = min(base_ms * (BACKOFF_MULTIPLIER ^ attempt), max_delay_ms)
    pub fn calculate_backoff_ms(attempt: u32, base_ms: u64, max_delay_ms: u64) -> u64 {
        let multiplier = crate::BACKOFF_MULTIPLIER;
        let backoff = base_ms.saturating_mul(multiplier.saturating_pow(attempt));
        backoff.min(max_delay_ms)
    }

    /// Pause to take after the `failed`-th consecutive failure (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        Duration::from_millis(Self::calculate_backoff_ms(
            failed.saturating_sub(1),
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_CONNECT_ATTEMPTS,
            base_delay_ms: crate::DEFAULT_BACKOFF_BASE_MS,
            max_delay_ms: crate::DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

/// Connection attempt tracker
///
/// Counts attempts for one Connecting phase.
#[derive(Debug, Clone)]
pub struct ConnectAttempts {
    policy: RetryPolicy,

    /// Attempts made so far
    pub attempt: u32,
}

impl ConnectAttempts {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Record the start of an attempt; returns its 1-based number.
    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.policy.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        !self.can_retry()
    }

    /// Backoff before the next attempt.
    pub fn next_delay(&self) -> Duration {
        self.policy.delay_after(self.attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        assert_eq!(RetryPolicy::calculate_backoff_ms(0, 100, 5000), 100);
        assert_eq!(RetryPolicy::calculate_backoff_ms(1, 100, 5000), 200);
        assert_eq!(RetryPolicy::calculate_backoff_ms(2, 100, 5000), 400);
        assert_eq!(RetryPolicy::calculate_backoff_ms(3, 100, 5000), 800);
        assert_eq!(RetryPolicy::calculate_backoff_ms(10, 100, 5000), 5000); // Capped
        assert_eq!(RetryPolicy::calculate_backoff_ms(200, 100, 5000), 5000);
    }

    #[test]
    fn test_delay_after_failures() {
        let policy = RetryPolicy::new(5, 50, 1000);
        assert_eq!(policy.delay_after(1), Duration::from_millis(50));
        assert_eq!(policy.delay_after(2), Duration::from_millis(100));
        assert_eq!(policy.delay_after(6), Duration::from_millis(1000));
    }

    #[test]
    fn test_connect_attempts() {
        let mut attempts = ConnectAttempts::new(RetryPolicy::immediate(3));

        assert_eq!(attempts.begin(), 1);
        assert!(attempts.can_retry());
        assert_eq!(attempts.begin(), 2);
        assert_eq!(attempts.begin(), 3);
        assert!(attempts.is_exhausted());
        assert_eq!(attempts.next_delay(), Duration::ZERO);
    }
}
