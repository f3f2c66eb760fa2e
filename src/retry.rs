//! Retry / backoff policy for connection attempts
//!
//! Each driver connect call is one atomic attempt; any failure inside the
//! protocol connect sequence counts as one failed attempt. Delay between
//! attempt i and i+1 grows exponentially: base * 2^i, no jitter.

use std::time::Duration;

/// Default maximum attempt count
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff delay (milliseconds)
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Backoff policy for one connect() call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per connect() call, including the first
    pub max_attempts: u32,
    /// Base delay; doubled after each failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Delay to sleep after failed attempt `attempt` (0-indexed)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        // Saturate rather than overflow for absurd attempt counts
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(0), Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.has_attempts_left(0));
        assert!(policy.has_attempts_left(2));
        assert!(!policy.has_attempts_left(3));
        assert!(!policy.has_attempts_left(4));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(64, Duration::from_secs(1));
        // Must not panic on large exponents
        let _ = policy.delay_after(63);
    }
}
