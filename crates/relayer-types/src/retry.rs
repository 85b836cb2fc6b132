//! The data-bearing `RetryPolicy` value, per `spec.md`'s Design Note: "Retry-with-
//! backoff as a value... don't scatter loops" — every retrying call site constructs
//! the same policy and asks it for delays, instead of hand-rolling its own loop.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with optional jitter, consumed by
/// `relayer_core::executor::ActionExecutor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max_attempts: 3,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, max_attempts: u32, jitter: bool) -> Self {
        Self {
            base,
            max_attempts,
            jitter,
        }
    }

    /// The delay to wait before the given attempt number (1-indexed: the delay before
    /// the *second* attempt is `delay_for(1)`).
    ///
    /// Doubles per attempt (`base * 2^(attempt-1)`) and, when `jitter` is set,
    /// multiplies by a uniform `[0.5, 1.5)` factor so a shared RPC outage doesn't
    /// resubmit every worker in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let multiplier = 1u64 << exponent;
        let backoff = self.base.saturating_mul(multiplier as u32);
        if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            Duration::from_secs_f64(backoff.as_secs_f64() * factor)
        } else {
            backoff
        }
    }

    /// Whether `attempt` (1-indexed, the attempt that just failed) has exhausted the
    /// policy's retry budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_without_jitter() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 5, false);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn jittered_delay_stays_within_expected_bounds() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 5, true);
        for _ in 0..50 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn default_policy_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }
}
