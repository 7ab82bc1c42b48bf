//! Retry parameters handed to the task queue with each submission.
//!
//! The worker retries a failed task with a linearly growing delay:
//! `delay(n) = min(interval_start + n * interval_step, interval_max)` seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-task retry and backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryParams {
    /// Maximum retry attempts after the initial run.
    pub max_retries: u32,
    /// Delay before the first retry, in seconds.
    pub interval_start: u64,
    /// Increment added for each further retry, in seconds.
    pub interval_step: u64,
    /// Cap on any single delay, in seconds.
    pub interval_max: u64,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self::standard(3)
    }
}

impl RetryParams {
    /// Retry profile for monitoring jobs: short, quickly growing delays.
    #[must_use]
    pub const fn monitoring(max_retries: u32) -> Self {
        Self {
            max_retries,
            interval_start: 30,
            interval_step: 10,
            interval_max: 300,
        }
    }

    /// Retry profile for anomaly-detection jobs.
    #[must_use]
    pub const fn anomaly_detection(max_retries: u32) -> Self {
        Self {
            max_retries,
            interval_start: 60,
            interval_step: 30,
            interval_max: 600,
        }
    }

    /// Retry profile for everything else: a constant one-minute delay.
    #[must_use]
    pub const fn standard(max_retries: u32) -> Self {
        Self {
            max_retries,
            interval_start: 60,
            interval_step: 0,
            interval_max: 60,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .interval_start
            .saturating_add(self.interval_step.saturating_mul(u64::from(attempt)))
            .min(self.interval_max);
        Duration::from_secs(delay)
    }

    /// Returns true if `attempt` retries have used up the budget.
    #[must_use]
    pub const fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }

    /// The full delay schedule, one entry per permitted retry.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|n| self.delay_for_attempt(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitoring_schedule_grows() {
        let params = RetryParams::monitoring(2);
        assert_eq!(
            params.schedule(),
            vec![Duration::from_secs(30), Duration::from_secs(40)]
        );
    }

    #[test]
    fn test_delay_is_capped() {
        let params = RetryParams::anomaly_detection(50);
        assert_eq!(params.delay_for_attempt(0), Duration::from_secs(60));
        assert_eq!(params.delay_for_attempt(3), Duration::from_secs(150));
        assert_eq!(params.delay_for_attempt(40), Duration::from_secs(600));
    }

    #[test]
    fn test_standard_is_constant() {
        let params = RetryParams::standard(3);
        assert!(params.schedule().iter().all(|d| *d == Duration::from_secs(60)));
    }

    #[test]
    fn test_exhaustion() {
        let params = RetryParams::default();
        assert!(!params.is_exhausted(2));
        assert!(params.is_exhausted(3));
    }

    #[test]
    fn test_no_overflow_on_huge_attempt() {
        let params = RetryParams {
            max_retries: 1,
            interval_start: u64::MAX - 1,
            interval_step: u64::MAX,
            interval_max: u64::MAX,
        };
        assert_eq!(params.delay_for_attempt(u32::MAX), Duration::from_secs(u64::MAX));
    }
}
