//! Exponential backoff policy with jitter.
//!
//! The retry parameters are deployment configuration, not constants: the
//! notify crate's `NotifyConfig` builds a [`RetryPolicy`] from environment
//! variables and hands it to the orchestrator.

use std::time::Duration;

use rand::Rng;

use crate::event::Priority;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default attempt budget for low/medium priority.
pub const DEFAULT_MAX_ATTEMPTS_STANDARD: u32 = 3;

/// Default attempt budget for high/critical priority.
pub const DEFAULT_MAX_ATTEMPTS_URGENT: u32 = 6;

/// Retry/backoff parameters applied to transient delivery failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt; doubled per subsequent attempt.
    pub base_delay: Duration,
    /// Upper bound for a single computed delay, before jitter.
    pub max_delay: Duration,
    /// Attempt budget for low/medium priority tasks.
    pub max_attempts_standard: u32,
    /// Attempt budget for high/critical priority tasks.
    pub max_attempts_urgent: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts_standard: DEFAULT_MAX_ATTEMPTS_STANDARD,
            max_attempts_urgent: DEFAULT_MAX_ATTEMPTS_URGENT,
        }
    }
}

impl RetryPolicy {
    /// Maximum number of send attempts for the given priority.
    pub fn max_attempts(&self, priority: Priority) -> u32 {
        if priority.is_urgent() {
            self.max_attempts_urgent
        } else {
            self.max_attempts_standard
        }
    }

    /// Backoff delay before retrying after `attempt` completed attempts
    /// (1-based): `base * 2^(attempt-1)`, capped at `max_delay`, plus a
    /// uniform jitter of up to 50% of the computed delay so simultaneous
    /// failures do not retry in lockstep against the provider.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 2u64.saturating_pow(exponent);
        let raw = self
            .base_delay
            .saturating_mul(factor as u32)
            .min(self.max_delay);
        let jitter_cap = raw.as_millis() as u64 / 2;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        raw + Duration::from_millis(jitter)
    }

    /// Worst-case total retry duration for the given priority, used to
    /// sanity-check that the dedup window outlives any in-progress retry
    /// sequence.
    pub fn max_total_duration(&self, priority: Priority) -> Duration {
        let attempts = self.max_attempts(priority);
        let mut total = Duration::ZERO;
        for attempt in 1..attempts {
            // Upper bound: computed delay + maximum jitter.
            let exponent = attempt.saturating_sub(1).min(16);
            let factor = 2u64.saturating_pow(exponent);
            let raw = self
                .base_delay
                .saturating_mul(factor as u32)
                .min(self.max_delay);
            total += raw + raw / 2;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        // Jitter adds at most 50%, so bound-check rather than assert exact.
        for (attempt, expected_raw) in [(1u32, 2u64), (2, 4), (3, 8), (6, 60), (10, 60)] {
            let delay = policy.backoff_delay(attempt);
            assert!(
                delay >= Duration::from_secs(expected_raw),
                "attempt {attempt}: {delay:?} below raw {expected_raw}s"
            );
            assert!(
                delay <= Duration::from_secs(expected_raw) + Duration::from_secs(expected_raw) / 2,
                "attempt {attempt}: {delay:?} above raw + 50% jitter"
            );
        }
    }

    #[test]
    fn attempt_budget_by_priority() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(Priority::Low), 3);
        assert_eq!(policy.max_attempts(Priority::Medium), 3);
        assert_eq!(policy.max_attempts(Priority::High), 6);
        assert_eq!(policy.max_attempts(Priority::Critical), 6);
    }

    #[test]
    fn total_duration_fits_default_dedup_window() {
        let policy = RetryPolicy::default();
        let worst = policy.max_total_duration(Priority::Critical);
        // Default dedup window is 24h; the retry sequence must end well
        // inside it.
        assert!(worst < Duration::from_secs(24 * 3600));
    }
}
