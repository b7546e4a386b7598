//! Delivery configuration loaded from environment variables.

use std::time::Duration;

use educafric_core::retry::RetryPolicy;
use educafric_core::{Locale, Priority};

/// Default dedup window: a replayed event id inside this span is treated
/// as the same logical send. Must comfortably exceed the worst-case retry
/// sequence for any priority.
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 24 * 3600;

/// Default timeout for a single adapter/provider call.
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 10;

/// Default bound on concurrent in-flight sends per channel.
const DEFAULT_CHANNEL_CONCURRENCY: usize = 8;

/// Default overall task deadlines per priority band.
const DEFAULT_DEADLINE_STANDARD_SECS: u64 = 120;
const DEFAULT_DEADLINE_URGENT_SECS: u64 = 600;

/// Default retention window before terminal tasks are flagged archived.
const DEFAULT_RETENTION_DAYS: u64 = 90;

/// Tunables for the delivery orchestrator.
///
/// All fields have defaults suitable for local development; production
/// deployments override via environment variables.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Backoff and attempt budget parameters.
    pub retry: RetryPolicy,
    /// Span during which a repeated (event, recipient, channel) submission
    /// is a replay rather than a new send.
    pub dedup_window: Duration,
    /// Timeout for one provider call; overrun counts as a retryable error.
    pub adapter_timeout: Duration,
    /// Maximum concurrent in-flight sends per channel (provider rate
    /// limits; excess tasks queue on the channel semaphore).
    pub channel_concurrency: usize,
    /// Overall deadline for a low/medium priority task.
    pub deadline_standard: Duration,
    /// Overall deadline for a high/critical priority task.
    pub deadline_urgent: Duration,
    /// Age past which terminal tasks are flagged archived (never deleted).
    pub retention: Duration,
    /// Locale used when a recipient has no contact record.
    pub default_locale: Locale,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
            adapter_timeout: Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS),
            channel_concurrency: DEFAULT_CHANNEL_CONCURRENCY,
            deadline_standard: Duration::from_secs(DEFAULT_DEADLINE_STANDARD_SECS),
            deadline_urgent: Duration::from_secs(DEFAULT_DEADLINE_URGENT_SECS),
            retention: Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 3600),
            default_locale: Locale::Fr,
        }
    }
}

impl NotifyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `NOTIFY_RETRY_BASE_SECS`       | `2`     |
    /// | `NOTIFY_RETRY_MAX_SECS`        | `60`    |
    /// | `NOTIFY_MAX_ATTEMPTS_STANDARD` | `3`     |
    /// | `NOTIFY_MAX_ATTEMPTS_URGENT`   | `6`     |
    /// | `NOTIFY_DEDUP_WINDOW_SECS`     | `86400` |
    /// | `NOTIFY_ADAPTER_TIMEOUT_SECS`  | `10`    |
    /// | `NOTIFY_CHANNEL_CONCURRENCY`   | `8`     |
    /// | `NOTIFY_DEADLINE_STANDARD_SECS`| `120`   |
    /// | `NOTIFY_DEADLINE_URGENT_SECS`  | `600`   |
    /// | `NOTIFY_RETENTION_DAYS`        | `90`    |
    /// | `NOTIFY_DEFAULT_LOCALE`        | `fr`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secs = |var: &str, default: Duration| -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let num = |var: &str, default: u32| -> u32 {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            retry: RetryPolicy {
                base_delay: secs("NOTIFY_RETRY_BASE_SECS", defaults.retry.base_delay),
                max_delay: secs("NOTIFY_RETRY_MAX_SECS", defaults.retry.max_delay),
                max_attempts_standard: num(
                    "NOTIFY_MAX_ATTEMPTS_STANDARD",
                    defaults.retry.max_attempts_standard,
                ),
                max_attempts_urgent: num(
                    "NOTIFY_MAX_ATTEMPTS_URGENT",
                    defaults.retry.max_attempts_urgent,
                ),
            },
            dedup_window: secs("NOTIFY_DEDUP_WINDOW_SECS", defaults.dedup_window),
            adapter_timeout: secs("NOTIFY_ADAPTER_TIMEOUT_SECS", defaults.adapter_timeout),
            channel_concurrency: num(
                "NOTIFY_CHANNEL_CONCURRENCY",
                defaults.channel_concurrency as u32,
            ) as usize,
            deadline_standard: secs("NOTIFY_DEADLINE_STANDARD_SECS", defaults.deadline_standard),
            deadline_urgent: secs("NOTIFY_DEADLINE_URGENT_SECS", defaults.deadline_urgent),
            retention: Duration::from_secs(
                num("NOTIFY_RETENTION_DAYS", DEFAULT_RETENTION_DAYS as u32) as u64 * 24 * 3600,
            ),
            default_locale: std::env::var("NOTIFY_DEFAULT_LOCALE")
                .map(|v| Locale::parse_or_default(&v))
                .unwrap_or(defaults.default_locale),
        }
    }

    /// Overall deadline for a task of the given priority.
    pub fn deadline(&self, priority: Priority) -> Duration {
        if priority.is_urgent() {
            self.deadline_urgent
        } else {
            self.deadline_standard
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = NotifyConfig::default();
        assert_eq!(config.retry.max_attempts(Priority::Low), 3);
        assert_eq!(config.retry.max_attempts(Priority::Critical), 6);
        assert!(config.dedup_window > config.retry.max_total_duration(Priority::Critical));
        assert!(config.deadline(Priority::Critical) > config.deadline(Priority::Low));
    }
}
