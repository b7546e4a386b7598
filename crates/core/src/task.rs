//! Delivery tasks: the per-(recipient, channel) unit of work, its status
//! machine, the adapter outcome taxonomy, and the deterministic
//! idempotency key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::channel::Channel;
use crate::event::{EventCategory, Priority};
use crate::types::{DbId, Timestamp};

/// Compute the idempotency key for one (event, recipient, channel) triple.
///
/// The key is the lowercase hex SHA-256 of the three components joined by
/// newlines, so the same logical send always maps to the same task row and
/// a replayed submission resolves to the existing task instead of creating
/// a duplicate.
pub fn task_id(event_id: &str, recipient_id: DbId, channel: Channel) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(recipient_id.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(channel.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Lifecycle state of a delivery task.
///
/// ```text
/// pending -> in_flight -> delivered | failed | escalated | expired
/// pending -> cancelled            (best-effort bulk cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created and reserved, not yet handed to an adapter.
    Pending,
    /// An adapter attempt is running or a retry is scheduled.
    InFlight,
    /// The provider accepted the message. Terminal; at most one
    /// `delivered` record may ever exist per task id.
    Delivered,
    /// Retries exhausted or a permanent provider error. Terminal.
    Failed,
    /// Retries exhausted on a required channel of a critical request and a
    /// fallback task was spawned. Terminal.
    Escalated,
    /// The overall task deadline elapsed before a terminal outcome.
    /// Terminal.
    Expired,
    /// Cancelled while still pending, e.g. the triggering event was
    /// invalidated. Terminal.
    Cancelled,
}

impl TaskStatus {
    /// Stable wire name, matching the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InFlight => "in_flight",
            TaskStatus::Delivered => "delivered",
            TaskStatus::Failed => "failed",
            TaskStatus::Escalated => "escalated",
            TaskStatus::Expired => "expired",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the task can never change state again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::InFlight)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_flight" => Ok(TaskStatus::InFlight),
            "delivered" => Ok(TaskStatus::Delivered),
            "failed" => Ok(TaskStatus::Failed),
            "escalated" => Ok(TaskStatus::Escalated),
            "expired" => Ok(TaskStatus::Expired),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("Unknown task status: {other}")),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel-agnostic result of one adapter send attempt.
///
/// Adapters classify provider-specific errors into this three-way taxonomy
/// so the orchestrator's retry policy never sees provider details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The provider accepted the message.
    Delivered {
        /// Provider-side message reference, when one was returned.
        provider_ref: Option<String>,
    },
    /// Transient failure (timeout, rate limit, 5xx). Retried per the
    /// backoff policy.
    Retryable { reason: String },
    /// Non-recoverable failure (invalid destination, unsubscribed). No
    /// retry.
    Permanent { reason: String },
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        DeliveryOutcome::Delivered { provider_ref: None }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Retryable {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Permanent {
            reason: reason.into(),
        }
    }

    /// Short machine-readable code written to the delivery log.
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "success",
            DeliveryOutcome::Retryable { .. } => "retryable",
            DeliveryOutcome::Permanent { .. } => "permanent",
        }
    }
}

/// One unit of work: deliver one rendered message to one recipient on one
/// channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryTask {
    /// Deterministic idempotency key, see [`task_id`].
    pub task_id: String,
    /// The originating request's event id.
    pub event_id: String,
    pub recipient_id: DbId,
    pub channel: Channel,
    pub category: EventCategory,
    pub priority: Priority,
    pub status: TaskStatus,
    pub attempt_count: u32,
    /// Rendered once at expansion time and cached on the task.
    pub rendered_subject: Option<String>,
    pub rendered_body: String,
    /// Set only on escalation tasks: the task id this one falls back for.
    /// Tasks with this set never escalate again (single hop).
    pub escalated_from: Option<String>,
    pub last_attempt_at: Option<Timestamp>,
    pub next_retry_at: Option<Timestamp>,
    /// End of the dedup window; a reservation past this instant is treated
    /// as new.
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

/// Immutable append-only audit record for one delivery attempt or state
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub task_id: String,
    pub attempt_number: u32,
    /// Outcome code: `success`, `retryable`, `permanent`, or a lifecycle
    /// marker such as `expired`, `escalated`, `cancelled`.
    pub outcome: String,
    /// Short provider response summary or error reason for support
    /// investigation.
    pub detail: Option<String>,
    pub latency_ms: Option<i64>,
    pub created_at: Timestamp,
}

impl DeliveryLogEntry {
    /// Build an entry timestamped now.
    pub fn new(task_id: impl Into<String>, attempt_number: u32, outcome: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            attempt_number,
            outcome: outcome.into(),
            detail: None,
            latency_ms: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: i64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_deterministic() {
        let a = task_id("grade-42", 7, Channel::Sms);
        let b = task_id("grade-42", 7, Channel::Sms);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn task_id_differs_per_component() {
        let base = task_id("grade-42", 7, Channel::Sms);
        assert_ne!(base, task_id("grade-43", 7, Channel::Sms));
        assert_ne!(base, task_id("grade-42", 8, Channel::Sms));
        assert_ne!(base, task_id("grade-42", 7, Channel::Push));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InFlight.is_terminal());
        for status in [
            TaskStatus::Delivered,
            TaskStatus::Failed,
            TaskStatus::Escalated,
            TaskStatus::Expired,
            TaskStatus::Cancelled,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InFlight,
            TaskStatus::Delivered,
            TaskStatus::Failed,
            TaskStatus::Escalated,
            TaskStatus::Expired,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn outcome_codes() {
        assert_eq!(DeliveryOutcome::delivered().code(), "success");
        assert_eq!(DeliveryOutcome::retryable("timeout").code(), "retryable");
        assert_eq!(
            DeliveryOutcome::permanent("invalid_recipient").code(),
            "permanent"
        );
    }
}
