//! The notification submission envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::CoreError;
use crate::event::{EventCategory, Priority};
use crate::types::{DbId, Timestamp};

/// One notification request, produced by a domain feature (grade entry,
/// geofence check job, payment webhook) and handed to the orchestrator.
///
/// Constructed via [`NotificationRequest::new`] and enriched with the
/// builder methods. `event_id` is the idempotency root: callers must reuse
/// the same id when retrying the *same* logical event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Opaque caller-supplied id, globally unique per logical event.
    pub event_id: String,

    /// Domain area of the notification.
    pub category: EventCategory,

    /// Delivery urgency.
    pub priority: Priority,

    /// Target users. Must be non-empty; duplicates are ignored.
    pub recipient_ids: Vec<DbId>,

    /// Which content template to resolve, e.g. `"grade.new"`.
    pub template_key: String,

    /// Values interpolated into the template body.
    pub payload: BTreeMap<String, String>,

    /// Optional channel restriction. Empty means "resolve from the
    /// recipient's preferences".
    pub requested_channels: Vec<Channel>,

    /// When the request was created (UTC).
    pub created_at: Timestamp,
}

impl NotificationRequest {
    /// Create a request with the required fields. Recipients, payload, and
    /// channel restrictions are attached with the `with_*` builders.
    pub fn new(
        event_id: impl Into<String>,
        category: EventCategory,
        priority: Priority,
        template_key: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            category,
            priority,
            recipient_ids: Vec::new(),
            template_key: template_key.into(),
            payload: BTreeMap::new(),
            requested_channels: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Set the target users.
    pub fn with_recipients(mut self, recipient_ids: impl Into<Vec<DbId>>) -> Self {
        self.recipient_ids = recipient_ids.into();
        self
    }

    /// Add one interpolation value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Restrict delivery to a subset of channels.
    pub fn with_channels(mut self, channels: impl Into<Vec<Channel>>) -> Self {
        self.requested_channels = channels.into();
        self
    }

    /// Check request-level constraints.
    ///
    /// Only these failures reject the whole `submit` call synchronously;
    /// per-recipient problems are reported individually during fan-out.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.event_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "event_id must not be empty".to_string(),
            ));
        }
        if self.recipient_ids.is_empty() {
            return Err(CoreError::Validation(
                "recipient_ids must not be empty".to_string(),
            ));
        }
        if self.template_key.trim().is_empty() {
            return Err(CoreError::Validation(
                "template_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Recipient ids with duplicates removed, preserving first-seen order.
    pub fn unique_recipients(&self) -> Vec<DbId> {
        let mut seen = std::collections::HashSet::new();
        self.recipient_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> NotificationRequest {
        NotificationRequest::new(
            "grade-42",
            EventCategory::Academic,
            Priority::Medium,
            "grade.new",
        )
        .with_recipients(vec![7])
        .with_value("studentName", "Jean")
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn empty_recipients_rejected() {
        let req = request().with_recipients(Vec::new());
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_event_id_rejected() {
        let mut req = request();
        req.event_id = "  ".to_string();
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_recipients_collapse() {
        let req = request().with_recipients(vec![7, 3, 7, 3, 9]);
        assert_eq!(req.unique_recipients(), vec![7, 3, 9]);
    }
}
