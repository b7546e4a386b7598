//! Escalation policy: at most one fallback hop for failed critical tasks.
//!
//! When a critical-priority task on a category-required channel exhausts
//! its retries, the policy names one fallback channel from the static
//! chain on [`Channel::escalation_fallback`] (push → sms, whatsapp → sms,
//! email → sms, in_app → push). SMS is the chain's floor in markets where
//! it is the only destination reliably reachable without data.
//!
//! Escalation tasks carry `escalated_from` and never escalate again.

use std::collections::HashMap;

use educafric_core::task::DeliveryTask;
use educafric_core::{Channel, EventCategory, Priority};

/// Decides whether a failed task spawns a fallback task.
pub struct EscalationPolicy {
    required: HashMap<EventCategory, Vec<Channel>>,
}

impl EscalationPolicy {
    /// Policy with the platform default required map: emergencies must
    /// reach SMS.
    pub fn new() -> Self {
        Self {
            required: HashMap::from([(EventCategory::Emergency, vec![Channel::Sms])]),
        }
    }

    /// Replace the required-channel map.
    pub fn with_required(mut self, required: HashMap<EventCategory, Vec<Channel>>) -> Self {
        self.required = required;
        self
    }

    /// The fallback channel for a failed task, or `None` when the task
    /// does not escalate: non-critical priority, not a required channel
    /// for its category, already an escalation hop, or no fallback exists
    /// for the channel.
    pub fn fallback_for(&self, task: &DeliveryTask) -> Option<Channel> {
        if task.priority != Priority::Critical || task.escalated_from.is_some() {
            return None;
        }
        let required = self.required.get(&task.category)?;
        if !required.contains(&task.channel) {
            return None;
        }
        task.channel.escalation_fallback()
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use educafric_core::task::TaskStatus;
    use educafric_core::task_id;

    fn failed_task(channel: Channel, priority: Priority) -> DeliveryTask {
        let now = Utc::now();
        DeliveryTask {
            task_id: task_id("evt-1", 5, channel),
            event_id: "evt-1".into(),
            recipient_id: 5,
            channel,
            category: EventCategory::Emergency,
            priority,
            status: TaskStatus::Failed,
            attempt_count: 6,
            rendered_subject: None,
            rendered_body: "alerte".into(),
            escalated_from: None,
            last_attempt_at: Some(now),
            next_retry_at: None,
            expires_at: now,
            created_at: now,
        }
    }

    fn policy_requiring_push() -> EscalationPolicy {
        EscalationPolicy::new()
            .with_required(HashMap::from([(
                EventCategory::Emergency,
                vec![Channel::Push, Channel::Sms],
            )]))
    }

    #[test]
    fn critical_required_push_falls_back_to_sms() {
        let task = failed_task(Channel::Push, Priority::Critical);
        assert_eq!(policy_requiring_push().fallback_for(&task), Some(Channel::Sms));
    }

    #[test]
    fn non_critical_never_escalates() {
        let task = failed_task(Channel::Push, Priority::High);
        assert_eq!(policy_requiring_push().fallback_for(&task), None);
    }

    #[test]
    fn non_required_channel_never_escalates() {
        // Default policy only requires SMS for emergencies.
        let task = failed_task(Channel::Push, Priority::Critical);
        assert_eq!(EscalationPolicy::new().fallback_for(&task), None);
    }

    #[test]
    fn sms_is_the_chain_floor() {
        let task = failed_task(Channel::Sms, Priority::Critical);
        assert_eq!(EscalationPolicy::new().fallback_for(&task), None);
    }

    #[test]
    fn escalation_tasks_never_escalate_again() {
        let mut task = failed_task(Channel::Push, Priority::Critical);
        task.escalated_from = Some(task_id("evt-1", 5, Channel::Email));
        assert_eq!(policy_requiring_push().fallback_for(&task), None);
    }
}
