//! Delivery channels and their wire-level constraints.
//!
//! Channel names must match the values stored in the
//! `delivery_tasks.channel` and `channel_preferences.channels` columns and
//! referenced by the orchestrator, preference resolver, and API handlers.

use serde::{Deserialize, Serialize};

/// A delivery medium for one rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Mobile/web push notification.
    Push,
    /// SMS via the SMS gateway.
    Sms,
    /// WhatsApp Business API message.
    Whatsapp,
    /// Transactional email via SMTP.
    Email,
    /// In-app notification delivered on the in-process feed and stored
    /// for the notification bell UI.
    InApp,
}

/// All channels, in declaration order.
pub const ALL_CHANNELS: [Channel; 5] = [
    Channel::Push,
    Channel::Sms,
    Channel::Whatsapp,
    Channel::Email,
    Channel::InApp,
];

/// Default channel ordering applied when a recipient has no stored
/// preference for a category.
pub const DEFAULT_CHANNEL_ORDER: [Channel; 2] = [Channel::Push, Channel::Email];

impl Channel {
    /// Stable snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
            Channel::InApp => "in_app",
        }
    }

    /// Maximum rendered body length in characters, if the channel imposes
    /// one. SMS segments are billed per 160 characters on the African
    /// carrier networks EDUCAFRIC targets, so SMS bodies are capped at a
    /// single segment.
    pub fn body_limit(&self) -> Option<usize> {
        match self {
            Channel::Sms => Some(160),
            Channel::Whatsapp => Some(4096),
            Channel::Push => Some(240),
            Channel::InApp => Some(500),
            Channel::Email => None,
        }
    }

    /// Whether the channel carries a subject/title in addition to a body.
    pub fn has_subject(&self) -> bool {
        matches!(self, Channel::Email | Channel::Push | Channel::InApp)
    }

    /// Urgency rank used to order per-recipient dispatch for high/critical
    /// priority requests. Lower rank is attempted first: SMS and WhatsApp
    /// reach parents without a data connection, so they lead.
    pub fn urgency_rank(&self) -> u8 {
        match self {
            Channel::Sms => 0,
            Channel::Whatsapp => 1,
            Channel::Push => 2,
            Channel::Email => 3,
            Channel::InApp => 4,
        }
    }

    /// The fallback channel used by single-hop escalation when retries on
    /// this channel are exhausted, if one exists.
    pub fn escalation_fallback(&self) -> Option<Channel> {
        match self {
            Channel::Push => Some(Channel::Sms),
            Channel::Whatsapp => Some(Channel::Sms),
            Channel::Email => Some(Channel::Sms),
            Channel::InApp => Some(Channel::Push),
            Channel::Sms => None,
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Channel::Push),
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::Whatsapp),
            "email" => Ok(Channel::Email),
            "in_app" => Ok(Channel::InApp),
            other => Err(format!("Unknown channel: {other}")),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort a channel list in urgency order (SMS/WhatsApp before push/email),
/// preserving the relative order of equally ranked entries.
pub fn sort_by_urgency(channels: &mut [Channel]) {
    channels.sort_by_key(|c| c.urgency_rank());
}

/// Truncate `body` to the channel's body limit on a char boundary,
/// appending an ellipsis marker when content was cut.
pub fn truncate_for(channel: Channel, body: &str) -> String {
    let Some(limit) = channel.body_limit() else {
        return body.to_string();
    };
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(limit.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for channel in ALL_CHANNELS {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!("telegram".parse::<Channel>().is_err());
    }

    #[test]
    fn urgency_order_puts_sms_first() {
        let mut channels = vec![Channel::Email, Channel::Push, Channel::Sms];
        sort_by_urgency(&mut channels);
        assert_eq!(channels, vec![Channel::Sms, Channel::Push, Channel::Email]);
    }

    #[test]
    fn short_body_is_untouched() {
        assert_eq!(truncate_for(Channel::Sms, "Jean absent"), "Jean absent");
    }

    #[test]
    fn long_sms_body_is_truncated_with_ellipsis() {
        let body = "x".repeat(200);
        let truncated = truncate_for(Channel::Sms, &body);
        assert_eq!(truncated.chars().count(), 160);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(200);
        let truncated = truncate_for(Channel::Sms, &body);
        assert_eq!(truncated.chars().count(), 160);
    }

    #[test]
    fn email_has_no_body_limit() {
        let body = "x".repeat(10_000);
        assert_eq!(truncate_for(Channel::Email, &body), body);
    }

    #[test]
    fn sms_has_no_escalation_fallback() {
        assert_eq!(Channel::Sms.escalation_fallback(), None);
        assert_eq!(Channel::Push.escalation_fallback(), Some(Channel::Sms));
    }
}
