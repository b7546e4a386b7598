//! Per-recipient channel resolution.
//!
//! For each (recipient, category) pair the resolver produces the ordered
//! list of channels a notification will actually go out on:
//!
//! 1. start from the recipient's stored preference for the category, or
//!    the platform default order when none exists;
//! 2. narrow to the request's explicit channels when the caller named any;
//! 3. drop channels the access policy forbids for this recipient and
//!    channels the recipient has no destination for;
//! 4. append the category's required channels, which bypass preferences
//!    (an emergency reaches the parent by SMS even if they opted out).
//!
//! An empty result is an error per recipient, not for the whole request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use educafric_core::channel::DEFAULT_CHANNEL_ORDER;
use educafric_core::types::DbId;
use educafric_core::{Channel, CoreError, EventCategory, NotificationRequest};

use crate::directory::RecipientContact;
use crate::error::NotifyError;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Stored preferences
// ---------------------------------------------------------------------------

/// A recipient's stored preference for one event category.
#[derive(Debug, Clone, Default)]
pub struct StoredPreference {
    /// Preferred channels in attempt order.
    pub channels: Vec<Channel>,
    /// When `false` the recipient has muted the category; only required
    /// channels still apply.
    pub is_enabled: bool,
}

/// Read access to stored channel preferences.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    async fn preference(
        &self,
        user_id: DbId,
        category: EventCategory,
    ) -> Result<Option<StoredPreference>, StoreError>;
}

/// In-memory preference source for tests and single-node dev mode.
#[derive(Default)]
pub struct MemoryPreferences {
    entries: RwLock<HashMap<(DbId, EventCategory), StoredPreference>>,
}

impl MemoryPreferences {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set(&self, user_id: DbId, category: EventCategory, pref: StoredPreference) {
        self.entries.write().await.insert((user_id, category), pref);
    }
}

#[async_trait]
impl PreferenceSource for MemoryPreferences {
    async fn preference(
        &self,
        user_id: DbId,
        category: EventCategory,
    ) -> Result<Option<StoredPreference>, StoreError> {
        Ok(self.entries.read().await.get(&(user_id, category)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Access policy
// ---------------------------------------------------------------------------

/// Hook for tenant-level restrictions on who may be reached how (a school
/// that disables WhatsApp for staff, a role barred from SMS billing
/// notices). Consulted after preferences, before required channels.
pub trait AccessPolicy: Send + Sync {
    fn allows(&self, user_id: DbId, category: EventCategory, channel: Channel) -> bool;
}

/// Policy that permits every (recipient, category, channel) combination.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _user_id: DbId, _category: EventCategory, _channel: Channel) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves the effective channel list for one recipient of a request.
pub struct PreferenceResolver {
    source: Arc<dyn PreferenceSource>,
    policy: Arc<dyn AccessPolicy>,
    required: HashMap<EventCategory, Vec<Channel>>,
}

impl PreferenceResolver {
    pub fn new(source: Arc<dyn PreferenceSource>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            source,
            policy,
            required: HashMap::from([(EventCategory::Emergency, vec![Channel::Sms])]),
        }
    }

    /// Replace the required-channel map (category -> channels that bypass
    /// preferences).
    pub fn with_required(mut self, required: HashMap<EventCategory, Vec<Channel>>) -> Self {
        self.required = required;
        self
    }

    pub fn is_required(&self, category: EventCategory, channel: Channel) -> bool {
        self.required
            .get(&category)
            .map_or(false, |channels| channels.contains(&channel))
    }

    /// Effective ordered channel list for `contact` under `request`.
    ///
    /// Errors with [`CoreError::NoChannelAvailable`] when nothing remains;
    /// callers treat that as a per-recipient failure and continue the
    /// fan-out.
    pub async fn resolve(
        &self,
        contact: &RecipientContact,
        request: &NotificationRequest,
    ) -> Result<Vec<Channel>, NotifyError> {
        let stored = self
            .source
            .preference(contact.user_id, request.category)
            .await?;

        let mut channels: Vec<Channel> = match stored {
            Some(pref) if !pref.is_enabled => Vec::new(),
            Some(pref) if !pref.channels.is_empty() => pref.channels,
            _ => DEFAULT_CHANNEL_ORDER.to_vec(),
        };

        if !request.requested_channels.is_empty() {
            channels.retain(|c| request.requested_channels.contains(c));
        }

        channels.retain(|&c| {
            self.policy.allows(contact.user_id, request.category, c)
                && contact.destination(c).is_some()
        });

        // Required channels bypass preferences and the request narrowing,
        // but still need a reachable destination.
        if let Some(required) = self.required.get(&request.category) {
            for &channel in required {
                if !channels.contains(&channel) && contact.destination(channel).is_some() {
                    channels.push(channel);
                }
            }
        }

        if channels.is_empty() {
            return Err(NotifyError::Core(CoreError::NoChannelAvailable {
                recipient_id: contact.user_id,
            }));
        }
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use educafric_core::Priority;

    fn contact(user_id: DbId) -> RecipientContact {
        RecipientContact {
            user_id,
            phone: Some("+237650000001".into()),
            whatsapp_number: None,
            email: Some("parent@example.cm".into()),
            push_token: Some("fcm-token".into()),
            ..Default::default()
        }
    }

    fn request(category: EventCategory) -> NotificationRequest {
        NotificationRequest::new("evt-1", category, Priority::Medium, "grade.new")
            .with_recipients(vec![1])
    }

    fn resolver(source: Arc<MemoryPreferences>) -> PreferenceResolver {
        PreferenceResolver::new(source, Arc::new(AllowAll))
    }

    #[tokio::test]
    async fn falls_back_to_default_order_without_stored_preference() {
        let resolver = resolver(MemoryPreferences::new());
        let channels = resolver
            .resolve(&contact(1), &request(EventCategory::Academic))
            .await
            .unwrap();
        assert_eq!(channels, DEFAULT_CHANNEL_ORDER.to_vec());
    }

    #[tokio::test]
    async fn stored_preference_order_is_kept() {
        let prefs = MemoryPreferences::new();
        prefs
            .set(
                1,
                EventCategory::Academic,
                StoredPreference {
                    channels: vec![Channel::Email, Channel::Sms],
                    is_enabled: true,
                },
            )
            .await;
        let channels = resolver(prefs)
            .resolve(&contact(1), &request(EventCategory::Academic))
            .await
            .unwrap();
        assert_eq!(channels, vec![Channel::Email, Channel::Sms]);
    }

    #[tokio::test]
    async fn request_channels_narrow_but_never_widen() {
        let resolver = resolver(MemoryPreferences::new());
        let req = request(EventCategory::Academic).with_channels(vec![Channel::Email, Channel::Sms]);
        let channels = resolver.resolve(&contact(1), &req).await.unwrap();
        // Sms is not in the default order, so only the intersection remains.
        assert_eq!(channels, vec![Channel::Email]);
    }

    #[tokio::test]
    async fn muted_category_yields_no_channels() {
        let prefs = MemoryPreferences::new();
        prefs
            .set(
                1,
                EventCategory::Billing,
                StoredPreference { channels: vec![Channel::Sms], is_enabled: false },
            )
            .await;
        let result = resolver(prefs)
            .resolve(&contact(1), &request(EventCategory::Billing))
            .await;
        assert_matches!(
            result,
            Err(NotifyError::Core(CoreError::NoChannelAvailable { recipient_id: 1 }))
        );
    }

    #[tokio::test]
    async fn emergency_sms_bypasses_muted_preference() {
        let prefs = MemoryPreferences::new();
        prefs
            .set(
                1,
                EventCategory::Emergency,
                StoredPreference { channels: vec![Channel::Push], is_enabled: false },
            )
            .await;
        let channels = resolver(prefs)
            .resolve(&contact(1), &request(EventCategory::Emergency))
            .await
            .unwrap();
        assert_eq!(channels, vec![Channel::Sms]);
    }

    #[tokio::test]
    async fn required_channel_needs_a_destination() {
        let mut c = contact(1);
        c.phone = None;
        let prefs = MemoryPreferences::new();
        prefs
            .set(
                1,
                EventCategory::Emergency,
                StoredPreference { channels: vec![], is_enabled: false },
            )
            .await;
        let result = resolver(prefs)
            .resolve(&c, &request(EventCategory::Emergency))
            .await;
        assert_matches!(result, Err(NotifyError::Core(CoreError::NoChannelAvailable { .. })));
    }

    #[tokio::test]
    async fn missing_destination_drops_the_channel() {
        let mut c = contact(1);
        c.push_token = None;
        let channels = resolver(MemoryPreferences::new())
            .resolve(&c, &request(EventCategory::Academic))
            .await
            .unwrap();
        assert_eq!(channels, vec![Channel::Email]);
    }

    struct NoSmsForBilling;

    impl AccessPolicy for NoSmsForBilling {
        fn allows(&self, _user_id: DbId, category: EventCategory, channel: Channel) -> bool {
            !(category == EventCategory::Billing && channel == Channel::Sms)
        }
    }

    #[tokio::test]
    async fn access_policy_filters_channels() {
        let prefs = MemoryPreferences::new();
        prefs
            .set(
                1,
                EventCategory::Billing,
                StoredPreference {
                    channels: vec![Channel::Sms, Channel::Email],
                    is_enabled: true,
                },
            )
            .await;
        let resolver = PreferenceResolver::new(prefs, Arc::new(NoSmsForBilling));
        let channels = resolver
            .resolve(&contact(1), &request(EventCategory::Billing))
            .await
            .unwrap();
        assert_eq!(channels, vec![Channel::Email]);
    }
}
