//! Recipient contact lookup.
//!
//! The platform's relational store owns user records; delivery only needs
//! each recipient's per-channel destinations and preferred locale. The
//! [`RecipientDirectory`] trait is the seam: production uses the
//! Postgres-backed directory in [`crate::store::pg`], tests and standalone
//! deployments use [`MemoryDirectory`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use educafric_core::types::DbId;
use educafric_core::{Channel, Locale};

use crate::store::StoreError;

/// The destinations one user can be reached at.
#[derive(Debug, Clone, Default)]
pub struct RecipientContact {
    pub user_id: DbId,
    pub phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub email: Option<String>,
    pub push_token: Option<String>,
    pub locale: Locale,
}

impl RecipientContact {
    /// The destination identifier for a channel, if the user has one.
    /// In-app delivery needs no external destination and always resolves.
    pub fn destination(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Sms => self.phone.as_deref(),
            // WhatsApp numbers often differ from the SMS line; fall back
            // to the phone number when no dedicated one is stored.
            Channel::Whatsapp => self.whatsapp_number.as_deref().or(self.phone.as_deref()),
            Channel::Email => self.email.as_deref(),
            Channel::Push => self.push_token.as_deref(),
            Channel::InApp => Some(""),
        }
    }
}

/// Resolves a user id to their contact record.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Fetch the contact record, or `None` if the user has none synced.
    async fn contact(&self, user_id: DbId) -> Result<Option<RecipientContact>, StoreError>;
}

/// In-memory directory for tests and standalone deployments.
#[derive(Default)]
pub struct MemoryDirectory {
    contacts: RwLock<HashMap<DbId, RecipientContact>>,
}

impl MemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert or replace a contact record.
    pub async fn upsert(&self, contact: RecipientContact) {
        self.contacts.write().await.insert(contact.user_id, contact);
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn contact(&self, user_id: DbId) -> Result<Option<RecipientContact>, StoreError> {
        Ok(self.contacts.read().await.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_falls_back_to_phone() {
        let contact = RecipientContact {
            user_id: 1,
            phone: Some("+237650000001".to_string()),
            ..Default::default()
        };
        assert_eq!(contact.destination(Channel::Whatsapp), Some("+237650000001"));
        assert_eq!(contact.destination(Channel::Sms), Some("+237650000001"));
        assert_eq!(contact.destination(Channel::Email), None);
    }

    #[test]
    fn in_app_always_resolves() {
        let contact = RecipientContact::default();
        assert!(contact.destination(Channel::InApp).is_some());
    }
}
