//! In-app feed delivery backed by a `tokio::sync::broadcast` channel.
//!
//! Publishing to the feed cannot fail at the provider level: the message
//! is handed to the in-process hub and every connected session receives
//! it. A hub with no subscribers still counts as delivered, since the
//! message is waiting in the recipient's feed when they next connect.

use chrono::{DateTime, Utc};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use educafric_core::types::DbId;
use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::adapter::ChannelAdapter;
use crate::directory::RecipientContact;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// One message published to a recipient's in-app feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppMessage {
    /// Recipient the message is addressed to.
    pub user_id: DbId,
    /// Feed title.
    pub title: Option<String>,
    /// Message body.
    pub body: String,
    /// When the message was published (UTC).
    pub timestamp: DateTime<Utc>,
}

/// Publishes notifications to the in-process feed hub.
///
/// Shared via `Arc<InAppAdapter>`; session handlers call
/// [`subscribe`](InAppAdapter::subscribe) and filter by `user_id`.
pub struct InAppAdapter {
    sender: broadcast::Sender<InAppMessage>,
}

impl InAppAdapter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the feed. Each subscriber independently receives every
    /// published message.
    pub fn subscribe(&self) -> broadcast::Receiver<InAppMessage> {
        self.sender.subscribe()
    }
}

impl Default for InAppAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for InAppAdapter {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome {
        let message = InAppMessage {
            user_id: contact.user_id,
            title: content.subject.clone(),
            body: content.body.clone(),
            timestamp: Utc::now(),
        };
        // send only errors when no receiver exists, which is fine here.
        let _ = self.sender.send(message);
        tracing::debug!(user_id = contact.user_id, "In-app message published");
        DeliveryOutcome::delivered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let adapter = InAppAdapter::new();
        let mut feed = adapter.subscribe();
        let contact = RecipientContact { user_id: 42, ..Default::default() };
        let content = RenderedContent {
            subject: Some("Nouvelle note".into()),
            body: "Une note vient d'être publiée.".into(),
        };

        let outcome = adapter.send(&contact, &content).await;
        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));

        let message = feed.recv().await.unwrap();
        assert_eq!(message.user_id, 42);
        assert_eq!(message.body, content.body);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_still_delivered() {
        let adapter = InAppAdapter::new();
        let contact = RecipientContact { user_id: 7, ..Default::default() };
        let content = RenderedContent { subject: None, body: "hello".into() };
        let outcome = adapter.send(&contact, &content).await;
        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));
    }
}
