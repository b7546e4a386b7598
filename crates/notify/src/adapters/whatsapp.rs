//! WhatsApp delivery via the Meta Graph API.
//!
//! Posts JSON text messages to
//! `https://graph.facebook.com/v18.0/{phone_number_id}/messages` with a
//! bearer token. Rate limiting (HTTP 429) and server errors retry; other
//! client errors (invalid number, unregistered recipient, expired token)
//! are permanent.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::adapter::ChannelAdapter;
use crate::directory::RecipientContact;

/// Graph API version pinned for message sends.
const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// HTTP request timeout for a single send.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the WhatsApp Business adapter.
#[derive(Debug, Clone)]
pub struct WhatsappConfig {
    /// Business phone number id issued by Meta.
    pub phone_number_id: String,
    /// Long-lived access token.
    pub access_token: String,
}

impl WhatsappConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `WHATSAPP_PHONE_NUMBER_ID` is not set, signalling
    /// that WhatsApp delivery is not configured and should be skipped.
    ///
    /// | Variable                   | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `WHATSAPP_PHONE_NUMBER_ID` | yes      | —       |
    /// | `WHATSAPP_ACCESS_TOKEN`    | yes      | —       |
    pub fn from_env() -> Option<Self> {
        let phone_number_id = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok()?;
        let access_token = std::env::var("WHATSAPP_ACCESS_TOKEN").ok()?;
        Some(Self { phone_number_id, access_token })
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SendResponse {
    messages: Option<Vec<SentMessage>>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Sends WhatsApp text messages through the Graph API.
pub struct WhatsappAdapter {
    config: WhatsappConfig,
    client: reqwest::Client,
}

impl WhatsappAdapter {
    pub fn new(config: WhatsappConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!("{GRAPH_API_BASE}/{}/messages", self.config.phone_number_id)
    }
}

#[async_trait]
impl ChannelAdapter for WhatsappAdapter {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome {
        let Some(number) = contact.destination(Channel::Whatsapp) else {
            return DeliveryOutcome::permanent("recipient has no WhatsApp number");
        };

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": number,
            "type": "text",
            "text": { "body": content.body },
        });

        let response = match self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "WhatsApp request failed");
                return DeliveryOutcome::retryable(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if status.is_success() {
            let provider_ref = response
                .json::<SendResponse>()
                .await
                .ok()
                .and_then(|b| b.messages)
                .and_then(|m| m.into_iter().next())
                .map(|m| m.id);
            tracing::info!(to = number, "WhatsApp message sent");
            return DeliveryOutcome::Delivered { provider_ref };
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return DeliveryOutcome::retryable(format!("Graph API returned HTTP {status}"));
        }
        let detail = response.text().await.unwrap_or_default();
        DeliveryOutcome::permanent(format!("Graph API returned HTTP {status}: {detail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_phone_number_id() {
        std::env::remove_var("WHATSAPP_PHONE_NUMBER_ID");
        assert!(WhatsappConfig::from_env().is_none());
    }

    #[test]
    fn endpoint_embeds_phone_number_id() {
        let adapter = WhatsappAdapter::new(WhatsappConfig {
            phone_number_id: "1055123".into(),
            access_token: "token".into(),
        });
        assert_eq!(
            adapter.endpoint(),
            "https://graph.facebook.com/v18.0/1055123/messages"
        );
    }

    #[tokio::test]
    async fn plain_phone_backs_whatsapp_destination() {
        // A contact with only a phone number is still reachable: the
        // directory falls back to it for WhatsApp.
        let contact = RecipientContact {
            user_id: 1,
            phone: Some("+237650000001".into()),
            ..Default::default()
        };
        assert_eq!(
            contact.destination(Channel::Whatsapp),
            Some("+237650000001")
        );
    }
}
