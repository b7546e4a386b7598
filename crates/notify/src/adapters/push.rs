//! Mobile push delivery via Firebase Cloud Messaging.
//!
//! Posts JSON notification payloads to the FCM HTTP endpoint with a
//! server key. An unregistered or invalid token is permanent (the app was
//! uninstalled or the token rotated); FCM availability problems retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::adapter::ChannelAdapter;
use crate::directory::RecipientContact;

/// FCM send endpoint.
const FCM_API_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// HTTP request timeout for a single send.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the FCM push adapter.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// FCM server key.
    pub server_key: String,
}

impl PushConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `FCM_SERVER_KEY` is not set, signalling that push
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable         | Required | Default |
    /// |------------------|----------|---------|
    /// | `FCM_SERVER_KEY` | yes      | —       |
    pub fn from_env() -> Option<Self> {
        let server_key = std::env::var("FCM_SERVER_KEY").ok()?;
        Some(Self { server_key })
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FcmResponse {
    success: i64,
    results: Option<Vec<FcmResult>>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Sends mobile push notifications through FCM.
pub struct PushAdapter {
    config: PushConfig,
    client: reqwest::Client,
}

impl PushAdapter {
    pub fn new(config: PushConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome {
        let Some(token) = contact.destination(Channel::Push) else {
            return DeliveryOutcome::permanent("recipient has no push token");
        };

        let payload = serde_json::json!({
            "to": token,
            "notification": {
                "title": content.subject.as_deref().unwrap_or("EDUCAFRIC"),
                "body": content.body,
            },
        });

        let response = match self
            .client
            .post(FCM_API_URL)
            .header("Authorization", format!("key={}", self.config.server_key))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Push request failed");
                return DeliveryOutcome::retryable(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return DeliveryOutcome::retryable(format!("FCM returned HTTP {status}"));
        }
        if !status.is_success() {
            return DeliveryOutcome::permanent(format!("FCM returned HTTP {status}"));
        }

        let body: FcmResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::retryable(format!("unreadable FCM response: {e}")),
        };
        if body.success > 0 {
            let provider_ref = body
                .results
                .and_then(|r| r.into_iter().next())
                .and_then(|r| r.message_id);
            tracing::info!(user_id = contact.user_id, "Push notification sent");
            return DeliveryOutcome::Delivered { provider_ref };
        }
        let error = body
            .results
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.error)
            .unwrap_or_else(|| "unknown".to_string());
        match error.as_str() {
            // Token-level failures cannot succeed on retry.
            "NotRegistered" | "InvalidRegistration" | "MismatchSenderId" => {
                DeliveryOutcome::permanent(format!("push token rejected: {error}"))
            }
            _ => DeliveryOutcome::retryable(format!("FCM reported {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_server_key() {
        std::env::remove_var("FCM_SERVER_KEY");
        assert!(PushConfig::from_env().is_none());
    }

    #[test]
    fn response_parses_fcm_shape() {
        let body = r#"{"multicast_id":123,"success":1,"failure":0,
            "results":[{"message_id":"0:1700000000"}]}"#;
        let parsed: FcmResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.success, 1);
    }

    #[tokio::test]
    async fn missing_token_is_permanent() {
        let adapter = PushAdapter::new(PushConfig { server_key: "k".into() });
        let contact = RecipientContact { user_id: 1, ..Default::default() };
        let outcome = adapter
            .send(&contact, &RenderedContent { subject: None, body: "hi".into() })
            .await;
        assert!(matches!(outcome, DeliveryOutcome::Permanent { .. }));
    }
}
