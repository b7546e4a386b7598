//! SMS delivery via the Vonage REST API.
//!
//! Posts form-encoded requests to `https://rest.nexmo.com/sms/json`. The
//! API reports per-message status codes inside a 200 response, so outcome
//! classification reads the body: status `"0"` is success, throttling
//! (status `"1"`) retries, and everything else (bad credentials, barred
//! number, invalid destination) is permanent.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::adapter::ChannelAdapter;
use crate::directory::RecipientContact;

/// Vonage SMS endpoint.
const SMS_API_URL: &str = "https://rest.nexmo.com/sms/json";

/// HTTP request timeout for a single send.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Vonage per-message status for throttled sends.
const STATUS_THROTTLED: &str = "1";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the Vonage SMS adapter.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    /// Vonage API key.
    pub api_key: String,
    /// Vonage API secret.
    pub api_secret: String,
    /// Sender id shown to the recipient.
    pub from: String,
}

impl SmsConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `VONAGE_API_KEY` is not set, signalling that SMS
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable            | Required | Default     |
    /// |---------------------|----------|-------------|
    /// | `VONAGE_API_KEY`    | yes      | —           |
    /// | `VONAGE_API_SECRET` | yes      | —           |
    /// | `VONAGE_SMS_FROM`   | no       | `EDUCAFRIC` |
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("VONAGE_API_KEY").ok()?;
        let api_secret = std::env::var("VONAGE_API_SECRET").ok()?;
        Some(Self {
            api_key,
            api_secret,
            from: std::env::var("VONAGE_SMS_FROM").unwrap_or_else(|_| "EDUCAFRIC".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SmsResponse {
    messages: Vec<SmsMessageStatus>,
}

#[derive(Debug, Deserialize)]
struct SmsMessageStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Sends SMS messages through Vonage.
pub struct SmsAdapter {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsAdapter {
    pub fn new(config: SmsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome {
        let Some(phone) = contact.destination(Channel::Sms) else {
            return DeliveryOutcome::permanent("recipient has no phone number");
        };

        let params = [
            ("api_key", self.config.api_key.as_str()),
            ("api_secret", self.config.api_secret.as_str()),
            ("from", self.config.from.as_str()),
            ("to", phone),
            ("text", content.body.as_str()),
        ];

        let response = match self.client.post(SMS_API_URL).form(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "SMS request failed");
                return DeliveryOutcome::retryable(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return DeliveryOutcome::retryable(format!("SMS gateway returned HTTP {status}"));
        }
        if !status.is_success() {
            return DeliveryOutcome::permanent(format!("SMS gateway returned HTTP {status}"));
        }

        let body: SmsResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::retryable(format!("unreadable SMS response: {e}")),
        };
        let Some(message) = body.messages.into_iter().next() else {
            return DeliveryOutcome::retryable("SMS response carried no message status");
        };

        match message.status.as_str() {
            "0" => {
                tracing::info!(to = phone, "SMS sent");
                DeliveryOutcome::Delivered { provider_ref: message.message_id }
            }
            STATUS_THROTTLED => DeliveryOutcome::retryable("SMS gateway throttled the send"),
            code => DeliveryOutcome::permanent(format!(
                "SMS rejected with status {code}: {}",
                message.error_text.unwrap_or_default()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_api_key() {
        std::env::remove_var("VONAGE_API_KEY");
        assert!(SmsConfig::from_env().is_none());
    }

    #[test]
    fn response_parses_vonage_shape() {
        let body = r#"{"message-count":"1","messages":[
            {"to":"237650000001","message-id":"0A0000000123ABCD1",
             "status":"0","remaining-balance":"3.14"}]}"#;
        let parsed: SmsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.messages[0].status, "0");
        assert_eq!(
            parsed.messages[0].message_id.as_deref(),
            Some("0A0000000123ABCD1")
        );
    }

    #[tokio::test]
    async fn missing_phone_is_permanent() {
        let adapter = SmsAdapter::new(SmsConfig {
            api_key: "k".into(),
            api_secret: "s".into(),
            from: "EDUCAFRIC".into(),
        });
        let contact = RecipientContact { user_id: 1, ..Default::default() };
        let outcome = adapter
            .send(&contact, &RenderedContent { subject: None, body: "hi".into() })
            .await;
        assert!(matches!(outcome, DeliveryOutcome::Permanent { .. }));
    }
}
