//! Email delivery via SMTP.
//!
//! Wraps the `lettre` async SMTP transport. Transport-level failures
//! (connection refused, TLS, timeouts) retry; address parse failures are
//! permanent since no retry will fix a malformed address.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::adapter::ChannelAdapter;
use crate::directory::RecipientContact;

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@educafric.com";

/// Subject used when a template renders body-only content.
const DEFAULT_SUBJECT: &str = "[EDUCAFRIC] Notification";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the SMTP email adapter.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | —                       |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@educafric.com` |
    /// | `SMTP_USER`     | no       | —                       |
    /// | `SMTP_PASSWORD` | no       | —                       |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Sends plain-text notification emails via SMTP.
pub struct EmailAdapter {
    config: EmailConfig,
}

impl EmailAdapter {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, content: &RenderedContent) -> Result<Message, String> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| format!("bad sender address: {e}"))?;
        let to = to.parse().map_err(|e| format!("bad recipient address: {e}"))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(content.subject.as_deref().unwrap_or(DEFAULT_SUBJECT))
            .header(ContentType::TEXT_PLAIN)
            .body(content.body.clone())
            .map_err(|e| format!("message build failed: {e}"))
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome {
        let Some(address) = contact.destination(Channel::Email) else {
            return DeliveryOutcome::permanent("recipient has no email address");
        };

        let email = match self.build_message(address, content) {
            Ok(email) => email,
            Err(reason) => return DeliveryOutcome::permanent(reason),
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
            &self.config.smtp_host,
        ) {
            Ok(builder) => {
                let builder = builder.port(self.config.smtp_port);
                let builder = match (&self.config.smtp_user, &self.config.smtp_password) {
                    (Some(user), Some(pass)) => {
                        builder.credentials(Credentials::new(user.clone(), pass.clone()))
                    }
                    _ => builder,
                };
                builder.build()
            }
            Err(e) => return DeliveryOutcome::retryable(format!("SMTP transport error: {e}")),
        };

        match transport.send(email).await {
            Ok(_) => {
                tracing::info!(to = address, "Notification email sent");
                DeliveryOutcome::delivered()
            }
            Err(e) if e.is_permanent() => {
                DeliveryOutcome::permanent(format!("SMTP rejected the message: {e}"))
            }
            Err(e) => DeliveryOutcome::retryable(format!("SMTP send failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> EmailAdapter {
        EmailAdapter::new(EmailConfig {
            smtp_host: "smtp.example.cm".into(),
            smtp_port: DEFAULT_SMTP_PORT,
            from_address: DEFAULT_FROM_ADDRESS.into(),
            smtp_user: None,
            smtp_password: None,
        })
    }

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn build_message_uses_rendered_subject() {
        let content = RenderedContent {
            subject: Some("Nouvelle note".into()),
            body: "Votre enfant a reçu une note.".into(),
        };
        assert!(adapter().build_message("parent@example.cm", &content).is_ok());
    }

    #[test]
    fn build_message_rejects_malformed_recipient() {
        let content = RenderedContent { subject: None, body: "hello".into() };
        let err = adapter().build_message("not-an-address", &content).unwrap_err();
        assert!(err.contains("bad recipient address"));
    }
}
