//! Provider integrations, one module per channel.
//!
//! Each adapter owns its provider credentials, loaded from environment
//! variables by a `Config::from_env` that returns `None` when the channel
//! is not configured for this deployment.

pub mod email;
pub mod in_app;
pub mod push;
pub mod sms;
pub mod whatsapp;

pub use email::{EmailAdapter, EmailConfig};
pub use in_app::{InAppAdapter, InAppMessage};
pub use push::{PushAdapter, PushConfig};
pub use sms::{SmsAdapter, SmsConfig};
pub use whatsapp::{WhatsappAdapter, WhatsappConfig};
