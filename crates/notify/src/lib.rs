//! Multi-channel notification delivery for the EDUCAFRIC platform.
//!
//! This crate turns a [`NotificationRequest`](educafric_core::NotificationRequest)
//! into reliably delivered messages across push, SMS, WhatsApp, email, and
//! in-app channels. The building blocks:
//!
//! - [`DeliveryOrchestrator`] — the sole entry point: expands a request
//!   into per-(recipient, channel) delivery tasks, sequences and retries
//!   them, and tracks every outcome.
//! - [`PreferenceResolver`] — which channels apply per recipient and
//!   category, including category-required overrides.
//! - [`adapter`] / [`adapters`] — the uniform send contract over concrete
//!   providers (Vonage SMS, WhatsApp Business, SMTP, FCM, in-app feed).
//! - [`store`] — the idempotency/dedup store and delivery log behind
//!   async traits, with in-memory and PostgreSQL implementations.
//! - [`EscalationPolicy`] — single-hop fallback to a higher-reliability
//!   channel for exhausted critical deliveries.

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod directory;
pub mod error;
pub mod escalation;
pub mod orchestrator;
pub mod preference;
pub mod store;

pub use adapter::{AdapterRegistry, ChannelAdapter};
pub use config::NotifyConfig;
pub use directory::{MemoryDirectory, RecipientContact, RecipientDirectory};
pub use error::NotifyError;
pub use escalation::EscalationPolicy;
pub use orchestrator::{DeliveryOrchestrator, RecipientSubmission, SubmissionResult, TaskHandle};
pub use preference::{
    AccessPolicy, AllowAll, MemoryPreferences, PreferenceResolver, PreferenceSource,
    StoredPreference,
};
pub use store::pg::{PgDirectory, PgPreferences, PgStore};
pub use store::{memory::MemoryStore, DeliveryLogStore, Reservation, StoreError, TaskStore};
