//! Domain types and pure logic for the EDUCAFRIC notification dispatch
//! subsystem.
//!
//! This crate has no internal dependencies and no I/O. It provides:
//!
//! - [`channel`] — delivery channels, body limits, urgency ordering.
//! - [`event`] — event categories and message priorities.
//! - [`request`] — the [`NotificationRequest`] submission envelope.
//! - [`task`] — delivery tasks, status machine, outcome taxonomy, and
//!   the deterministic idempotency key.
//! - [`retry`] — exponential backoff policy with jitter.
//! - [`template`] — the bilingual template catalogue and renderer.

pub mod channel;
pub mod error;
pub mod event;
pub mod locale;
pub mod request;
pub mod retry;
pub mod task;
pub mod template;
pub mod types;

pub use channel::Channel;
pub use error::CoreError;
pub use event::{EventCategory, Priority};
pub use locale::Locale;
pub use request::NotificationRequest;
pub use task::{task_id, DeliveryOutcome, DeliveryTask, TaskStatus};
pub use template::{RenderedContent, TemplateCatalog, TemplateError};
