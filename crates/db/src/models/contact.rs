//! Recipient contact entity model.

use serde::Serialize;
use sqlx::FromRow;

use educafric_core::types::{DbId, Timestamp};

/// A row from the `recipient_contacts` table: the destinations a user can
/// be reached at, one per channel kind, plus their preferred locale.
///
/// The user record itself (name, role, school) is owned by the platform's
/// relational store; this table carries only what delivery needs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecipientContactRow {
    pub user_id: DbId,
    pub phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub email: Option<String>,
    pub push_token: Option<String>,
    pub preferred_locale: String,
    pub updated_at: Timestamp,
}
