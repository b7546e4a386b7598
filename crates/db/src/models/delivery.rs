//! Delivery task and delivery log entity models.

use serde::Serialize;
use sqlx::FromRow;

use educafric_core::types::{DbId, Timestamp};

/// A row from the `delivery_tasks` table.
///
/// Enum-typed fields (`channel`, `category`, `priority`, `status`) are
/// stored as their stable wire names; the notify crate parses them back
/// into the core enums at the store boundary.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryTaskRow {
    pub task_id: String,
    pub event_id: String,
    pub recipient_id: DbId,
    pub channel: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub attempt_count: i32,
    pub rendered_subject: Option<String>,
    pub rendered_body: String,
    pub escalated_from: Option<String>,
    pub last_attempt_at: Option<Timestamp>,
    pub next_retry_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the append-only `delivery_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryLogRow {
    pub id: DbId,
    pub task_id: String,
    pub attempt_number: i32,
    pub outcome: String,
    pub detail: Option<String>,
    pub latency_ms: Option<i64>,
    pub created_at: Timestamp,
}
