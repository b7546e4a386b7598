//! Repository for the append-only `delivery_log` table.

use sqlx::PgPool;

use educafric_core::types::DbId;

use crate::models::delivery::DeliveryLogRow;

/// Column list for `delivery_log` queries.
const COLUMNS: &str = "id, task_id, attempt_number, outcome, detail, latency_ms, created_at";

/// Append and query operations for the delivery audit trail. Rows are
/// never updated or deleted.
pub struct DeliveryLogRepo;

impl DeliveryLogRepo {
    /// Append one log entry, returning the generated id.
    pub async fn append(
        pool: &PgPool,
        task_id: &str,
        attempt_number: i32,
        outcome: &str,
        detail: Option<&str>,
        latency_ms: Option<i64>,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO delivery_log (task_id, attempt_number, outcome, detail, latency_ms) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(task_id)
        .bind(attempt_number)
        .bind(outcome)
        .bind(detail)
        .bind(latency_ms)
        .fetch_one(pool)
        .await
    }

    /// List entries for a task in attempt order.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: &str,
    ) -> Result<Vec<DeliveryLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM delivery_log \
             WHERE task_id = $1 \
             ORDER BY attempt_number, id"
        );
        sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(task_id)
            .fetch_all(pool)
            .await
    }

    /// List all entries for an event's tasks, oldest first. Backs the
    /// support view answering "did X get notified about Y, and what
    /// happened on each attempt".
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: &str,
    ) -> Result<Vec<DeliveryLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT l.{} FROM delivery_log l \
             JOIN delivery_tasks t ON t.task_id = l.task_id \
             WHERE t.event_id = $1 \
             ORDER BY l.created_at, l.id",
            COLUMNS.replace(", ", ", l.")
        );
        sqlx::query_as::<_, DeliveryLogRow>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }
}
