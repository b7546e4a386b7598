//! Repository for the `delivery_tasks` table.

use sqlx::PgPool;

use educafric_core::types::{DbId, Timestamp};

use crate::models::delivery::DeliveryTaskRow;

/// Column list for `delivery_tasks` queries.
const COLUMNS: &str = "task_id, event_id, recipient_id, channel, category, priority, status, \
    attempt_count, rendered_subject, rendered_body, escalated_from, last_attempt_at, \
    next_retry_at, expires_at, archived_at, created_at, updated_at";

/// Provides read/write operations for delivery tasks.
///
/// `try_insert` is the atomic check-and-set behind idempotent reservation:
/// the unique `task_id` primary key plus `ON CONFLICT DO NOTHING` ensures
/// that two concurrent submissions of the same (event, recipient, channel)
/// resolve to a single row.
pub struct DeliveryTaskRepo;

impl DeliveryTaskRepo {
    /// Insert a fresh pending task, returning the row if it was inserted
    /// or `None` if a task with the same id already exists.
    #[allow(clippy::too_many_arguments)]
    pub async fn try_insert(
        pool: &PgPool,
        task_id: &str,
        event_id: &str,
        recipient_id: DbId,
        channel: &str,
        category: &str,
        priority: &str,
        rendered_subject: Option<&str>,
        rendered_body: &str,
        escalated_from: Option<&str>,
        expires_at: Timestamp,
    ) -> Result<Option<DeliveryTaskRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO delivery_tasks \
                (task_id, event_id, recipient_id, channel, category, priority, \
                 rendered_subject, rendered_body, escalated_from, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (task_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeliveryTaskRow>(&query)
            .bind(task_id)
            .bind(event_id)
            .bind(recipient_id)
            .bind(channel)
            .bind(category)
            .bind(priority)
            .bind(rendered_subject)
            .bind(rendered_body)
            .bind(escalated_from)
            .bind(expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a task by id.
    pub async fn get(pool: &PgPool, task_id: &str) -> Result<Option<DeliveryTaskRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM delivery_tasks WHERE task_id = $1");
        sqlx::query_as::<_, DeliveryTaskRow>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// Reset a terminal task whose dedup window has elapsed back to a fresh
    /// pending state, so a true replay after completion is treated as a new
    /// send. Returns the refreshed row, or `None` if the task is still
    /// inside its window (the race loser observes the live task instead).
    pub async fn refresh_expired(
        pool: &PgPool,
        task_id: &str,
        rendered_subject: Option<&str>,
        rendered_body: &str,
        expires_at: Timestamp,
    ) -> Result<Option<DeliveryTaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE delivery_tasks \
             SET status = 'pending', attempt_count = 0, rendered_subject = $2, \
                 rendered_body = $3, last_attempt_at = NULL, next_retry_at = NULL, \
                 expires_at = $4, archived_at = NULL, updated_at = NOW() \
             WHERE task_id = $1 \
               AND expires_at < NOW() \
               AND status NOT IN ('pending', 'in_flight') \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeliveryTaskRow>(&query)
            .bind(task_id)
            .bind(rendered_subject)
            .bind(rendered_body)
            .bind(expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Update a task's status. Returns `true` if a row was updated.
    pub async fn set_status(
        pool: &PgPool,
        task_id: &str,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE delivery_tasks SET status = $2, updated_at = NOW() WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record an attempt: bump the attempt count and the attempt/retry
    /// timestamps.
    pub async fn record_attempt(
        pool: &PgPool,
        task_id: &str,
        attempt_count: i32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE delivery_tasks \
             SET attempt_count = $2, last_attempt_at = NOW(), next_retry_at = $3, \
                 updated_at = NOW() \
             WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(attempt_count)
        .bind(next_retry_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List tasks for an event, optionally narrowed to one recipient,
    /// oldest first.
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: &str,
        recipient_id: Option<DbId>,
    ) -> Result<Vec<DeliveryTaskRow>, sqlx::Error> {
        let filter = if recipient_id.is_some() {
            "AND recipient_id = $2"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM delivery_tasks \
             WHERE event_id = $1 {filter} \
             ORDER BY created_at, task_id"
        );
        let mut q = sqlx::query_as::<_, DeliveryTaskRow>(&query).bind(event_id);
        if let Some(recipient_id) = recipient_id {
            q = q.bind(recipient_id);
        }
        q.fetch_all(pool).await
    }

    /// Cancel all still-pending tasks for an event. Returns the number of
    /// tasks cancelled. Tasks already `in_flight` are untouched: the cancel
    /// is best-effort and races dispatch.
    pub async fn cancel_pending(pool: &PgPool, event_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE delivery_tasks \
             SET status = 'cancelled', updated_at = NOW() \
             WHERE event_id = $1 AND status = 'pending'",
        )
        .bind(event_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Flag terminal tasks older than `cutoff` as archived. Rows are kept
    /// for audit; archiving only excludes them from support queries.
    pub async fn archive_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE delivery_tasks \
             SET archived_at = NOW(), updated_at = NOW() \
             WHERE archived_at IS NULL \
               AND created_at < $1 \
               AND status NOT IN ('pending', 'in_flight')",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
