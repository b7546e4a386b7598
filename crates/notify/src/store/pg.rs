//! Postgres-backed implementations of the delivery seams, delegating SQL
//! to the `educafric-db` repositories. Rows store enum fields as their
//! stable wire names; parsing back into core enums happens here, and a
//! value that no longer parses surfaces as [`StoreError::Corrupt`] rather
//! than a panic.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use educafric_core::task::{DeliveryLogEntry, DeliveryTask, TaskStatus};
use educafric_core::types::{DbId, Timestamp};
use educafric_core::{Channel, EventCategory, Locale, Priority};
use educafric_db::models::delivery::{DeliveryLogRow, DeliveryTaskRow};
use educafric_db::repositories::{ContactRepo, DeliveryLogRepo, DeliveryTaskRepo, PreferenceRepo};
use educafric_db::DbPool;

use crate::directory::{RecipientContact, RecipientDirectory};
use crate::preference::{PreferenceSource, StoredPreference};

use super::{DeliveryLogStore, Reservation, StoreError, TaskStore};

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn parse<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("{field} holds unknown value '{value}'")))
}

fn task_from_row(row: DeliveryTaskRow) -> Result<DeliveryTask, StoreError> {
    Ok(DeliveryTask {
        channel: parse::<Channel>("channel", &row.channel)?,
        category: parse::<EventCategory>("category", &row.category)?,
        priority: parse::<Priority>("priority", &row.priority)?,
        status: parse::<TaskStatus>("status", &row.status)?,
        task_id: row.task_id,
        event_id: row.event_id,
        recipient_id: row.recipient_id,
        attempt_count: row.attempt_count.max(0) as u32,
        rendered_subject: row.rendered_subject,
        rendered_body: row.rendered_body,
        escalated_from: row.escalated_from,
        last_attempt_at: row.last_attempt_at,
        next_retry_at: row.next_retry_at,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

fn log_from_row(row: DeliveryLogRow) -> DeliveryLogEntry {
    DeliveryLogEntry {
        task_id: row.task_id,
        attempt_number: row.attempt_number.max(0) as u32,
        outcome: row.outcome,
        detail: row.detail,
        latency_ms: row.latency_ms,
        created_at: row.created_at,
    }
}

// ---------------------------------------------------------------------------
// Task store
// ---------------------------------------------------------------------------

/// [`TaskStore`] and [`DeliveryLogStore`] over the `delivery_tasks` and
/// `delivery_log` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn reserve(&self, task: DeliveryTask) -> Result<Reservation, StoreError> {
        let inserted = DeliveryTaskRepo::try_insert(
            &self.pool,
            &task.task_id,
            &task.event_id,
            task.recipient_id,
            task.channel.as_str(),
            task.category.as_str(),
            task.priority.as_str(),
            task.rendered_subject.as_deref(),
            &task.rendered_body,
            task.escalated_from.as_deref(),
            task.expires_at,
        )
        .await?;
        if let Some(row) = inserted {
            return Ok(Reservation { is_new: true, task: task_from_row(row)? });
        }

        // The id exists. If its dedup window has elapsed and it is
        // terminal, reset it to a fresh pending task; otherwise the live
        // task wins and the caller treats this as a replay.
        let refreshed = DeliveryTaskRepo::refresh_expired(
            &self.pool,
            &task.task_id,
            task.rendered_subject.as_deref(),
            &task.rendered_body,
            task.expires_at,
        )
        .await?;
        if let Some(row) = refreshed {
            return Ok(Reservation { is_new: true, task: task_from_row(row)? });
        }

        let existing = DeliveryTaskRepo::get(&self.pool, &task.task_id)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!("task {} vanished during reservation", task.task_id))
            })?;
        Ok(Reservation { is_new: false, task: task_from_row(existing)? })
    }

    async fn get(&self, task_id: &str) -> Result<Option<DeliveryTask>, StoreError> {
        DeliveryTaskRepo::get(&self.pool, task_id)
            .await?
            .map(task_from_row)
            .transpose()
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        DeliveryTaskRepo::set_status(&self.pool, task_id, status.as_str()).await?;
        Ok(())
    }

    async fn record_attempt(
        &self,
        task_id: &str,
        attempt_count: u32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        DeliveryTaskRepo::record_attempt(&self.pool, task_id, attempt_count as i32, next_retry_at)
            .await?;
        Ok(())
    }

    async fn list_for_event(
        &self,
        event_id: &str,
        recipient_id: Option<DbId>,
    ) -> Result<Vec<DeliveryTask>, StoreError> {
        DeliveryTaskRepo::list_for_event(&self.pool, event_id, recipient_id)
            .await?
            .into_iter()
            .map(task_from_row)
            .collect()
    }

    async fn cancel_pending(&self, event_id: &str) -> Result<u64, StoreError> {
        Ok(DeliveryTaskRepo::cancel_pending(&self.pool, event_id).await?)
    }

    async fn archive_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(DeliveryTaskRepo::archive_older_than(&self.pool, cutoff).await?)
    }
}

#[async_trait]
impl DeliveryLogStore for PgStore {
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), StoreError> {
        DeliveryLogRepo::append(
            &self.pool,
            &entry.task_id,
            entry.attempt_number as i32,
            &entry.outcome,
            entry.detail.as_deref(),
            entry.latency_ms,
        )
        .await?;
        Ok(())
    }

    async fn entries_for_task(&self, task_id: &str) -> Result<Vec<DeliveryLogEntry>, StoreError> {
        Ok(DeliveryLogRepo::list_for_task(&self.pool, task_id)
            .await?
            .into_iter()
            .map(log_from_row)
            .collect())
    }

    async fn entries_for_event(
        &self,
        event_id: &str,
    ) -> Result<Vec<DeliveryLogEntry>, StoreError> {
        Ok(DeliveryLogRepo::list_for_event(&self.pool, event_id)
            .await?
            .into_iter()
            .map(log_from_row)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Directory and preferences
// ---------------------------------------------------------------------------

/// [`RecipientDirectory`] over the `recipient_contacts` table.
#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PgDirectory {
    async fn contact(&self, user_id: DbId) -> Result<Option<RecipientContact>, StoreError> {
        Ok(ContactRepo::get(&self.pool, user_id).await?.map(|row| RecipientContact {
            user_id: row.user_id,
            phone: row.phone,
            whatsapp_number: row.whatsapp_number,
            email: row.email,
            push_token: row.push_token,
            locale: Locale::parse_or_default(&row.preferred_locale),
        }))
    }
}

/// [`PreferenceSource`] over the `channel_preferences` table.
#[derive(Clone)]
pub struct PgPreferences {
    pool: DbPool,
}

impl PgPreferences {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceSource for PgPreferences {
    async fn preference(
        &self,
        user_id: DbId,
        category: EventCategory,
    ) -> Result<Option<StoredPreference>, StoreError> {
        let row = match PreferenceRepo::get(&self.pool, user_id, category.as_str()).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        let names: Vec<String> = serde_json::from_value(row.channels).map_err(|e| {
            StoreError::Corrupt(format!("channels for user {user_id} is not a string array: {e}"))
        })?;
        // Unknown channel names are skipped rather than rejected so an old
        // preference row cannot block delivery after a channel is retired.
        let channels = names.iter().filter_map(|n| n.parse().ok()).collect();
        Ok(Some(StoredPreference { channels, is_enabled: row.is_enabled }))
    }
}

// ---------------------------------------------------------------------------
// Retention sweep
// ---------------------------------------------------------------------------

/// Periodic archiver flagging terminal tasks older than the retention
/// window. Runs until the cancellation token fires.
pub async fn run_archiver(
    store: PgStore,
    retention: std::time::Duration,
    interval: std::time::Duration,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Archiver stopping");
                return;
            }
            _ = ticker.tick() => {}
        }
        let cutoff = Utc::now()
            - Duration::from_std(retention).unwrap_or_else(|_| Duration::days(90));
        match store.archive_older_than(cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(archived = n, "Archived terminal delivery tasks"),
            Err(e) => tracing::warn!(error = %e, "Archive sweep failed"),
        }
    }
}
