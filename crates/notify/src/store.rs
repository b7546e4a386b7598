//! Storage seams: the idempotency/dedup task store and the append-only
//! delivery log.
//!
//! [`TaskStore::reserve`] is the single synchronization point preventing
//! two concurrent submissions of the same event from double-sending: an
//! atomic check-and-set keyed by the deterministic task id. Both
//! implementations honour the dedup window — a terminal task whose window
//! has elapsed is replaced by a fresh reservation, while a live task wins
//! over any replay.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use educafric_core::task::{DeliveryLogEntry, DeliveryTask, TaskStatus};
use educafric_core::types::{DbId, Timestamp};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database-level failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

/// Result of [`TaskStore::reserve`].
#[derive(Debug, Clone)]
pub struct Reservation {
    /// `true` when this call created the task (the caller owns dispatch);
    /// `false` when an existing live task was found (idempotent replay —
    /// report its status, send nothing).
    pub is_new: bool,
    /// The reserved or pre-existing task.
    pub task: DeliveryTask,
}

/// Durable record of delivery tasks keyed by idempotency id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Atomically create the task, or return the existing one if a live
    /// reservation with the same id exists. A terminal task past its
    /// dedup window is replaced by the fresh task.
    async fn reserve(&self, task: DeliveryTask) -> Result<Reservation, StoreError>;

    /// Fetch a task by id.
    async fn get(&self, task_id: &str) -> Result<Option<DeliveryTask>, StoreError>;

    /// Transition a task's status.
    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError>;

    /// Record an attempt: attempt count and the next scheduled retry.
    async fn record_attempt(
        &self,
        task_id: &str,
        attempt_count: u32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<(), StoreError>;

    /// List tasks for an event, optionally narrowed to one recipient.
    async fn list_for_event(
        &self,
        event_id: &str,
        recipient_id: Option<DbId>,
    ) -> Result<Vec<DeliveryTask>, StoreError>;

    /// Cancel still-pending tasks for an event (best effort, races
    /// dispatch). Returns how many were cancelled.
    async fn cancel_pending(&self, event_id: &str) -> Result<u64, StoreError>;

    /// Flag terminal tasks older than `cutoff` as archived. Audit data is
    /// never deleted.
    async fn archive_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

/// Append-only audit trail of every attempt and state transition. Safe
/// for concurrent writers.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), StoreError>;

    /// Entries for one task in attempt order.
    async fn entries_for_task(&self, task_id: &str) -> Result<Vec<DeliveryLogEntry>, StoreError>;

    /// Entries for all of an event's tasks, oldest first.
    async fn entries_for_event(&self, event_id: &str)
        -> Result<Vec<DeliveryLogEntry>, StoreError>;
}
