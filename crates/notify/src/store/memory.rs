//! In-memory store used by unit and orchestrator tests, and by
//! deployments that run without Postgres (single-node dev mode). Holds
//! tasks and log entries behind a mutex; the reserve check-and-set is
//! atomic because the whole map is locked for the duration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use educafric_core::task::{DeliveryLogEntry, DeliveryTask, TaskStatus};
use educafric_core::types::{DbId, Timestamp};

use super::{DeliveryLogStore, Reservation, StoreError, TaskStore};

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, DeliveryTask>,
    /// Task ids flagged by [`TaskStore::archive_older_than`]; the tasks
    /// themselves stay in the map so audit queries keep working.
    archived: HashSet<String>,
    log: Vec<DeliveryLogEntry>,
}

/// Mutex-guarded map-backed implementation of both storage seams.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of a task, for assertions.
    pub async fn snapshot(&self, task_id: &str) -> Option<DeliveryTask> {
        self.inner.lock().await.tasks.get(task_id).cloned()
    }

    /// Whether a task has been flagged archived.
    pub async fn is_archived(&self, task_id: &str) -> bool {
        self.inner.lock().await.archived.contains(task_id)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn reserve(&self, task: DeliveryTask) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.tasks.get(&task.task_id) {
            let window_elapsed = existing.expires_at < Utc::now();
            if !(existing.status.is_terminal() && window_elapsed) {
                return Ok(Reservation { is_new: false, task: existing.clone() });
            }
        }
        // A fresh reservation supersedes any archive flag on the old task.
        inner.archived.remove(&task.task_id);
        inner.tasks.insert(task.task_id.clone(), task.clone());
        Ok(Reservation { is_new: true, task })
    }

    async fn get(&self, task_id: &str) -> Result<Option<DeliveryTask>, StoreError> {
        Ok(self.inner.lock().await.tasks.get(task_id).cloned())
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.tasks.get_mut(task_id) {
            task.status = status;
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        task_id: &str,
        attempt_count: u32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.tasks.get_mut(task_id) {
            task.attempt_count = attempt_count;
            task.last_attempt_at = Some(Utc::now());
            task.next_retry_at = next_retry_at;
        }
        Ok(())
    }

    async fn list_for_event(
        &self,
        event_id: &str,
        recipient_id: Option<DbId>,
    ) -> Result<Vec<DeliveryTask>, StoreError> {
        let inner = self.inner.lock().await;
        let mut tasks: Vec<DeliveryTask> = inner
            .tasks
            .values()
            .filter(|t| t.event_id == event_id)
            .filter(|t| recipient_id.map_or(true, |id| t.recipient_id == id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            (a.recipient_id, a.channel.as_str()).cmp(&(b.recipient_id, b.channel.as_str()))
        });
        Ok(tasks)
    }

    async fn cancel_pending(&self, event_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut cancelled = 0;
        for task in inner.tasks.values_mut() {
            if task.event_id == event_id && task.status == TaskStatus::Pending {
                task.status = TaskStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn archive_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let to_flag: Vec<String> = inner
            .tasks
            .values()
            .filter(|t| t.status.is_terminal() && t.created_at < cutoff)
            .map(|t| t.task_id.clone())
            .filter(|id| !inner.archived.contains(id))
            .collect();
        let flagged = to_flag.len() as u64;
        inner.archived.extend(to_flag);
        Ok(flagged)
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryStore {
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), StoreError> {
        self.inner.lock().await.log.push(entry);
        Ok(())
    }

    async fn entries_for_task(&self, task_id: &str) -> Result<Vec<DeliveryLogEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn entries_for_event(
        &self,
        event_id: &str,
    ) -> Result<Vec<DeliveryLogEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| {
                inner
                    .tasks
                    .get(&e.task_id)
                    .map_or(false, |t| t.event_id == event_id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use educafric_core::{task_id, Channel, EventCategory, Priority};

    fn task(event_id: &str, recipient: DbId, channel: Channel, expires_in_secs: i64) -> DeliveryTask {
        let now = Utc::now();
        DeliveryTask {
            task_id: task_id(event_id, recipient, channel),
            event_id: event_id.to_string(),
            recipient_id: recipient,
            channel,
            category: EventCategory::Academic,
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            attempt_count: 0,
            rendered_subject: None,
            rendered_body: "hello".into(),
            escalated_from: None,
            last_attempt_at: None,
            next_retry_at: None,
            expires_at: now + Duration::seconds(expires_in_secs),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn reserve_is_first_writer_wins() {
        let store = MemoryStore::new();
        let first = store.reserve(task("evt-1", 7, Channel::Sms, 3600)).await.unwrap();
        assert!(first.is_new);

        let replay = store.reserve(task("evt-1", 7, Channel::Sms, 3600)).await.unwrap();
        assert!(!replay.is_new);
        assert_eq!(replay.task.task_id, first.task.task_id);
    }

    #[tokio::test]
    async fn terminal_task_past_window_is_replaced() {
        let store = MemoryStore::new();
        let stale = task("evt-2", 7, Channel::Email, -10);
        let id = stale.task_id.clone();
        store.reserve(stale).await.unwrap();
        store.set_status(&id, TaskStatus::Delivered).await.unwrap();

        let renewed = store.reserve(task("evt-2", 7, Channel::Email, 3600)).await.unwrap();
        assert!(renewed.is_new);
        assert_eq!(renewed.task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn live_delivered_task_still_wins_inside_window() {
        let store = MemoryStore::new();
        let live = task("evt-3", 9, Channel::Push, 3600);
        let id = live.task_id.clone();
        store.reserve(live).await.unwrap();
        store.set_status(&id, TaskStatus::Delivered).await.unwrap();

        let replay = store.reserve(task("evt-3", 9, Channel::Push, 3600)).await.unwrap();
        assert!(!replay.is_new);
        assert_eq!(replay.task.status, TaskStatus::Delivered);
    }

    #[tokio::test]
    async fn concurrent_reserves_yield_exactly_one_owner() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.reserve(task("evt-race", 5, Channel::Push, 3600)).await.unwrap()
            }));
        }

        let mut owners = 0;
        for handle in handles {
            let reservation = handle.await.unwrap();
            if reservation.is_new {
                owners += 1;
            }
            assert_eq!(reservation.task.task_id, task_id("evt-race", 5, Channel::Push));
        }
        assert_eq!(owners, 1);
    }

    #[tokio::test]
    async fn archiving_flags_tasks_without_deleting_audit_data() {
        let store = MemoryStore::new();
        let t = task("evt-5", 2, Channel::Push, 3600);
        let id = t.task_id.clone();
        store.reserve(t).await.unwrap();
        store.set_status(&id, TaskStatus::Delivered).await.unwrap();
        store
            .append(DeliveryLogEntry::new(id.clone(), 1, "success"))
            .await
            .unwrap();

        let cutoff = Utc::now() + Duration::seconds(1);
        assert_eq!(store.archive_older_than(cutoff).await.unwrap(), 1);
        assert!(store.is_archived(&id).await);
        // Already-flagged tasks are not counted again.
        assert_eq!(store.archive_older_than(cutoff).await.unwrap(), 0);

        // The task and its audit trail remain queryable.
        assert!(store.get(&id).await.unwrap().is_some());
        assert_eq!(store.entries_for_event("evt-5").await.unwrap().len(), 1);
        assert_eq!(store.list_for_event("evt-5", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_is_append_only_and_queryable_by_event() {
        let store = MemoryStore::new();
        let t = task("evt-4", 3, Channel::Sms, 3600);
        let id = t.task_id.clone();
        store.reserve(t).await.unwrap();

        store
            .append(DeliveryLogEntry::new(id.clone(), 1, "retryable").with_detail("timeout"))
            .await
            .unwrap();
        store
            .append(DeliveryLogEntry::new(id.clone(), 2, "success").with_latency_ms(42))
            .await
            .unwrap();

        let by_task = store.entries_for_task(&id).await.unwrap();
        assert_eq!(by_task.len(), 2);
        assert_eq!(by_task[0].attempt_number, 1);

        let by_event = store.entries_for_event("evt-4").await.unwrap();
        assert_eq!(by_event.len(), 2);
        assert!(store.entries_for_event("evt-other").await.unwrap().is_empty());
    }
}
