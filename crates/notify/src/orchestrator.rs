//! The delivery orchestrator: request validation, per-recipient fan-out,
//! idempotent reservation, dispatch, retry, and escalation.
//!
//! Submission is asynchronous. [`DeliveryOrchestrator::submit`] plans the
//! fan-out, reserves every task, spawns dispatch per recipient, and
//! returns the planned task handles immediately; callers observe final
//! outcomes through [`DeliveryOrchestrator::delivery_status`] and the
//! delivery log. Tests use [`DeliveryOrchestrator::submit_and_wait`] to
//! await all dispatch before asserting.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use educafric_core::channel::{sort_by_urgency, ALL_CHANNELS};
use educafric_core::task::{DeliveryLogEntry, DeliveryTask, TaskStatus};
use educafric_core::types::DbId;
use educafric_core::{
    task_id, Channel, CoreError, DeliveryOutcome, Locale, NotificationRequest, RenderedContent,
    TemplateCatalog,
};

use crate::adapter::AdapterRegistry;
use crate::config::NotifyConfig;
use crate::directory::{RecipientContact, RecipientDirectory};
use crate::error::NotifyError;
use crate::escalation::EscalationPolicy;
use crate::preference::PreferenceResolver;
use crate::store::{DeliveryLogStore, TaskStore};

// ---------------------------------------------------------------------------
// Submission views
// ---------------------------------------------------------------------------

/// Handle to one planned (or pre-existing) delivery task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub channel: Channel,
    /// Status at planning time; dispatch may already have advanced it.
    pub status: TaskStatus,
}

/// Per-recipient outcome of the fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientSubmission {
    pub recipient_id: DbId,
    /// Tasks planned for this recipient, one per resolved channel.
    pub tasks: Vec<TaskHandle>,
    /// Set when the recipient was skipped entirely (unknown recipient, no
    /// reachable channel, render failure). Other recipients proceed.
    pub skipped: Option<String>,
}

/// Result of one submission across all recipients.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub event_id: String,
    pub recipients: Vec<RecipientSubmission>,
}

impl SubmissionResult {
    /// All task ids across recipients, for assertions and logs.
    pub fn task_ids(&self) -> Vec<&str> {
        self.recipients
            .iter()
            .flat_map(|r| r.tasks.iter().map(|t| t.task_id.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Dispatch planning
// ---------------------------------------------------------------------------

/// Template inputs carried through dispatch so an escalation hop can
/// render content for its fallback channel.
#[derive(Clone)]
struct RenderContext {
    template_key: String,
    payload: BTreeMap<String, String>,
    locale: Locale,
}

/// Everything needed to dispatch one recipient's newly reserved tasks.
struct DispatchUnit {
    contact: RecipientContact,
    /// Ordered dispatch: each channel awaited to a terminal state before
    /// the next starts (high/critical priorities).
    ordered: bool,
    tasks: Vec<DeliveryTask>,
    ctx: RenderContext,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Coordinates the whole delivery pipeline behind trait seams, so tests
/// and single-node deployments run it against in-memory implementations.
#[derive(Clone)]
pub struct DeliveryOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: NotifyConfig,
    templates: TemplateCatalog,
    store: Arc<dyn TaskStore>,
    log: Arc<dyn DeliveryLogStore>,
    directory: Arc<dyn RecipientDirectory>,
    resolver: PreferenceResolver,
    escalation: EscalationPolicy,
    adapters: AdapterRegistry,
    /// Per-channel in-flight bound on provider calls.
    limits: HashMap<Channel, Arc<Semaphore>>,
}

impl DeliveryOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NotifyConfig,
        templates: TemplateCatalog,
        store: Arc<dyn TaskStore>,
        log: Arc<dyn DeliveryLogStore>,
        directory: Arc<dyn RecipientDirectory>,
        resolver: PreferenceResolver,
        escalation: EscalationPolicy,
        adapters: AdapterRegistry,
    ) -> Self {
        let limits = ALL_CHANNELS
            .iter()
            .map(|&c| (c, Arc::new(Semaphore::new(config.channel_concurrency))))
            .collect();
        Self {
            inner: Arc::new(Inner {
                config,
                templates,
                store,
                log,
                directory,
                resolver,
                escalation,
                adapters,
                limits,
            }),
        }
    }

    /// Plan the fan-out, reserve every task, and spawn dispatch. Returns
    /// as soon as planning completes; delivery continues in the
    /// background.
    pub async fn submit(&self, request: NotificationRequest) -> Result<SubmissionResult, NotifyError> {
        let (result, units) = self.inner.plan(&request).await?;
        for unit in units {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.dispatch_recipient(unit).await });
        }
        Ok(result)
    }

    /// Like [`submit`](Self::submit), but awaits every dispatched task to
    /// a terminal state before returning.
    pub async fn submit_and_wait(
        &self,
        request: NotificationRequest,
    ) -> Result<SubmissionResult, NotifyError> {
        let (result, units) = self.inner.plan(&request).await?;
        join_all(units.into_iter().map(|unit| self.inner.dispatch_recipient(unit))).await;
        Ok(result)
    }

    /// Current task states for an event, optionally narrowed to one
    /// recipient. Backs the support "was this sent?" view.
    pub async fn delivery_status(
        &self,
        event_id: &str,
        recipient_id: Option<DbId>,
    ) -> Result<Vec<DeliveryTask>, NotifyError> {
        Ok(self.inner.store.list_for_event(event_id, recipient_id).await?)
    }

    /// Audit-log entries for an event's tasks, oldest first.
    pub async fn event_log(&self, event_id: &str) -> Result<Vec<DeliveryLogEntry>, NotifyError> {
        Ok(self.inner.log.entries_for_event(event_id).await?)
    }

    /// Best-effort cancellation of still-pending tasks. Tasks already in
    /// flight complete normally; the count of cancelled tasks is returned.
    pub async fn cancel_event(&self, event_id: &str) -> Result<u64, NotifyError> {
        let before = self.inner.store.list_for_event(event_id, None).await?;
        let cancelled = self.inner.store.cancel_pending(event_id).await?;
        for task in before.iter().filter(|t| t.status == TaskStatus::Pending) {
            if let Ok(Some(now_cancelled)) = self.inner.store.get(&task.task_id).await {
                if now_cancelled.status == TaskStatus::Cancelled {
                    self.inner
                        .append_log(DeliveryLogEntry::new(task.task_id.clone(), task.attempt_count, "cancelled"))
                        .await;
                }
            }
        }
        tracing::info!(event_id, cancelled, "Cancelled pending delivery tasks");
        Ok(cancelled)
    }
}

impl Inner {
    // -- planning ----------------------------------------------------------

    async fn plan(
        &self,
        request: &NotificationRequest,
    ) -> Result<(SubmissionResult, Vec<DispatchUnit>), NotifyError> {
        request.validate()?;
        // An unknown template fails the whole submit before any task
        // exists; per-recipient render problems are handled below.
        self.templates.check_key(&request.template_key)?;

        tracing::info!(
            event_id = %request.event_id,
            category = %request.category,
            priority = %request.priority,
            recipients = request.recipient_ids.len(),
            "Notification submitted"
        );

        let expires_at = Utc::now()
            + ChronoDuration::from_std(self.config.dedup_window)
                .unwrap_or_else(|_| ChronoDuration::hours(24));

        let mut recipients = Vec::new();
        let mut units = Vec::new();
        for recipient_id in request.unique_recipients() {
            match self.plan_recipient(request, recipient_id, expires_at).await {
                Ok((submission, unit)) => {
                    recipients.push(submission);
                    units.extend(unit);
                }
                // Storage failures abort the submit; everything else is a
                // per-recipient skip and the fan-out continues.
                Err(NotifyError::Store(e)) => return Err(NotifyError::Store(e)),
                Err(e) => {
                    tracing::warn!(
                        event_id = %request.event_id,
                        recipient_id,
                        error = %e,
                        "Recipient skipped"
                    );
                    recipients.push(RecipientSubmission {
                        recipient_id,
                        tasks: Vec::new(),
                        skipped: Some(e.to_string()),
                    });
                }
            }
        }
        let result = SubmissionResult { event_id: request.event_id.clone(), recipients };
        Ok((result, units))
    }

    async fn plan_recipient(
        &self,
        request: &NotificationRequest,
        recipient_id: DbId,
        expires_at: educafric_core::types::Timestamp,
    ) -> Result<(RecipientSubmission, Option<DispatchUnit>), NotifyError> {
        let contact = self
            .directory
            .contact(recipient_id)
            .await?
            .ok_or(NotifyError::Core(CoreError::NotFound {
                entity: "recipient",
                id: recipient_id,
            }))?;

        let mut channels = self.resolver.resolve(&contact, request).await?;
        if request.priority.is_ordered() {
            sort_by_urgency(&mut channels);
        }

        // Render every channel before reserving anything, so a render
        // failure leaves zero tasks behind for this recipient.
        let mut rendered: Vec<(Channel, RenderedContent)> = Vec::with_capacity(channels.len());
        for &channel in &channels {
            let content = self.templates.render(
                &request.template_key,
                contact.locale,
                channel,
                &request.payload,
            )?;
            rendered.push((channel, content));
        }

        let now = Utc::now();
        let mut handles = Vec::with_capacity(rendered.len());
        let mut to_dispatch = Vec::new();
        for (channel, content) in rendered {
            let task = DeliveryTask {
                task_id: task_id(&request.event_id, recipient_id, channel),
                event_id: request.event_id.clone(),
                recipient_id,
                channel,
                category: request.category,
                priority: request.priority,
                status: TaskStatus::Pending,
                attempt_count: 0,
                rendered_subject: content.subject,
                rendered_body: content.body,
                escalated_from: None,
                last_attempt_at: None,
                next_retry_at: None,
                expires_at,
                created_at: now,
            };
            let reservation = self.store.reserve(task).await?;
            handles.push(TaskHandle {
                task_id: reservation.task.task_id.clone(),
                channel,
                status: reservation.task.status,
            });
            if reservation.is_new {
                to_dispatch.push(reservation.task);
            } else {
                tracing::debug!(
                    task_id = %reservation.task.task_id,
                    status = %reservation.task.status,
                    "Duplicate submission observed existing task"
                );
            }
        }

        let locale = contact.locale;
        let unit = (!to_dispatch.is_empty()).then(|| DispatchUnit {
            contact,
            ordered: request.priority.is_ordered(),
            tasks: to_dispatch,
            ctx: RenderContext {
                template_key: request.template_key.clone(),
                payload: request.payload.clone(),
                locale,
            },
        });
        Ok((
            RecipientSubmission { recipient_id, tasks: handles, skipped: None },
            unit,
        ))
    }

    // -- dispatch ----------------------------------------------------------

    async fn dispatch_recipient(&self, unit: DispatchUnit) {
        if unit.ordered {
            for task in &unit.tasks {
                self.run_with_escalation(task, &unit.contact, &unit.ctx).await;
            }
        } else {
            join_all(
                unit.tasks
                    .iter()
                    .map(|task| self.run_with_escalation(task, &unit.contact, &unit.ctx)),
            )
            .await;
        }
    }

    /// Run one task to a terminal state, then consult the escalation
    /// policy if it failed.
    async fn run_with_escalation(
        &self,
        task: &DeliveryTask,
        contact: &RecipientContact,
        ctx: &RenderContext,
    ) {
        let final_status = self.run_task(task, contact).await;
        if final_status != TaskStatus::Failed {
            return;
        }
        let mut failed = task.clone();
        failed.status = TaskStatus::Failed;
        let Some(fallback) = self.escalation.fallback_for(&failed) else {
            return;
        };
        self.escalate(&failed, fallback, contact, ctx).await;
    }

    async fn escalate(
        &self,
        origin: &DeliveryTask,
        fallback: Channel,
        contact: &RecipientContact,
        ctx: &RenderContext,
    ) {
        let content = match self
            .templates
            .render(&ctx.template_key, ctx.locale, fallback, &ctx.payload)
        {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    task_id = %origin.task_id,
                    fallback = %fallback,
                    error = %e,
                    "Escalation render failed"
                );
                return;
            }
        };

        let escalation_task = DeliveryTask {
            task_id: task_id(&origin.event_id, origin.recipient_id, fallback),
            event_id: origin.event_id.clone(),
            recipient_id: origin.recipient_id,
            channel: fallback,
            category: origin.category,
            priority: origin.priority,
            status: TaskStatus::Pending,
            attempt_count: 0,
            rendered_subject: content.subject,
            rendered_body: content.body,
            escalated_from: Some(origin.task_id.clone()),
            last_attempt_at: None,
            next_retry_at: None,
            expires_at: origin.expires_at,
            created_at: Utc::now(),
        };

        let reservation = match self.store.reserve(escalation_task).await {
            Ok(reservation) => reservation,
            Err(e) => {
                tracing::warn!(task_id = %origin.task_id, error = %e, "Escalation reserve failed");
                return;
            }
        };

        self.set_status(&origin.task_id, TaskStatus::Escalated).await;
        self.append_log(
            DeliveryLogEntry::new(origin.task_id.clone(), origin.attempt_count, "escalated")
                .with_detail(format!("fallback to {fallback}")),
        )
        .await;
        tracing::info!(
            task_id = %origin.task_id,
            fallback = %fallback,
            "Task escalated to fallback channel"
        );

        // The fallback channel may already carry its own task from the
        // original fan-out; in that case the existing delivery covers it.
        if reservation.is_new {
            Box::pin(self.run_task(&reservation.task, contact)).await;
        }
    }

    /// Drive one task through its attempt loop, racing the priority's
    /// end-to-end deadline. Returns the terminal status.
    async fn run_task(&self, task: &DeliveryTask, contact: &RecipientContact) -> TaskStatus {
        // A bulk cancel may have landed between reservation and dispatch.
        if let Ok(Some(current)) = self.store.get(&task.task_id).await {
            if current.status == TaskStatus::Cancelled {
                return TaskStatus::Cancelled;
            }
        }
        self.set_status(&task.task_id, TaskStatus::InFlight).await;

        let deadline = self.config.deadline(task.priority);
        match tokio::time::timeout(deadline, self.attempt_loop(task, contact)).await {
            Ok(status) => status,
            Err(_) => {
                // `task` is the planning-time snapshot; re-read so the
                // audit row carries the attempts actually made.
                let attempts = match self.store.get(&task.task_id).await {
                    Ok(Some(current)) => current.attempt_count,
                    _ => task.attempt_count,
                };
                self.set_status(&task.task_id, TaskStatus::Expired).await;
                self.append_log(
                    DeliveryLogEntry::new(task.task_id.clone(), attempts, "expired")
                        .with_detail("task deadline elapsed"),
                )
                .await;
                tracing::warn!(task_id = %task.task_id, "Task expired at its deadline");
                TaskStatus::Expired
            }
        }
    }

    async fn attempt_loop(&self, task: &DeliveryTask, contact: &RecipientContact) -> TaskStatus {
        let max_attempts = self.config.retry.max_attempts(task.priority);
        let content = RenderedContent {
            subject: task.rendered_subject.clone(),
            body: task.rendered_body.clone(),
        };
        let adapter = self.adapters.get(task.channel);

        for attempt in 1..=max_attempts {
            let (outcome, latency_ms) = match &adapter {
                Some(adapter) => {
                    let _permit = self.permit(task.channel).await;
                    let started = Instant::now();
                    let outcome = match tokio::time::timeout(
                        self.config.adapter_timeout,
                        adapter.send(contact, &content),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => DeliveryOutcome::retryable("timeout"),
                    };
                    (outcome, started.elapsed().as_millis() as i64)
                }
                None => (DeliveryOutcome::permanent("channel_unconfigured"), 0),
            };

            match outcome {
                DeliveryOutcome::Delivered { provider_ref } => {
                    self.record_attempt(&task.task_id, attempt, None).await;
                    let mut entry = DeliveryLogEntry::new(task.task_id.clone(), attempt, "success")
                        .with_latency_ms(latency_ms);
                    if let Some(provider_ref) = provider_ref {
                        entry = entry.with_detail(provider_ref);
                    }
                    self.append_log(entry).await;
                    self.set_status(&task.task_id, TaskStatus::Delivered).await;
                    tracing::info!(
                        task_id = %task.task_id,
                        channel = %task.channel,
                        attempt,
                        "Delivered"
                    );
                    return TaskStatus::Delivered;
                }
                DeliveryOutcome::Permanent { reason } => {
                    self.record_attempt(&task.task_id, attempt, None).await;
                    self.append_log(
                        DeliveryLogEntry::new(task.task_id.clone(), attempt, "permanent")
                            .with_detail(reason.clone())
                            .with_latency_ms(latency_ms),
                    )
                    .await;
                    self.set_status(&task.task_id, TaskStatus::Failed).await;
                    tracing::warn!(
                        task_id = %task.task_id,
                        channel = %task.channel,
                        attempt,
                        reason,
                        "Delivery failed permanently"
                    );
                    return TaskStatus::Failed;
                }
                DeliveryOutcome::Retryable { reason } => {
                    self.append_log(
                        DeliveryLogEntry::new(task.task_id.clone(), attempt, "retryable")
                            .with_detail(reason.clone())
                            .with_latency_ms(latency_ms),
                    )
                    .await;
                    if attempt < max_attempts {
                        let delay = self.config.retry.backoff_delay(attempt);
                        self.record_attempt(
                            &task.task_id,
                            attempt,
                            ChronoDuration::from_std(delay)
                                .ok()
                                .map(|d| Utc::now() + d),
                        )
                        .await;
                        tracing::debug!(
                            task_id = %task.task_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            reason,
                            "Retrying after backoff"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        self.record_attempt(&task.task_id, attempt, None).await;
                        self.set_status(&task.task_id, TaskStatus::Failed).await;
                        tracing::warn!(
                            task_id = %task.task_id,
                            channel = %task.channel,
                            attempts = max_attempts,
                            "Retries exhausted"
                        );
                        return TaskStatus::Failed;
                    }
                }
            }
        }
        TaskStatus::Failed
    }

    // -- store helpers -----------------------------------------------------

    async fn permit(&self, channel: Channel) -> Option<tokio::sync::OwnedSemaphorePermit> {
        let semaphore = Arc::clone(self.limits.get(&channel)?);
        semaphore.acquire_owned().await.ok()
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) {
        if let Err(e) = self.store.set_status(task_id, status).await {
            tracing::warn!(task_id, status = %status, error = %e, "Status update failed");
        }
    }

    async fn record_attempt(
        &self,
        task_id: &str,
        attempt: u32,
        next_retry_at: Option<educafric_core::types::Timestamp>,
    ) {
        if let Err(e) = self.store.record_attempt(task_id, attempt, next_retry_at).await {
            tracing::warn!(task_id, error = %e, "Attempt bookkeeping failed");
        }
    }

    async fn append_log(&self, entry: DeliveryLogEntry) {
        if let Err(e) = self.log.append(entry).await {
            tracing::warn!(error = %e, "Delivery log append failed");
        }
    }
}
