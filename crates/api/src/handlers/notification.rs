//! Handlers for the `/notifications` resource.
//!
//! Session identification and role checks happen in the platform's
//! gateway ahead of this service; handlers trust the ids they are given.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use educafric_core::task::{DeliveryLogEntry, DeliveryTask};
use educafric_core::types::DbId;
use educafric_core::{Channel, CoreError, EventCategory, NotificationRequest, Priority};
use educafric_db::models::preference::{ChannelPreferenceRow, UpdatePreference};
use educafric_db::repositories::PreferenceRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `POST /notifications`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitNotification {
    /// Caller-supplied logical event id; replays with the same id inside
    /// the dedup window are idempotent.
    #[validate(length(min = 1, max = 128))]
    pub event_id: String,
    pub category: EventCategory,
    pub priority: Priority,
    #[validate(length(min = 1, max = 500))]
    pub recipient_ids: Vec<DbId>,
    #[validate(length(min = 1, max = 64))]
    pub template_key: String,
    /// Template interpolation values.
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
    /// Optional narrowing of the channels to attempt.
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Query parameters for `GET /notifications/{event_id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Narrow the view to one recipient.
    pub recipient_id: Option<DbId>,
}

/// Body of the cancellation response.
#[derive(Debug, Serialize)]
pub struct CancelSummary {
    pub cancelled: u64,
}

// ---------------------------------------------------------------------------
// Submission and status
// ---------------------------------------------------------------------------

/// POST /api/v1/notifications
///
/// Plan and dispatch a notification. Returns 202 Accepted with the
/// planned per-recipient task handles; delivery continues in the
/// background and is observable through the status and log endpoints.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitNotification>,
) -> AppResult<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut request = NotificationRequest::new(
        body.event_id,
        body.category,
        body.priority,
        body.template_key,
    )
    .with_recipients(body.recipient_ids)
    .with_channels(body.channels);
    request.payload = body.payload;

    let result = state.orchestrator.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: result })))
}

/// GET /api/v1/notifications/{event_id}/status
///
/// Current task states for an event, optionally narrowed to one
/// recipient. Backs the support "was this parent notified?" view.
pub async fn delivery_status(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(params): Query<StatusQuery>,
) -> AppResult<Json<DataResponse<Vec<DeliveryTask>>>> {
    let tasks = state
        .orchestrator
        .delivery_status(&event_id, params.recipient_id)
        .await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/notifications/{event_id}/log
///
/// Append-only delivery-log entries for an event's tasks, oldest first.
pub async fn delivery_log(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<DeliveryLogEntry>>>> {
    let entries = state.orchestrator.event_log(&event_id).await?;
    Ok(Json(DataResponse { data: entries }))
}

/// DELETE /api/v1/notifications/{event_id}
///
/// Best-effort cancellation: still-pending tasks are cancelled, tasks
/// already in flight complete normally.
pub async fn cancel(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<Json<DataResponse<CancelSummary>>> {
    let cancelled = state.orchestrator.cancel_event(&event_id).await?;
    Ok(Json(DataResponse { data: CancelSummary { cancelled } }))
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

fn parse_category(raw: &str) -> AppResult<EventCategory> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown event category '{raw}'")))
}

/// GET /api/v1/notifications/preferences/{user_id}
///
/// All stored channel preferences for a user, ordered by category.
pub async fn list_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ChannelPreferenceRow>>>> {
    let preferences = PreferenceRepo::list_for_user(&state.pool, user_id).await?;
    Ok(Json(DataResponse { data: preferences }))
}

/// GET /api/v1/notifications/preferences/{user_id}/{category}
///
/// The stored preference for one category, or 404 when the user has
/// never customised it (clients then show the platform default).
pub async fn get_preference(
    State(state): State<AppState>,
    Path((user_id, category)): Path<(DbId, String)>,
) -> AppResult<Json<DataResponse<ChannelPreferenceRow>>> {
    let category = parse_category(&category)?;
    let preference = PreferenceRepo::get(&state.pool, user_id, category.as_str())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "preference", id: user_id }))?;
    Ok(Json(DataResponse { data: preference }))
}

/// PUT /api/v1/notifications/preferences/{user_id}/{category}
///
/// Upsert a preference. Missing body fields keep their stored values;
/// the per-user unique constraint serializes concurrent writes.
pub async fn update_preference(
    State(state): State<AppState>,
    Path((user_id, category)): Path<(DbId, String)>,
    Json(body): Json<UpdatePreference>,
) -> AppResult<Json<DataResponse<ChannelPreferenceRow>>> {
    let category = parse_category(&category)?;

    if let Some(channels) = &body.channels {
        for name in channels {
            name.parse::<Channel>()
                .map_err(|_| AppError::BadRequest(format!("Unknown channel '{name}'")))?;
        }
    }

    let existing = PreferenceRepo::get(&state.pool, user_id, category.as_str()).await?;
    let channels = match body.channels {
        Some(channels) => serde_json::json!(channels),
        None => existing
            .as_ref()
            .map(|p| p.channels.clone())
            .unwrap_or_else(|| serde_json::json!([])),
    };
    let is_enabled = body
        .is_enabled
        .or(existing.as_ref().map(|p| p.is_enabled))
        .unwrap_or(true);

    let updated =
        PreferenceRepo::upsert(&state.pool, user_id, category.as_str(), &channels, is_enabled)
            .await?;
    Ok(Json(DataResponse { data: updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_use_the_data_envelope() {
        let body = serde_json::to_value(DataResponse { data: CancelSummary { cancelled: 3 } })
            .unwrap();
        assert_eq!(body, serde_json::json!({ "data": { "cancelled": 3 } }));
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(parse_category("academic").is_ok());
        assert!(parse_category("no-such").is_err());
    }
}
