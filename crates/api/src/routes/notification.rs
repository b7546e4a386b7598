//! Route definitions for the `/notifications` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// POST   /                                     -> submit
/// GET    /{event_id}/status                    -> delivery_status
/// GET    /{event_id}/log                       -> delivery_log
/// DELETE /{event_id}                           -> cancel
///
/// GET    /preferences/{user_id}                -> list_preferences
/// GET    /preferences/{user_id}/{category}     -> get_preference
/// PUT    /preferences/{user_id}/{category}     -> update_preference
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        // Submission and delivery views
        .route("/", post(notification::submit))
        .route("/{event_id}/status", get(notification::delivery_status))
        .route("/{event_id}/log", get(notification::delivery_log))
        .route("/{event_id}", delete(notification::cancel))
        // Preferences endpoints
        .route("/preferences/{user_id}", get(notification::list_preferences))
        .route(
            "/preferences/{user_id}/{category}",
            get(notification::get_preference).put(notification::update_preference),
        )
}
