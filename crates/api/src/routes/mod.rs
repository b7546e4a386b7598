pub mod health;
pub mod notification;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /notifications                                   submit (POST)
/// /notifications/{event_id}/status                 delivery status (GET)
/// /notifications/{event_id}/log                    delivery log (GET)
/// /notifications/{event_id}                        cancel (DELETE)
/// /notifications/preferences/{user_id}             list preferences (GET)
/// /notifications/preferences/{user_id}/{category}  get, update (GET/PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/notifications", notification::router())
}
