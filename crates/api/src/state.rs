use std::sync::Arc;

use educafric_notify::DeliveryOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: educafric_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The delivery orchestrator driving all notification dispatch.
    pub orchestrator: DeliveryOrchestrator,
}
