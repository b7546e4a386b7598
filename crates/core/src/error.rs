use crate::types::DbId;

/// Domain-level error type shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No channel available for recipient {recipient_id}")]
    NoChannelAvailable { recipient_id: DbId },

    #[error("Internal error: {0}")]
    Internal(String),
}
