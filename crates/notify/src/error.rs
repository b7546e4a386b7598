use educafric_core::{CoreError, TemplateError};

use crate::store::StoreError;

/// Errors surfaced synchronously by `submit` and the status queries.
///
/// Per-recipient and per-channel failures are *not* errors at this level:
/// they are reported inside the submission result and the delivery log so
/// one bad recipient never aborts the rest of the fan-out.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Request-level validation failure (empty recipients, bad enums).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unknown template key or incomplete payload; rejected before any
    /// delivery task is created.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The task store or delivery log failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
