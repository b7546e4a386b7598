//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod contact_repo;
pub mod delivery_log_repo;
pub mod delivery_task_repo;
pub mod preference_repo;

pub use contact_repo::ContactRepo;
pub use delivery_log_repo::DeliveryLogRepo;
pub use delivery_task_repo::DeliveryTaskRepo;
pub use preference_repo::PreferenceRepo;
