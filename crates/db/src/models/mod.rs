//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for writes where the API accepts partial input

pub mod contact;
pub mod delivery;
pub mod preference;
