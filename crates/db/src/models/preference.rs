//! Channel preference entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use educafric_core::types::{DbId, Timestamp};

/// A row from the `channel_preferences` table.
///
/// `channels` is an ordered JSON array of channel wire names; order is the
/// recipient's preferred attempt order within a category.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChannelPreferenceRow {
    pub id: DbId,
    pub user_id: DbId,
    pub category: String,
    pub channels: serde_json::Value,
    pub is_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for upserting a channel preference.
#[derive(Debug, Deserialize)]
pub struct UpdatePreference {
    /// Ordered channel wire names. `None` keeps the stored list.
    pub channels: Option<Vec<String>>,
    pub is_enabled: Option<bool>,
}
