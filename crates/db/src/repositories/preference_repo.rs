//! Repository for the `channel_preferences` table.

use sqlx::PgPool;

use educafric_core::types::DbId;

use crate::models::preference::ChannelPreferenceRow;

/// Column list for `channel_preferences` queries.
const COLUMNS: &str = "id, user_id, category, channels, is_enabled, created_at, updated_at";

/// Provides CRUD operations for per-user, per-category channel
/// preferences. Writes are serialized per user by the unique
/// (user_id, category) constraint and single-row upserts.
pub struct PreferenceRepo;

impl PreferenceRepo {
    /// Get the preference for one user and category.
    pub async fn get(
        pool: &PgPool,
        user_id: DbId,
        category: &str,
    ) -> Result<Option<ChannelPreferenceRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM channel_preferences WHERE user_id = $1 AND category = $2");
        sqlx::query_as::<_, ChannelPreferenceRow>(&query)
            .bind(user_id)
            .bind(category)
            .fetch_optional(pool)
            .await
    }

    /// List all preferences for a user ordered by category.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ChannelPreferenceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM channel_preferences \
             WHERE user_id = $1 \
             ORDER BY category"
        );
        sqlx::query_as::<_, ChannelPreferenceRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Insert or update a preference in a single round-trip.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        category: &str,
        channels: &serde_json::Value,
        is_enabled: bool,
    ) -> Result<ChannelPreferenceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO channel_preferences (user_id, category, channels, is_enabled) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, category) DO UPDATE \
             SET channels = EXCLUDED.channels, \
                 is_enabled = EXCLUDED.is_enabled, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChannelPreferenceRow>(&query)
            .bind(user_id)
            .bind(category)
            .bind(channels)
            .bind(is_enabled)
            .fetch_one(pool)
            .await
    }
}
