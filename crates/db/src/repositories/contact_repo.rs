//! Repository for the `recipient_contacts` table.

use sqlx::PgPool;

use educafric_core::types::DbId;

use crate::models::contact::RecipientContactRow;

/// Column list for `recipient_contacts` queries.
const COLUMNS: &str =
    "user_id, phone, whatsapp_number, email, push_token, preferred_locale, updated_at";

/// Read/write operations for recipient contact destinations. The rows are
/// synced from the platform's user store; delivery only reads them.
pub struct ContactRepo;

impl ContactRepo {
    /// Fetch the contact record for a user.
    pub async fn get(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<RecipientContactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM recipient_contacts WHERE user_id = $1");
        sqlx::query_as::<_, RecipientContactRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or refresh a contact record from the platform user store.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        phone: Option<&str>,
        whatsapp_number: Option<&str>,
        email: Option<&str>,
        push_token: Option<&str>,
        preferred_locale: &str,
    ) -> Result<RecipientContactRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO recipient_contacts \
                (user_id, phone, whatsapp_number, email, push_token, preferred_locale) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE \
             SET phone = EXCLUDED.phone, \
                 whatsapp_number = EXCLUDED.whatsapp_number, \
                 email = EXCLUDED.email, \
                 push_token = EXCLUDED.push_token, \
                 preferred_locale = EXCLUDED.preferred_locale, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RecipientContactRow>(&query)
            .bind(user_id)
            .bind(phone)
            .bind(whatsapp_number)
            .bind(email)
            .bind(push_token)
            .bind(preferred_locale)
            .fetch_one(pool)
            .await
    }
}
