//! Guest access store
//!
//! Time-limited bill access for non-registered participants, keyed by
//! (email, bill code).

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::domain::GuestAccess;
use crate::error::AppError;

/// Store for guest access grants
#[derive(Debug, Clone)]
pub struct GuestStore {
    pool: PgPool,
}

impl GuestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a guest access grant for a bill code. Re-requesting access
    /// refreshes the expiry window.
    pub async fn create_access(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        bill_code: &str,
        ttl_hours: i64,
    ) -> Result<GuestAccess, AppError> {
        let expires_at = Utc::now() + Duration::hours(ttl_hours);

        sqlx::query(
            r#"
            INSERT INTO guest_access (first_name, last_name, email, bill_code, access_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email, bill_code) DO UPDATE
                SET first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    access_expires_at = EXCLUDED.access_expires_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(bill_code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(GuestAccess {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            bill_code: bill_code.to_string(),
            expires_at,
        })
    }

    /// Look up an unexpired access grant for (email, bill code). Rows with a
    /// NULL expiry predate the expiry column and get a fresh window.
    pub async fn find_valid_access(
        &self,
        email: &str,
        bill_code: &str,
        ttl_hours: i64,
    ) -> Result<Option<GuestAccess>, AppError> {
        let row: Option<(String, String, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT first_name, last_name, access_expires_at
            FROM guest_access
            WHERE email = $1 AND bill_code = $2
              AND (access_expires_at IS NULL OR access_expires_at > NOW())
            "#,
        )
        .bind(email)
        .bind(bill_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(first_name, last_name, expires_at)| GuestAccess {
            first_name,
            last_name,
            email: email.to_string(),
            bill_code: bill_code.to_string(),
            expires_at: expires_at.unwrap_or_else(|| Utc::now() + Duration::hours(ttl_hours)),
        }))
    }
}
