//! Password reset store
//!
//! One live reset token per email; issuing a new token replaces the old one.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::error::AppError;

/// Store for password reset tokens
#[derive(Debug, Clone)]
pub struct PasswordStore {
    pool: PgPool,
}

impl PasswordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a reset token for an email, replacing any existing one.
    pub async fn upsert_reset_token(
        &self,
        email: &str,
        token: &str,
        ttl_minutes: i64,
    ) -> Result<(), AppError> {
        let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

        sqlx::query(
            r#"
            INSERT INTO password_resets (email, token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
                SET token = EXCLUDED.token,
                    expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(email)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolve an unexpired token to its email.
    pub async fn find_email_for_token(&self, token: &str) -> Result<Option<String>, AppError> {
        let email: Option<String> = sqlx::query_scalar(
            "SELECT email FROM password_resets WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(email)
    }

    /// Consume a token after a successful reset.
    pub async fn delete_token(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM password_resets WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
