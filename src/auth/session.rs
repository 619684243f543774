//! Token-backed sessions
//!
//! Opaque random tokens handed to clients; only the sha256 of a token is
//! stored. One table holds both registered-user and guest sessions,
//! distinguished by `kind`.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::domain::{AccountType, GuestAccess, RegisteredUser};
use crate::error::AppError;

const TOKEN_LEN: usize = 32;

/// Generate a fresh opaque session token (64 hex characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token for storage and lookup.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Store for session rows
#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a session for a registered user; returns the raw token.
    pub async fn create_user_session(
        &self,
        user_id: i64,
        ttl_minutes: i64,
    ) -> Result<String, AppError> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, kind, user_id, expires_at)
            VALUES ($1, 'user', $2, $3)
            "#,
        )
        .bind(token_hash(&token))
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Create a session for a validated guest; expiry matches the guest
    /// access window, never extends it.
    pub async fn create_guest_session(&self, guest: &GuestAccess) -> Result<String, AppError> {
        let token = generate_token();

        sqlx::query(
            r#"
            INSERT INTO sessions
                (token_hash, kind, guest_first_name, guest_last_name, guest_email,
                 bill_code, expires_at)
            VALUES ($1, 'guest', $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token_hash(&token))
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.email)
        .bind(&guest.bill_code)
        .bind(guest.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Resolve a token to a registered user, if the session is still live.
    pub async fn find_user(&self, token: &str) -> Result<Option<RegisteredUser>, AppError> {
        let row: Option<(i64, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.account_type
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.token_hash = $1 AND s.kind = 'user' AND s.expires_at > NOW()
            "#,
        )
        .bind(token_hash(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, first_name, last_name, email, account_type)| RegisteredUser {
                id,
                first_name,
                last_name,
                email,
                account_type: AccountType::from_db(&account_type),
            },
        ))
    }

    /// Resolve a token to a guest identity, if the session is still live.
    pub async fn find_guest(&self, token: &str) -> Result<Option<GuestAccess>, AppError> {
        let row: Option<(String, String, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT guest_first_name, guest_last_name, guest_email, bill_code, expires_at
            FROM sessions
            WHERE token_hash = $1 AND kind = 'guest' AND expires_at > NOW()
            "#,
        )
        .bind(token_hash(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(first_name, last_name, email, bill_code, expires_at)| GuestAccess {
                first_name,
                last_name,
                email,
                bill_code,
                expires_at,
            },
        ))
    }

    /// Revoke a session (logout). Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash(token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_token_hash_is_deterministic() {
        let token = generate_token();
        assert_eq!(token_hash(&token), token_hash(&token));
        assert_ne!(token_hash(&token), token);
    }
}
