//! User store
//!
//! Registration, login lookup and profile management.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::{hash_password, validate_strength, verify_password};
use crate::domain::{AccountType, RegisteredUser};
use crate::error::AppError;

/// Columns a user may be looked up by. An allow-list rather than a free-form
/// column name keeps query construction static.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Email,
    Username,
    Nickname,
}

impl UserField {
    fn column(self) -> &'static str {
        match self {
            UserField::Email => "email",
            UserField::Username => "username",
            UserField::Nickname => "nickname",
        }
    }
}

/// Input for registration, already trimmed by the API layer.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Profile record returned to the owning user.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub username: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

/// Allow-listed profile updates. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.nickname.is_none()
            && self.username.is_none()
            && self.email.is_none()
    }
}

/// Store for user rows
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check whether a user exists with the given value in the given column.
    pub async fn check_exists(&self, field: UserField, value: &str) -> Result<bool, AppError> {
        let query = format!("SELECT EXISTS (SELECT 1 FROM users WHERE {} = $1)", field.column());
        let exists: bool = sqlx::query_scalar(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Register a new user. Validates the full input set and returns the new
    /// user id.
    pub async fn register(&self, new_user: &NewUser) -> Result<i64, AppError> {
        self.validate_registration(new_user).await?;

        let password_hash = hash_password(&new_user.password);

        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users
                (first_name, last_name, nickname, email, username, password_hash, account_type)
            VALUES ($1, $2, $3, $4, $5, $6, 'standard')
            RETURNING id
            "#,
        )
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.nickname)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn validate_registration(&self, new_user: &NewUser) -> Result<(), AppError> {
        validate_name(&new_user.first_name, "First name")?;
        validate_name(&new_user.last_name, "Last name")?;

        if new_user.nickname.len() < 3 || new_user.nickname.len() > 100 {
            return Err(AppError::InvalidRequest(
                "Nickname must be between 3-100 characters".to_string(),
            ));
        }
        if self.check_exists(UserField::Nickname, &new_user.nickname).await? {
            return Err(AppError::InvalidRequest("Nickname already taken".to_string()));
        }

        validate_email(&new_user.email)?;
        if self.check_exists(UserField::Email, &new_user.email).await? {
            return Err(AppError::InvalidRequest("Email already registered".to_string()));
        }

        if new_user.username.len() < 4 || new_user.username.len() > 100 {
            return Err(AppError::InvalidRequest(
                "Username must be between 4-100 characters".to_string(),
            ));
        }
        if !new_user
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::InvalidRequest(
                "Username can only contain letters, numbers and underscores".to_string(),
            ));
        }
        if self.check_exists(UserField::Username, &new_user.username).await? {
            return Err(AppError::InvalidRequest("Username already taken".to_string()));
        }

        validate_strength(&new_user.password)
            .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

        Ok(())
    }

    /// Look up a user by username or email and verify the password. Emails
    /// are stored lowercased, so the email match is case-insensitive.
    pub async fn login(&self, login: &str, password: &str) -> Result<RegisteredUser, AppError> {
        let row: Option<(i64, String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, first_name, last_name, email, account_type, password_hash
            FROM users
            WHERE username = $1 OR email = $2
            "#,
        )
        .bind(login)
        .bind(login.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        let (id, first_name, last_name, email, account_type, password_hash) =
            row.ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        Ok(RegisteredUser {
            id,
            first_name,
            last_name,
            email,
            account_type: AccountType::from_db(&account_type),
        })
    }

    /// Fetch the full profile for a user.
    pub async fn get_profile(&self, user_id: i64) -> Result<Profile, AppError> {
        let row: Option<(i64, String, String, String, String, String, String, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT id, first_name, last_name, nickname, email, username, account_type,
                       created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let (id, first_name, last_name, nickname, email, username, account_type, created_at) =
            row.ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        Ok(Profile {
            id,
            first_name,
            last_name,
            nickname,
            email,
            username,
            account_type: AccountType::from_db(&account_type),
            created_at,
        })
    }

    /// Apply an allow-listed profile update. Uniqueness of nickname, username
    /// and email is re-checked against other users.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        if update.is_empty() {
            return Err(AppError::InvalidRequest("No fields to update".to_string()));
        }

        if let Some(ref nickname) = update.nickname {
            self.check_unique_for_other(user_id, UserField::Nickname, nickname, "Nickname already taken")
                .await?;
        }
        if let Some(ref username) = update.username {
            self.check_unique_for_other(user_id, UserField::Username, username, "Username already taken")
                .await?;
        }
        if let Some(ref email) = update.email {
            validate_email(email)?;
            self.check_unique_for_other(user_id, UserField::Email, email, "Email already registered")
                .await?;
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                nickname   = COALESCE($4, nickname),
                username   = COALESCE($5, username),
                email      = COALESCE($6, email)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.nickname)
        .bind(&update.username)
        .bind(&update.email)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        Ok(())
    }

    async fn check_unique_for_other(
        &self,
        user_id: i64,
        field: UserField,
        value: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM users WHERE {} = $1 AND id != $2)",
            field.column()
        );
        let taken: bool = sqlx::query_scalar(&query)
            .bind(value)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        if taken {
            return Err(AppError::InvalidRequest(message.to_string()));
        }

        Ok(())
    }

    /// Verify a user's current password.
    pub async fn verify_current_password(
        &self,
        user_id: i64,
        password: &str,
    ) -> Result<bool, AppError> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let stored = stored.ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
        Ok(verify_password(password, &stored))
    }

    /// Set a new password for a user by id.
    pub async fn set_password(&self, user_id: i64, password: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(password))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Set a new password for a user by email (reset flow).
    pub async fn set_password_by_email(&self, email: &str, password: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
            .bind(email)
            .bind(hash_password(password))
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn validate_name(value: &str, label: &str) -> Result<(), AppError> {
    if value.len() < 2 || value.len() > 100 {
        return Err(AppError::InvalidRequest(format!(
            "{} must be between 2-100 characters",
            label
        )));
    }
    Ok(())
}

/// Minimal structural email check: local part, '@', dotted domain.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::InvalidRequest("Invalid email format".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@nodot").is_err());
        assert!(validate_email("alice@.com").is_err());
        assert!(validate_email("alice @example.com").is_err());
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("Al", "First name").is_ok());
        assert!(validate_name("A", "First name").is_err());
        assert!(validate_name(&"x".repeat(101), "First name").is_err());
    }

    #[test]
    fn test_profile_update_is_empty() {
        assert!(ProfileUpdate::default().is_empty());

        let update = ProfileUpdate {
            nickname: Some("new_nick".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_user_field_columns() {
        assert_eq!(UserField::Email.column(), "email");
        assert_eq!(UserField::Username.column(), "username");
        assert_eq!(UserField::Nickname.column(), "nickname");
    }
}
