//! Password reset and change endpoints

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_token, validate_strength};
use crate::domain::Identity;
use crate::error::AppError;
use crate::store::{PasswordStore, UserStore};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RequestResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RequestResetResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// =========================================================================
// POST /password/request-reset
// =========================================================================

/// Issue a reset token for an email. The response never reveals whether the
/// email is registered.
pub async fn request_reset(
    State(state): State<AppState>,
    Json(request): Json<RequestResetRequest>,
) -> Result<Json<RequestResetResponse>, AppError> {
    let email = request.email.trim().to_lowercase();

    let users = UserStore::new(state.pool.clone());
    if users
        .check_exists(crate::store::users::UserField::Email, &email)
        .await?
    {
        let token = generate_token();

        let passwords = PasswordStore::new(state.pool.clone());
        passwords
            .upsert_reset_token(&email, &token, state.config.reset_token_ttl_minutes)
            .await?;

        let reset_link = format!("{}/reset-password?token={}", state.config.app_base_url, token);
        if let Err(e) = state.mailer.send_password_reset(&email, &reset_link).await {
            tracing::warn!("Failed to send password reset email: {}", e);
        }
    }

    Ok(Json(RequestResetResponse {
        message: "If the email is registered, a reset link has been sent".to_string(),
    }))
}

// =========================================================================
// POST /password/validate-token
// =========================================================================

/// Check whether a reset token is still usable
pub async fn validate_token(
    State(state): State<AppState>,
    Json(request): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    let passwords = PasswordStore::new(state.pool.clone());
    let valid = passwords
        .find_email_for_token(&request.token)
        .await?
        .is_some();

    Ok(Json(ValidateTokenResponse { valid }))
}

// =========================================================================
// POST /password/reset
// =========================================================================

/// Set a new password with a reset token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    if request.password != request.confirm_password {
        return Err(AppError::InvalidRequest("Passwords do not match".to_string()));
    }
    validate_strength(&request.password)
        .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

    let passwords = PasswordStore::new(state.pool.clone());
    let email = passwords
        .find_email_for_token(&request.token)
        .await?
        .ok_or(AppError::InvalidResetToken)?;

    let users = UserStore::new(state.pool.clone());
    users.set_password_by_email(&email, &request.password).await?;

    passwords.delete_token(&request.token).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// POST /password/change
// =========================================================================

/// Change password with the current one
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let user = identity
        .as_registered()
        .ok_or(AppError::AuthenticationRequired)?;

    if request.new_password != request.confirm_password {
        return Err(AppError::InvalidRequest("Passwords do not match".to_string()));
    }
    validate_strength(&request.new_password)
        .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

    let users = UserStore::new(state.pool.clone());
    if !users
        .verify_current_password(user.id, &request.current_password)
        .await?
    {
        return Err(AppError::InvalidCredentials);
    }

    users.set_password(user.id, &request.new_password).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_reset_deserialize() {
        let json = r#"{"email": "alice@example.com"}"#;

        let request: RequestResetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.email, "alice@example.com");
    }

    #[test]
    fn test_reset_password_deserialize() {
        let json = r#"{
            "token": "abc123",
            "password": "Secret#123",
            "confirm_password": "Secret#123"
        }"#;

        let request: ResetPasswordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.token, "abc123");
    }
}
