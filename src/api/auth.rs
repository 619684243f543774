//! Registration, login and logout

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::SessionStore;
use crate::domain::AccountType;
use crate::error::AppError;
use crate::store::users::NewUser;
use crate::store::UserStore;

use super::middleware::SESSION_TOKEN_HEADER;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub account_type: AccountType,
}

// =========================================================================
// POST /auth/register
// =========================================================================

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if request.password != request.confirm_password {
        return Err(AppError::InvalidRequest("Passwords do not match".to_string()));
    }

    let new_user = NewUser {
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        nickname: request.nickname.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        username: request.username.trim().to_string(),
        password: request.password,
    };

    let users = UserStore::new(state.pool.clone());
    let user_id = users.register(&new_user).await?;

    if let Err(e) = state
        .mailer
        .send_welcome(&new_user.email, &new_user.first_name)
        .await
    {
        // Registration already committed; a failed welcome mail is not fatal.
        tracing::warn!("Failed to send welcome email: {}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            username: new_user.username,
        }),
    ))
}

// =========================================================================
// POST /auth/login
// =========================================================================

/// Log in with username-or-email and password
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let users = UserStore::new(state.pool.clone());
    let user = users.login(request.login.trim(), &request.password).await?;

    let sessions = SessionStore::new(state.pool.clone());
    let token = sessions
        .create_user_session(user.id, state.config.session_ttl_minutes)
        .await?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        account_type: user.account_type,
    }))
}

// =========================================================================
// POST /auth/logout
// =========================================================================

/// Revoke the current session
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::MissingHeader(SESSION_TOKEN_HEADER.to_string()))?;

    let sessions = SessionStore::new(state.pool.clone());
    sessions.revoke(token).await?;

    Ok(StatusCode::NO_CONTENT)
}
