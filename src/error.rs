//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Invalid bill code or access has expired")]
    GuestAccessDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Bill not found")]
    BillNotFound,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "authentication_required", None)
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
            }
            AppError::InvalidSession => (StatusCode::UNAUTHORIZED, "invalid_session", None),
            AppError::GuestAccessDenied => {
                (StatusCode::UNAUTHORIZED, "guest_access_denied", None)
            }

            // 403 Forbidden
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),

            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }
            AppError::BillNotFound => (StatusCode::NOT_FOUND, "bill_not_found", None),
            AppError::ParticipantNotFound => {
                (StatusCode::NOT_FOUND, "participant_not_found", None)
            }

            // 410-ish token failures map to 400
            AppError::InvalidResetToken => {
                (StatusCode::BAD_REQUEST, "invalid_reset_token", None)
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::InvalidParticipant => {
                        (StatusCode::BAD_REQUEST, "invalid_participant", Some(domain_err.to_string()))
                    }
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                    DomainError::DuplicateParticipant { .. } => {
                        (StatusCode::CONFLICT, "duplicate_participant", Some(domain_err.to_string()))
                    }
                    DomainError::UnbalancedInput { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "unbalanced_input", Some(domain_err.to_string()))
                    }
                    DomainError::CodeGenerationExhausted { .. } => {
                        // Retryable: a later attempt draws fresh codes.
                        (StatusCode::SERVICE_UNAVAILABLE, "code_generation_exhausted", Some(domain_err.to_string()))
                    }
                }
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_duplicate_participant_maps_to_conflict() {
        let err = AppError::from(DomainError::DuplicateParticipant {
            bill_id: 1,
            user_id: 2,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_code_exhaustion_maps_to_service_unavailable() {
        let err = AppError::from(DomainError::CodeGenerationExhausted { attempts: 10 });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_invalid_session_maps_to_unauthorized() {
        let response = AppError::InvalidSession.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
