//! Outbound email
//!
//! Message composition lives behind the `Mailer` trait so handlers stay
//! transport-agnostic. The default implementation writes messages to the log
//! instead of delivering them.

use crate::error::AppError;

/// Sends transactional mail.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, to: &str, first_name: &str) -> Result<(), AppError>;

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), AppError>;
}

/// Logs outbound messages via tracing.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, to: &str, first_name: &str) -> Result<(), AppError> {
        tracing::info!(
            to = %to,
            subject = "Welcome aboard",
            "email: welcome message for {}",
            first_name
        );
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), AppError> {
        tracing::info!(
            to = %to,
            subject = "Password reset",
            reset_link = %reset_link,
            "email: password reset message"
        );
        Ok(())
    }
}
