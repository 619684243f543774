//! Domain error types
//!
//! Business rule violations, independent of the web/infrastructure layer.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Participant row with neither a registered user nor guest details.
    #[error("Either a user id or guest name and email is required")]
    InvalidParticipant,

    /// Registered user already participates in the bill.
    #[error("User {user_id} is already a participant in bill {bill_id}")]
    DuplicateParticipant { bill_id: i64, user_id: i64 },

    /// Non-numeric or negative amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Every generated bill code collided with an existing one.
    #[error("Could not generate a unique bill code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    /// Signed balances handed to the settlement walk did not sum to zero
    /// beyond tolerance. A data-consistency warning, not a crash.
    #[error("Balances do not sum to zero (residual {residual})")]
    UnbalancedInput { residual: rust_decimal::Decimal },
}

impl DomainError {
    /// Client errors are the caller's fault and map to 4xx responses.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParticipant
                | Self::DuplicateParticipant { .. }
                | Self::InvalidAmount(_)
                | Self::UnbalancedInput { .. }
        )
    }

    /// Retryable errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CodeGenerationExhausted { .. })
    }
}
