//! Acting identity
//!
//! Who is performing an operation: a registered user resolved from a session
//! token, or a guest resolved from a validated (email, bill code) pair. The
//! identity is an explicit value passed through request extensions rather
//! than ambient session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Standard,
    Premium,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Standard => "standard",
            AccountType::Premium => "premium",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "premium" => AccountType::Premium,
            _ => AccountType::Standard,
        }
    }
}

/// A logged-in registered user.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: AccountType,
}

/// A validated guest: tied to one bill via its code, time-limited.
#[derive(Debug, Clone, Serialize)]
pub struct GuestAccess {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bill_code: String,
    pub expires_at: DateTime<Utc>,
}

/// The acting identity for a request.
#[derive(Debug, Clone)]
pub enum Identity {
    Registered(RegisteredUser),
    Guest(GuestAccess),
}

impl Identity {
    pub fn as_registered(&self) -> Option<&RegisteredUser> {
        match self {
            Identity::Registered(user) => Some(user),
            Identity::Guest(_) => None,
        }
    }

    pub fn as_guest(&self) -> Option<&GuestAccess> {
        match self {
            Identity::Guest(guest) => Some(guest),
            Identity::Registered(_) => None,
        }
    }
}
