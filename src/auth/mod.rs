//! Authentication
//!
//! Credential hashing and token-backed sessions for registered users and
//! validated guests.

pub mod password;
pub mod session;

pub use password::{hash_password, validate_strength, verify_password};
pub use session::{generate_token, token_hash, SessionStore};
