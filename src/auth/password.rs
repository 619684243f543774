//! Password hashing and strength rules
//!
//! Stored form is `<salt_hex>$<sha256(salt || password)_hex>` with a random
//! 16-byte salt per password.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let digest = salted_digest(&salt, password);
    format!("{}${}", hex::encode(salt), digest)
}

/// Verify a password against a stored `salt$hash` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };

    salted_digest(&salt, password) == expected
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Password policy: 8-16 characters with at least one uppercase letter, one
/// lowercase letter, one digit and one special character.
pub fn validate_strength(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 || password.len() > 16 {
        return Err("Password must be 8-16 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password needs at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password needs at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password needs at least one number");
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Password needs at least one special character");
    }

    Ok(())
}
