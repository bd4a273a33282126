//! Registered users.

use serde::{Deserialize, Serialize};
use valuta_common::time::{self, iso_timestamp};
use valuta_common::Timestamp;

use crate::error::{WalletError, WalletResult};
use crate::password::{generate_salt, hash_password, verify_password, MIN_PASSWORD_LEN};

/// A registered user as stored in the users file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    #[serde(with = "iso_timestamp")]
    pub registration_date: Timestamp,
}

impl User {
    /// Create a user from a plain password, generating a fresh salt.
    pub fn new(user_id: u64, username: &str, password: &str) -> WalletResult<Self> {
        let username = validate_username(username)?;
        validate_password(password)?;

        let salt = generate_salt();
        Ok(Self {
            user_id,
            username,
            hashed_password: hash_password(password, &salt),
            salt,
            registration_date: time::now(),
        })
    }

    /// Check a plain password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.salt, &self.hashed_password)
    }
}

/// Trimmed username, or an error if nothing is left.
pub fn validate_username(username: &str) -> WalletResult<String> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(WalletError::InvalidInput("Username cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> WalletResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WalletError::InvalidInput(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
