//! # User Module
//!
//! Staff accounts allowed to mutate the roster.

use crate::error::{Error, Result};
use crate::password::PasswordHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// A staff account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: PasswordHash,
    /// MSSV of the member this account belongs to.
    pub mssv: String,
    pub created_at: DateTime<Utc>,
}

/// Check a username: 3..=64 chars of `[A-Za-z0-9_.-]`.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.len();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "username must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
    {
        return Err(Error::Validation(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Check a password length in bytes.
pub fn validate_password(password: &str) -> Result<()> {
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len()) {
        return Err(Error::Validation(format!(
            "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} bytes"
        )));
    }
    Ok(())
}
