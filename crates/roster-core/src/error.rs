//! # Error Module
//!
//! The single error type shared by every core operation.

use crate::state::{MemberAction, MemberState};
use thiserror::Error;

/// Errors produced by the roster core.
#[derive(Debug, Error)]
pub enum Error {
    /// No record matched the lookup.
    #[error("{0} not found")]
    NotFound(String),

    /// A unique field (MSSV, ID card, username) is already taken.
    #[error("{0}")]
    Conflict(String),

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// The member has already arrived and repeat check-ins are disabled.
    #[error("{who} is already checked in")]
    AlreadyCheckedIn { who: String },

    /// The state machine has no edge for this action.
    #[error("cannot {action} a member who is '{from}'")]
    InvalidTransition {
        from: MemberState,
        action: MemberAction,
    },

    /// Username or password did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A line of an import file could not be turned into a member.
    #[error("line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    /// Stored bytes could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The OS random source failed.
    #[error("random source unavailable: {0}")]
    Entropy(String),

    /// redb failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// postcard encode/decode failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// CSV parse failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parse failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// redb splits its errors by phase; funnel them all through `redb::Error`.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Error::Storage(err.into())
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
