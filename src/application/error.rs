use thiserror::Error;

use crate::domain::{AccountId, Cents, ValidationError};

/// SQLite primary result codes that mean "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    #[error(
        "Insufficient limit on account {account_id}: balance {balance}, limit {limit}, requested {requested}"
    )]
    InsufficientLimit {
        account_id: AccountId,
        balance: Cents,
        limit: Cents,
        requested: Cents,
    },

    #[error(transparent)]
    InvalidRequest(#[from] ValidationError),

    /// The store could not be reached in time. Whether a write committed is unknown.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0:#}")]
    Database(anyhow::Error),
}

impl AppError {
    /// True for failures that may succeed if the caller tries again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if is_unavailable(&err) {
            AppError::StorageUnavailable(format!("{err:#}"))
        } else {
            AppError::Database(err)
        }
    }
}

fn is_unavailable(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| match cause.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::PoolTimedOut) | Some(sqlx::Error::PoolClosed) => true,
            Some(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                // extended codes carry the primary code in the low byte
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        })
}
