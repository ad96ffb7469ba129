use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Transaction, ValidationError};

/// Money is represented as integer minor units (cents) to avoid floating-point issues.
pub type Cents = i64;

pub type AccountId = i64;

/// Maximum number of transactions retained per account, most recent first.
pub const TRANSACTION_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Current balance; only ever changed by an accepted transaction
    pub balance: Cents,
    /// How far the balance may go below zero. Fixed at creation.
    pub limit: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh account with a zero balance.
    pub fn new(id: AccountId, limit: Cents) -> Result<Self, ValidationError> {
        if limit < 0 {
            return Err(ValidationError::NegativeLimit(limit));
        }
        Ok(Self {
            id,
            balance: 0,
            limit,
            created_at: Utc::now(),
        })
    }

    /// Lowest balance the account may reach (inclusive).
    pub fn floor(&self) -> Cents {
        -self.limit
    }

    /// Returns the balance after `delta`, or `None` if it would breach the floor.
    pub fn admits(&self, delta: Cents) -> Option<Cents> {
        self.balance
            .checked_add(delta)
            .filter(|candidate| *candidate >= self.floor())
    }
}

/// Point-in-time view of an account: balance, limit and recent history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub account_id: AccountId,
    pub balance: Cents,
    pub limit: Cents,
    pub taken_at: DateTime<Utc>,
    /// Most recent first, at most [`TRANSACTION_WINDOW`] entries
    pub recent_transactions: Vec<Transaction>,
}
