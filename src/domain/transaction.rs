use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

/// Longest description accepted, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 10;

/// Largest amount a single transaction may carry, in cents.
pub const MAX_AMOUNT: Cents = i32::MAX as Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Increases the balance
    Credit,
    /// Decreases the balance
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    /// Accepts both the short (`c`/`d`) and long forms, case-insensitively.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" | "credit" => Some(TransactionKind::Credit),
            "d" | "debit" => Some(TransactionKind::Debit),
            _ => None,
        }
    }

    /// Convert a magnitude into the signed balance delta for this kind.
    pub fn signed(&self, amount_cents: Cents) -> Cents {
        match self {
            TransactionKind::Credit => amount_cents,
            TransactionKind::Debit => -amount_cents,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A committed credit or debit. Created by the store together with the
/// balance change that admits it and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Magnitude as supplied by the caller (always positive)
    pub amount_cents: Cents,
    pub kind: TransactionKind,
    pub description: String,
    /// Server clock at the moment the transaction was accepted
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        amount_cents: Cents,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount_cents,
            kind,
            description: description.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn signed_amount(&self) -> Cents {
        self.kind.signed(self.amount_cents)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid transaction kind: {0} (expected c/credit or d/debit)")]
    InvalidKind(String),

    #[error("Invalid amount: {0} (expected a whole number of cents from 1 to {MAX_AMOUNT})")]
    InvalidAmount(String),

    #[error("Invalid description: must be 1 to {MAX_DESCRIPTION_LEN} characters")]
    InvalidDescription,

    #[error("Limit must not be negative: {0}")]
    NegativeLimit(Cents),
}

/// Parse a raw amount. Only plain integers from 1 to [`MAX_AMOUNT`] are accepted.
pub fn parse_amount(input: &str) -> Result<Cents, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidAmount(input.to_string()));
    }
    match trimmed.parse::<Cents>() {
        Ok(amount) if (1..=MAX_AMOUNT).contains(&amount) => Ok(amount),
        _ => Err(ValidationError::InvalidAmount(input.to_string())),
    }
}

/// A transaction submission that has passed input validation.
///
/// Fields are private so the only way in is [`TransactionRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    kind: TransactionKind,
    amount_cents: Cents,
    description: String,
}

impl TransactionRequest {
    pub fn new(
        kind: TransactionKind,
        amount_cents: Cents,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !(1..=MAX_AMOUNT).contains(&amount_cents) {
            return Err(ValidationError::InvalidAmount(amount_cents.to_string()));
        }

        let description = description.into();
        let len = description.chars().count();
        if description.trim().is_empty() || len > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::InvalidDescription);
        }

        Ok(Self {
            kind,
            amount_cents,
            description,
        })
    }

    /// Validate raw text input, as received from a command line or request body.
    pub fn parse(kind: &str, amount: &str, description: &str) -> Result<Self, ValidationError> {
        let kind = TransactionKind::from_str(kind)
            .ok_or_else(|| ValidationError::InvalidKind(kind.to_string()))?;
        let amount_cents = parse_amount(amount)?;
        Self::new(kind, amount_cents, description)
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount_cents(&self) -> Cents {
        self.amount_cents
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Balance delta this request would apply.
    pub fn delta(&self) -> Cents {
        self.kind.signed(self.amount_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TransactionKind::Credit, TransactionKind::Debit] {
            assert_eq!(TransactionKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_kind_short_forms() {
        assert_eq!(TransactionKind::from_str("c"), Some(TransactionKind::Credit));
        assert_eq!(TransactionKind::from_str("D"), Some(TransactionKind::Debit));
        assert_eq!(TransactionKind::from_str("x"), None);
        assert_eq!(TransactionKind::from_str(""), None);
    }

    #[test]
    fn test_debit_is_negated() {
        assert_eq!(TransactionKind::Credit.signed(500), 500);
        assert_eq!(TransactionKind::Debit.signed(500), -500);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1000"), Ok(1000));
        assert_eq!(parse_amount(" 42 "), Ok(42));
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("99999999999999999999").is_err());
        assert_eq!(parse_amount("2147483647"), Ok(MAX_AMOUNT));
        assert!(parse_amount("2147483648").is_err());
    }

    #[test]
    fn test_amount_upper_bound() {
        assert!(TransactionRequest::new(TransactionKind::Credit, MAX_AMOUNT, "max").is_ok());
        assert!(matches!(
            TransactionRequest::new(TransactionKind::Credit, MAX_AMOUNT + 1, "max"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            TransactionRequest::new(TransactionKind::Debit, Cents::MAX, "max"),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_description_bounds() {
        assert!(TransactionRequest::new(TransactionKind::Credit, 1, "a").is_ok());
        assert!(TransactionRequest::new(TransactionKind::Credit, 1, "abcdefghij").is_ok());
        assert_eq!(
            TransactionRequest::new(TransactionKind::Credit, 1, "abcdefghijk"),
            Err(ValidationError::InvalidDescription)
        );
        assert_eq!(
            TransactionRequest::new(TransactionKind::Credit, 1, ""),
            Err(ValidationError::InvalidDescription)
        );
        assert_eq!(
            TransactionRequest::new(TransactionKind::Credit, 1, "   "),
            Err(ValidationError::InvalidDescription)
        );
    }

    #[test]
    fn test_description_counts_characters_not_bytes() {
        // 10 characters, 20 bytes
        assert!(TransactionRequest::new(TransactionKind::Debit, 1, "çççççççççç").is_ok());
    }

    #[test]
    fn test_zero_amount_never_reaches_the_ledger() {
        assert!(matches!(
            TransactionRequest::new(TransactionKind::Credit, 0, "zero"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(TransactionRequest::parse("c", "0", "zero").is_err());
    }

    #[test]
    fn test_parse_request() {
        let request = TransactionRequest::parse("d", "250", "rent").unwrap();
        assert_eq!(request.kind(), TransactionKind::Debit);
        assert_eq!(request.amount_cents(), 250);
        assert_eq!(request.delta(), -250);
        assert_eq!(request.description(), "rent");

        assert!(matches!(
            TransactionRequest::parse("withdraw", "250", "rent"),
            Err(ValidationError::InvalidKind(_))
        ));
    }
}
