// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use saldo::application::{AppError, LedgerService, TransactionReceipt};
use saldo::domain::{AccountId, Cents, TransactionKind, TransactionRequest};
use saldo::storage::{Repository, StorageConfig};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StorageConfig::new(db_path.to_string_lossy());
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Helper to create a bare account store with a temporary database
pub async fn test_repository() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StorageConfig::new(db_path.to_string_lossy()).with_create_if_missing(true);
    let repo = Repository::init(&config).await?;
    Ok((repo, temp_dir))
}

/// Build a validated request, panicking on invalid test input
pub fn request(kind: TransactionKind, amount: Cents, description: &str) -> TransactionRequest {
    TransactionRequest::new(kind, amount, description).expect("valid test request")
}

pub async fn credit(
    service: &LedgerService,
    id: AccountId,
    amount: Cents,
) -> Result<TransactionReceipt, AppError> {
    service
        .record_transaction(id, &request(TransactionKind::Credit, amount, "credit"))
        .await
}

pub async fn debit(
    service: &LedgerService,
    id: AccountId,
    amount: Cents,
) -> Result<TransactionReceipt, AppError> {
    service
        .record_transaction(id, &request(TransactionKind::Debit, amount, "debit"))
        .await
}
