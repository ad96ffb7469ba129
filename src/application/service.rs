use crate::domain::{Account, AccountId, Cents, Statement, Transaction, TransactionRequest};
use crate::storage::{ApplyOutcome, Repository, StorageConfig};

use super::{AppError, LimitCache};

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, API, etc.) and is safe
/// to share between concurrent callers.
pub struct LedgerService {
    repo: Repository,
    limits: LimitCache,
}

/// Result of an accepted transaction
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub account_id: AccountId,
    /// Balance right after this transaction was applied
    pub balance: Cents,
    pub limit: Cents,
    pub transaction: Transaction,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            limits: LimitCache::default(),
        }
    }

    pub fn with_limit_cache(mut self, limits: LimitCache) -> Self {
        self.limits = limits;
        self
    }

    /// Initialize a database, creating the file if needed.
    pub async fn init(config: &StorageConfig) -> Result<Self, AppError> {
        let config = config.clone().with_create_if_missing(true);
        let repo = Repository::init(&config).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StorageConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo))
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account with a zero balance.
    pub async fn open_account(&self, id: AccountId, limit: Cents) -> Result<Account, AppError> {
        let account = Account::new(id, limit)?;

        if !self.repo.save_account(&account).await.map_err(storage_failure)? {
            return Err(AppError::AccountAlreadyExists(id));
        }

        self.limits.insert(id, limit);
        tracing::info!(account_id = id, limit, "account opened");
        Ok(account)
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        self.repo.list_accounts().await.map_err(storage_failure)
    }

    /// Get an account's limit, from the cache when possible.
    pub async fn get_limit(&self, id: AccountId) -> Result<Cents, AppError> {
        if let Some(limit) = self.limits.get(id) {
            return Ok(limit);
        }

        let limit = self
            .repo
            .get_limit(id)
            .await
            .map_err(storage_failure)?
            .ok_or(AppError::AccountNotFound(id))?;

        // Only known accounts are cached; a missing ID may be opened later.
        self.limits.insert(id, limit);
        Ok(limit)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Apply a credit or debit to an account.
    ///
    /// A limit breach is a business outcome and is returned as
    /// [`AppError::InsufficientLimit`] without retrying. Storage failures are
    /// not retried either, since the commit status of the write is unknown.
    pub async fn record_transaction(
        &self,
        id: AccountId,
        request: &TransactionRequest,
    ) -> Result<TransactionReceipt, AppError> {
        // Unknown accounts are answered without opening a write transaction.
        self.get_limit(id).await?;

        let outcome = self
            .repo
            .apply(id, request.delta(), request.kind(), request.description())
            .await
            .map_err(storage_failure)?;

        match outcome {
            ApplyOutcome::Applied {
                balance,
                limit,
                transaction,
            } => {
                tracing::info!(
                    account_id = id,
                    kind = %request.kind(),
                    amount = request.amount_cents(),
                    balance,
                    "transaction accepted"
                );
                Ok(TransactionReceipt {
                    account_id: id,
                    balance,
                    limit,
                    transaction,
                })
            }
            ApplyOutcome::Rejected { balance, limit } => {
                tracing::debug!(
                    account_id = id,
                    amount = request.amount_cents(),
                    balance,
                    limit,
                    "transaction rejected: insufficient limit"
                );
                Err(AppError::InsufficientLimit {
                    account_id: id,
                    balance,
                    limit,
                    requested: request.amount_cents(),
                })
            }
            ApplyOutcome::NotFound => Err(AppError::AccountNotFound(id)),
        }
    }

    /// Get the balance, limit and most recent transactions of an account.
    pub async fn get_statement(&self, id: AccountId) -> Result<Statement, AppError> {
        self.repo
            .get_statement(id)
            .await
            .map_err(storage_failure)?
            .ok_or(AppError::AccountNotFound(id))
    }
}

fn storage_failure(err: anyhow::Error) -> AppError {
    let err = AppError::from(err);
    if let AppError::StorageUnavailable(reason) = &err {
        tracing::warn!(%reason, "account store unavailable");
    }
    err
}
