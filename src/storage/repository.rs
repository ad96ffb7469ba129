use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, Cents, Statement, Transaction, TransactionKind, TRANSACTION_WINDOW,
};

use super::{StorageConfig, MIGRATION_001_INITIAL};

/// Result of an atomic apply against one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Balance updated and transaction recorded together.
    Applied {
        balance: Cents,
        limit: Cents,
        transaction: Transaction,
    },
    /// The new balance would have dropped below `-limit`. Nothing was written.
    Rejected { balance: Cents, limit: Cents },
    NotFound,
}

/// Repository for persisting and querying accounts and their transactions.
///
/// Every write goes through [`Repository::apply`], which performs the limit
/// check and the mutation as a single conditional `UPDATE` inside a database
/// transaction, so concurrent writers to the same account are serialized by
/// SQLite rather than by an in-process lock.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the SQLite database described by `config`.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.busy_timeout)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database {}", config.database_path))?;

        tracing::debug!(
            database = %config.database_path,
            max_connections = config.max_connections,
            "connected to account store"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &StorageConfig) -> Result<Self> {
        let repo = Self::connect(config).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account. Returns `false` if an account with the same ID exists.
    pub async fn save_account(&self, account: &Account) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, credit_limit, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(account.id)
        .bind(account.balance)
        .bind(account.limit)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        Ok(result.rows_affected() == 1)
    }

    /// List all accounts ordered by ID.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT id, balance, credit_limit, created_at FROM accounts ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Get only the limit of an account. The limit never changes after creation.
    pub async fn get_limit(&self, id: AccountId) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT credit_limit FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account limit")?;

        Ok(row.map(|row| row.get::<Cents, _>("credit_limit")))
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: row.get("id"),
            balance: row.get("balance"),
            limit: row.get("credit_limit"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Balance operations
    // ========================

    /// Atomically add `delta` to the account balance and record the transaction.
    ///
    /// The floor check is part of the `UPDATE` predicate, so it is evaluated
    /// against the committed balance while SQLite holds the write lock. If the
    /// predicate fails the database transaction is rolled back and neither the
    /// balance nor the log changes. A sum that no longer fits in an `INTEGER`
    /// is rejected the same way.
    pub async fn apply(
        &self,
        account_id: AccountId,
        delta: Cents,
        kind: TransactionKind,
        description: &str,
    ) -> Result<ApplyOutcome> {
        let amount_cents = delta
            .checked_abs()
            .ok_or_else(|| anyhow::anyhow!("Delta out of range: {}", delta))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin apply transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ?
              AND balance + ? >= -credit_limit
              AND typeof(balance + ?) = 'integer'
            RETURNING balance, credit_limit
            "#,
        )
        .bind(delta)
        .bind(account_id)
        .bind(delta)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update balance")?;

        let Some(updated) = updated else {
            // Distinguish a missing account from a limit breach or overflow. Still
            // inside the write transaction, so this is the balance that failed the check.
            let current = sqlx::query("SELECT balance, credit_limit FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to fetch account after rejected update")?;
            tx.rollback()
                .await
                .context("Failed to roll back rejected apply")?;

            return Ok(match current {
                Some(row) => ApplyOutcome::Rejected {
                    balance: row.try_get("balance").context("Invalid stored balance")?,
                    limit: row.try_get("credit_limit").context("Invalid stored limit")?,
                },
                None => ApplyOutcome::NotFound,
            });
        };

        let balance: Cents = updated
            .try_get("balance")
            .context("Invalid balance after update")?;
        let limit: Cents = updated
            .try_get("credit_limit")
            .context("Invalid credit limit after update")?;
        let transaction = Transaction::new(account_id, amount_cents, kind, description);

        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, amount_cents, kind, description, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id)
        .bind(transaction.amount_cents)
        .bind(transaction.kind.as_str())
        .bind(&transaction.description)
        .bind(transaction.occurred_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save transaction")?;

        sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE account_id = ?
              AND sequence NOT IN (
                  SELECT sequence FROM transactions
                  WHERE account_id = ?
                  ORDER BY sequence DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .bind(TRANSACTION_WINDOW as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to trim transaction history")?;

        tx.commit().await.context("Failed to commit apply")?;

        tracing::debug!(account_id, delta, balance, limit, "balance updated");
        Ok(ApplyOutcome::Applied {
            balance,
            limit,
            transaction,
        })
    }

    /// Read balance, limit and recent transactions as one consistent snapshot.
    pub async fn get_statement(&self, account_id: AccountId) -> Result<Option<Statement>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin statement read")?;

        let account = sqlx::query("SELECT balance, credit_limit FROM accounts WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch account balance")?;

        let Some(account) = account else {
            tx.rollback().await.context("Failed to end statement read")?;
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount_cents, kind, description, occurred_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY sequence DESC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(TRANSACTION_WINDOW as i64)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to fetch recent transactions")?;

        tx.commit().await.context("Failed to end statement read")?;

        let recent_transactions = rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Statement {
            account_id,
            balance: account.get("balance"),
            limit: account.get("credit_limit"),
            taken_at: Utc::now(),
            recent_transactions,
        }))
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let occurred_at_str: String = row.get("occurred_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            account_id: row.get("account_id"),
            amount_cents: row.get("amount_cents"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            description: row.get("description"),
            occurred_at: DateTime::parse_from_rfc3339(&occurred_at_str)
                .context("Invalid occurred_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
