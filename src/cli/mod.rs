use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, LedgerService, LimitCache};
use crate::domain::{AccountId, Statement, TransactionRequest};
use crate::storage::StorageConfig;

/// Saldo - limit-enforcing account ledger
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "Keep account balances within their limits, with recent history")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "SALDO_DATABASE", default_value = "saldo.db")]
    pub database: String,

    /// How long to wait on a busy database before failing, in milliseconds
    #[arg(long, env = "SALDO_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled database connections
    #[arg(long, env = "SALDO_MAX_CONNECTIONS", default_value_t = StorageConfig::DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Maximum number of account limits kept in memory
    #[arg(long, env = "SALDO_LIMIT_CACHE_CAPACITY", default_value_t = LimitCache::DEFAULT_CAPACITY)]
    pub limit_cache_capacity: usize,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Apply a credit or debit to an account
    Transact {
        /// Account ID
        account: AccountId,

        /// Transaction kind: c/credit or d/debit
        kind: String,

        /// Amount in cents (positive whole number)
        amount: String,

        /// Short description (1 to 10 characters)
        description: String,
    },

    /// Show balance, limit and recent transactions for an account
    Statement {
        /// Account ID
        account: AccountId,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account with a zero balance
    Open {
        /// Account ID (must be unique)
        id: AccountId,

        /// How far the balance may go below zero, in cents
        #[arg(short, long)]
        limit: i64,
    },

    /// List all accounts
    List,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "saldo=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

impl Cli {
    fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.database)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_max_connections(self.max_connections)
    }

    async fn connect(&self) -> Result<LedgerService> {
        let service = LedgerService::connect(&self.storage_config())
            .await
            .with_context(|| format!("Failed to open database {} (run `saldo init` first?)", self.database))?;
        Ok(service.with_limit_cache(LimitCache::new(self.limit_cache_capacity)))
    }

    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        let service = match self.command {
            Commands::Init => LedgerService::init(&self.storage_config()).await?,
            _ => self.connect().await?,
        };

        let result = match self.command {
            Commands::Init => {
                println!("Database initialized: {}", self.database);
                Ok(())
            }
            Commands::Account(cmd) => run_account_command(&service, cmd).await,
            Commands::Transact {
                account,
                kind,
                amount,
                description,
            } => run_transact_command(&service, account, &kind, &amount, &description).await,
            Commands::Statement { account, format } => {
                run_statement_command(&service, account, format).await
            }
        };
        service.close().await;
        result
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { id, limit } => {
            let account = service.open_account(id, limit).await?;
            println!("Opened account {} (limit: {})", account.id, account.limit);
        }
        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }

            println!("{:<10} {:>14} {:>14}", "ID", "BALANCE", "LIMIT");
            println!("{}", "-".repeat(40));
            for account in accounts {
                println!(
                    "{:<10} {:>14} {:>14}",
                    account.id, account.balance, account.limit
                );
            }
        }
    }
    Ok(())
}

async fn run_transact_command(
    service: &LedgerService,
    account: AccountId,
    kind: &str,
    amount: &str,
    description: &str,
) -> Result<()> {
    let request = TransactionRequest::parse(kind, amount, description)?;

    match service.record_transaction(account, &request).await {
        Ok(receipt) => {
            println!(
                "Accepted {} of {} on account {}",
                request.kind(),
                request.amount_cents(),
                account
            );
            println!("  Balance: {}", receipt.balance);
            println!("  Limit:   {}", receipt.limit);
            Ok(())
        }
        Err(AppError::InsufficientLimit {
            balance, limit, ..
        }) => {
            anyhow::bail!(
                "Rejected: {} of {} would take account {} below its floor of {} (balance: {})",
                request.kind(),
                request.amount_cents(),
                account,
                -limit,
                balance
            )
        }
        Err(err) if err.is_transient() => Err(anyhow::Error::new(err).context(
            "The write may or may not have been applied; check the statement before retrying",
        )),
        Err(err) => Err(err.into()),
    }
}

async fn run_statement_command(
    service: &LedgerService,
    account: AccountId,
    format: OutputFormat,
) -> Result<()> {
    let statement = service.get_statement(account).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&statement)?);
        }
        OutputFormat::Table => print_statement(&statement),
    }
    Ok(())
}

fn print_statement(statement: &Statement) {
    println!("Account {}", statement.account_id);
    println!("  Balance: {}", statement.balance);
    println!("  Limit:   {}", statement.limit);
    println!("  As of:   {}", statement.taken_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if statement.recent_transactions.is_empty() {
        println!("No transactions.");
        return;
    }

    println!(
        "{:<20} {:<7} {:>12} {:<10}",
        "DATE", "KIND", "AMOUNT", "DESCRIPTION"
    );
    println!("{}", "-".repeat(52));
    for tx in &statement.recent_transactions {
        println!(
            "{:<20} {:<7} {:>12} {:<10}",
            tx.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            tx.kind.as_str(),
            tx.signed_amount(),
            tx.description
        );
    }
}
