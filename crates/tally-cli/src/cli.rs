//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Personal finance ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal finance ledger with encrypted snapshots", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (snapshots, settings)
    ///
    /// Defaults to TALLY_DATA_DIR, then the platform data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store the snapshot unencrypted even when TALLY_PASSWORD is set
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and an empty ledger snapshot
    Init,

    /// Record an income, expense or balance adjustment
    Add {
        /// Description
        description: String,

        /// Signed amount (negative = outflow)
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Date (YYYY-MM-DD, MM/DD/YYYY or RFC 3339); defaults to now
        #[arg(short, long)]
        date: Option<String>,

        /// Account name (created if missing)
        #[arg(short, long)]
        account: Option<String>,

        /// Category name (created if missing)
        #[arg(short, long)]
        category: Option<String>,

        /// income, expense or balance (default: from the amount's sign)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account name
        from: String,

        /// Destination account name
        to: String,

        /// Amount to move
        amount: String,

        /// Description
        #[arg(long, default_value = "Transfer")]
        description: String,

        /// Date; defaults to now
        #[arg(short, long)]
        date: Option<String>,

        /// Category name
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Import transactions from a CSV file
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account for rows without an Account column value
        #[arg(short, long)]
        account: Option<String>,

        /// Import rows flagged as duplicates too
        #[arg(long)]
        include_duplicates: bool,
    },

    /// Manage transactions (list, search, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Show running balances
    Balances {
        /// Only this account (name)
        #[arg(short, long)]
        account: Option<String>,

        /// Only rows in this period (YYYY-MM or "all")
        #[arg(short, long)]
        period: Option<String>,
    },

    /// Summarize a period (YYYY-MM or "all"; default: current)
    Period { key: Option<String> },

    /// Show or change the fiscal period policy
    Fiscal {
        #[command(subcommand)]
        action: Option<FiscalAction>,
    },

    /// Manage savings goals
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Run a read-only SQL query against the ledger
    Query { sql: String },

    /// Export or restore backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Clear all ledger data (fiscal settings are kept)
    Reset {
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Ask the configured text-generation service for insights
    Insights {
        /// Period to describe (default: current)
        #[arg(short, long)]
        period: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
    /// Search descriptions
    Search {
        query: String,
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Delete a transaction (both legs for a transfer)
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    List,
    Add {
        name: String,
        #[arg(long)]
        savings: bool,
    },
    Rename { name: String, new_name: String },
    Delete { name: String },
    /// Mark (or with --off, unmark) an account as savings
    Savings {
        name: String,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    List,
    Add {
        name: String,
        /// income, expense, transfer or balance
        #[arg(short, long, default_value = "expense")]
        kind: String,
        /// recurring, general, savings or debt
        #[arg(short, long, default_value = "general")]
        group: String,
    },
    Rename {
        name: String,
        new_name: String,
        #[arg(short, long, default_value = "expense")]
        kind: String,
    },
    Delete {
        name: String,
        #[arg(short, long, default_value = "expense")]
        kind: String,
    },
}

#[derive(Subcommand)]
pub enum FiscalAction {
    Show,
    /// Periods are calendar months
    Calendar,
    /// Periods start on a fixed day of the month
    FixedDay { day: u32 },
    /// Periods start at the first income in a category
    IncomeTrigger { category: String },
}

#[derive(Subcommand)]
pub enum GoalsAction {
    List,
    Add {
        name: String,
        target: String,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
        /// Account names tracked by the goal
        #[arg(short, long = "account")]
        accounts: Vec<String>,
    },
    /// Change a goal; omitted fields keep their current value
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        target: Option<String>,
        /// Deadline (YYYY-MM-DD)
        #[arg(long, conflicts_with = "no_deadline")]
        deadline: Option<String>,
        /// Remove the deadline
        #[arg(long)]
        no_deadline: bool,
        /// Replace the tracked accounts
        #[arg(short, long = "account")]
        accounts: Vec<String>,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Write a backup file (encrypted when a password is set)
    Export {
        /// Output directory (default: data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace the ledger with a backup file
    Restore { file: PathBuf },
}
