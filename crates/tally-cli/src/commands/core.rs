//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_book` - Shared utility to open the ledger from the data directory
//! - `cmd_init` - Create the data directory and first snapshot
//! - date, period and lookup helpers used by the other commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tally_core::import::parse_date;
use tally_core::{Account, Book, Database, LocalStore, PeriodKey, PersistenceGateway, TallySettings};

/// Snapshot password in effect, honouring --no-encrypt
pub fn effective_password(settings: &TallySettings, no_encrypt: bool) -> Option<String> {
    if no_encrypt {
        None
    } else {
        settings.password.clone()
    }
}

/// Open the ledger snapshot in the data directory
pub fn open_book(settings: &TallySettings, no_encrypt: bool) -> Result<Book> {
    let store = LocalStore::new(&settings.data_dir).with_context(|| {
        format!(
            "Failed to open data directory: {}",
            settings.data_dir.display()
        )
    })?;
    let gateway = PersistenceGateway::new(
        Box::new(store),
        settings.snapshot_key.clone(),
        effective_password(settings, no_encrypt),
    );
    Book::open(gateway).context("Failed to open ledger snapshot")
}

pub fn cmd_init(settings: &TallySettings, no_encrypt: bool) -> Result<()> {
    println!(
        "🔧 Initializing ledger in {}...",
        settings.data_dir.display()
    );

    let book = open_book(settings, no_encrypt)?;
    book.flush().context("Failed to write snapshot")?;

    if book.gateway().is_encrypted() {
        println!("   🔒 Encryption: ENABLED");
    } else if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   ⚠️  Encryption: DISABLED (set TALLY_PASSWORD to enable)");
    }

    println!("✅ Ledger initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: tally import --file statement.csv");
    println!("  2. See where the month went: tally period");

    Ok(())
}

/// Parse an optional date argument, defaulting to now
pub fn parse_when(date: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match date {
        Some(s) => parse_date(s).with_context(|| format!("Invalid date: {}", s)),
        None => Ok(now),
    }
}

/// Parse an optional period argument, defaulting to the month containing `now`
pub fn parse_period(key: Option<&str>, now: DateTime<Utc>) -> Result<PeriodKey> {
    match key {
        Some(s) => s
            .parse::<PeriodKey>()
            .with_context(|| format!("Invalid period: {}", s)),
        None => Ok(PeriodKey::current(now)),
    }
}

/// Look up an account by name, failing with a readable message
pub fn require_account(db: &Database, name: &str) -> Result<Account> {
    db.find_account_by_name(name)?
        .with_context(|| format!("Account not found: {}", name))
}
