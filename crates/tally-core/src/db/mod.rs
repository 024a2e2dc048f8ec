//! Embedded ledger store with migrations
//!
//! This module is organized by domain:
//! - `schema` - Table definitions and forward migrations
//! - `accounts` - Account admin operations
//! - `categories` - Category admin operations
//! - `transactions` - Transaction reads, deletes and signature lookups
//! - `transfers` - Explicit transfer links
//! - `goals` - Savings goals
//! - `configs` - Key/value configuration (fiscal policy)
//! - `query` - Read-only ad-hoc SQL surface
//! - `image` - Serializing the store to/from a database image

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::LedgerStats;

mod accounts;
mod categories;
mod configs;
mod goals;
mod image;
mod query;
pub(crate) mod schema;
mod transactions;
mod transfers;

pub use query::QueryResult;
pub use schema::SCHEMA_VERSION;
pub use transfers::TransferLink;

/// Render an instant the way it is stored: RFC 3339, milliseconds, `Z`
pub(crate) fn format_instant(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored instant
pub(crate) fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Integrity(format!("invalid stored date '{}': {}", s, e)))
}

/// Parse a stored decimal amount
pub(crate) fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| Error::Integrity(format!("invalid stored amount '{}': {}", s, e)))
}

/// Adapt a conversion failure inside a rusqlite row mapper
pub(crate) fn column_error(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// The single in-memory ledger store
///
/// All ledger-mutating operations take `&mut self` and either fully commit
/// or fully roll back. Reads take `&self`.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a fresh, empty in-memory store
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an already-populated connection, migrating it forward
    pub(crate) fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection (read-only use)
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one SQL transaction; an `Err` rolls everything back
    pub(crate) fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Row counts per table
    pub fn stats(&self) -> Result<LedgerStats> {
        let count = |table: &str| -> Result<i64> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
        };

        Ok(LedgerStats {
            accounts: count("accounts")?,
            categories: count("categories")?,
            transactions: count("transactions")?,
            transfers: count("transfers")?,
            goals: count("savings_goals")?,
        })
    }

    /// Clear all ledger data while keeping configuration
    ///
    /// Clears: transfers, transactions, goal_accounts, savings_goals, categories, accounts
    /// Preserves: configs
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;

        // Delete in order respecting foreign key constraints
        tx.execute_batch(
            r#"
            DELETE FROM transfers;
            DELETE FROM transactions;
            DELETE FROM goal_accounts;
            DELETE FROM savings_goals;
            DELETE FROM categories;
            DELETE FROM accounts;
            "#,
        )?;
        tx.commit()?;

        info!("Ledger reset complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
