//! Transaction operations

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{column_error, parse_decimal, parse_instant, Database};
use crate::error::{Error, Result};
use crate::models::Transaction;

pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, date, description, amount, kind, account_id, category_id";

pub(crate) fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date: String = row.get(1)?;
    let amount: String = row.get(3)?;
    let kind: String = row.get(4)?;

    Ok(Transaction {
        id: row.get(0)?,
        date: parse_instant(&date).map_err(|e| column_error(1, e))?,
        description: row.get(2)?,
        amount: parse_decimal(&amount).map_err(|e| column_error(3, e))?,
        kind: kind
            .parse()
            .map_err(|e: String| column_error(4, Error::Integrity(e)))?,
        account_id: row.get(5)?,
        category_id: row.get(6)?,
    })
}

impl Database {
    /// Get a transaction by ID
    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id],
                row_to_transaction,
            )
            .optional()?)
    }

    /// Every stored transaction in chronological order
    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date, id",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// List transactions, newest first
    pub fn list_transactions(&self, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(params![limit, offset], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Case-insensitive substring search on description, newest first
    pub fn search_transactions(&self, query: &str, limit: i64) -> Result<Vec<Transaction>> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE description LIKE ? ORDER BY date DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(params![pattern, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Transactions on one account, chronological
    pub fn account_transactions(&self, account_id: &str) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE account_id = ? ORDER BY date, id",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(params![account_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Count all transactions
    pub fn count_transactions(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }

    /// All stored dedup signatures
    pub fn existing_signatures(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT signature FROM transactions")?;
        let sigs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(sigs)
    }

    /// Delete a transaction by id
    ///
    /// If the row is one leg of a transfer, the other leg and the link go too.
    /// Returns the number of transaction rows removed.
    pub fn delete_transaction(&mut self, id: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let link: Option<(String, String, String)> = tx
            .query_row(
                "SELECT id, source_leg_id, dest_leg_id FROM transfers
                 WHERE source_leg_id = ?1 OR dest_leg_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let removed = match link {
            Some((link_id, source, dest)) => {
                tx.execute("DELETE FROM transfers WHERE id = ?", params![link_id])?;
                tx.execute(
                    "DELETE FROM transactions WHERE id IN (?, ?)",
                    params![source, dest],
                )?
            }
            None => tx.execute("DELETE FROM transactions WHERE id = ?", params![id])?,
        };
        if removed == 0 {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        tx.commit()?;

        info!("Deleted {} transaction row(s) for {}", removed, id);
        Ok(removed)
    }
}
