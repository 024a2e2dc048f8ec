//! Account operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::Database;
use crate::error::{is_constraint_violation, Error, Result};
use crate::models::{new_id, Account};

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        is_savings: row.get(2)?,
    })
}

impl Database {
    /// Create an account explicitly (admin action)
    pub fn create_account(&mut self, name: &str, is_savings: bool) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("account name is empty".into()));
        }

        let account = Account {
            id: new_id(),
            name: name.to_string(),
            is_savings,
        };
        self.conn
            .execute(
                "INSERT INTO accounts (id, name, is_savings) VALUES (?, ?, ?)",
                params![account.id, account.name, account.is_savings],
            )
            .map_err(|e| duplicate_or(e, name))?;

        info!("Created account '{}'", account.name);
        Ok(account)
    }

    /// List all accounts
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_savings FROM accounts ORDER BY name")?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, is_savings FROM accounts WHERE id = ?",
                params![id],
                row_to_account,
            )
            .optional()?)
    }

    /// Get an account by exact name
    pub fn find_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, is_savings FROM accounts WHERE name = ?",
                params![name.trim()],
                row_to_account,
            )
            .optional()?)
    }

    /// Rename an account; id and all references are preserved
    pub fn rename_account(&mut self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::Validation("account name is empty".into()));
        }

        let changed = self
            .conn
            .execute(
                "UPDATE accounts SET name = ? WHERE id = ?",
                params![new_name, id],
            )
            .map_err(|e| duplicate_or(e, new_name))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("account {}", id)));
        }
        Ok(())
    }

    /// Mark or unmark an account as savings
    pub fn set_account_savings(&mut self, id: &str, is_savings: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE accounts SET is_savings = ? WHERE id = ?",
            params![is_savings, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("account {}", id)));
        }
        Ok(())
    }

    /// Number of transactions pointing at an account
    pub fn count_account_references(&self, id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
            params![id],
            |row| row.get(0),
        )?)
    }

    /// Delete an account
    ///
    /// Refused while any transaction references it. Savings goals that target
    /// the account lose that target (goal_accounts cascades).
    pub fn delete_account(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let references: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(Error::Referenced {
                entity: "Account",
                id: id.to_string(),
                references,
            });
        }

        let deleted = tx.execute("DELETE FROM accounts WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("account {}", id)));
        }
        tx.commit()?;

        info!("Deleted account {}", id);
        Ok(())
    }
}

fn duplicate_or(err: rusqlite::Error, name: &str) -> Error {
    if is_constraint_violation(&err) {
        Error::Duplicate {
            entity: "Account",
            name: name.to_string(),
        }
    } else {
        Error::Database(err)
    }
}
