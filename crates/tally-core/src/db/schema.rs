//! Schema definition and forward migrations
//!
//! The schema version lives in `PRAGMA user_version`. Images written before
//! versioning (user_version 0 with tables present) are treated as version 1.

use std::collections::HashSet;

use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tracing::info;

use super::{format_instant, parse_decimal, parse_instant};
use crate::dedup::signature_parts;
use crate::error::{Error, Result};
use crate::models::new_id;

/// Version written by this build
pub const SCHEMA_VERSION: i32 = 2;

const TRANSFERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS transfers (
        id TEXT PRIMARY KEY,
        source_leg_id TEXT NOT NULL UNIQUE REFERENCES transactions(id),
        dest_leg_id TEXT NOT NULL UNIQUE REFERENCES transactions(id),
        CHECK (source_leg_id <> dest_leg_id)
    );
"#;

const GOAL_ACCOUNTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS goal_accounts (
        goal_id TEXT NOT NULL REFERENCES savings_goals(id) ON DELETE CASCADE,
        account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        PRIMARY KEY (goal_id, account_id)
    );
"#;

const CURRENT_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        is_savings INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('income', 'expense', 'transfer', 'balance')),
        category_group TEXT NOT NULL DEFAULT 'general',
        UNIQUE (name, kind)
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        date TEXT NOT NULL,                         -- RFC 3339, millisecond precision, UTC
        description TEXT NOT NULL,
        amount TEXT NOT NULL,                       -- signed decimal
        kind TEXT NOT NULL CHECK (kind IN ('income', 'expense', 'transfer', 'balance')),
        account_id TEXT NOT NULL REFERENCES accounts(id),
        category_id TEXT REFERENCES categories(id),
        signature TEXT NOT NULL                     -- duplicate-detection fingerprint
    );

    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
    CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);
    CREATE INDEX IF NOT EXISTS idx_transactions_signature ON transactions(signature);

    CREATE TABLE IF NOT EXISTS savings_goals (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        target_amount TEXT NOT NULL,
        deadline TEXT                               -- YYYY-MM-DD
    );

    CREATE TABLE IF NOT EXISTS configs (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Shape of version 1 images, kept so migrations can be tested
#[cfg(test)]
pub(crate) const LEGACY_V1_SCHEMA: &str = r#"
    CREATE TABLE accounts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        is_savings INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        category_group TEXT NOT NULL DEFAULT 'general',
        UNIQUE (name, kind)
    );
    CREATE TABLE transactions (
        id TEXT PRIMARY KEY,
        date TEXT NOT NULL,
        description TEXT NOT NULL,
        amount TEXT NOT NULL,
        kind TEXT NOT NULL,
        account_id TEXT NOT NULL REFERENCES accounts(id),
        category_id TEXT REFERENCES categories(id)
    );
    CREATE TABLE savings_goals (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        target_amount TEXT NOT NULL,
        deadline TEXT,
        target_accounts TEXT NOT NULL DEFAULT '[]'
    );
    CREATE TABLE configs (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Read the on-disk version, mapping unversioned legacy images to 1
pub(crate) fn detect_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version != 0 {
        return Ok(version);
    }

    let has_tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'transactions'",
        [],
        |row| row.get(0),
    )?;
    Ok(if has_tables > 0 { 1 } else { 0 })
}

/// Bring the connected database to `SCHEMA_VERSION`
pub(crate) fn migrate(conn: &mut Connection) -> Result<()> {
    let version = detect_version(conn)?;

    match version {
        0 => {
            create_current(conn)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!("Database schema initialized (v{})", SCHEMA_VERSION);
        }
        1 => {
            migrate_v1_to_v2(conn)?;
            info!("Migrated database image from v1 to v{}", SCHEMA_VERSION);
        }
        SCHEMA_VERSION => create_current(conn)?,
        newer => {
            return Err(Error::Integrity(format!(
                "database image has schema version {}, newer than supported v{}",
                newer, SCHEMA_VERSION
            )));
        }
    }

    Ok(())
}

fn create_current(conn: &Connection) -> Result<()> {
    conn.execute_batch(CURRENT_SCHEMA)?;
    conn.execute_batch(TRANSFERS_TABLE)?;
    conn.execute_batch(GOAL_ACCOUNTS_TABLE)?;
    Ok(())
}

struct LegacyLeg {
    id: String,
    date: String,
    amount: Decimal,
    category_id: Option<String>,
    account_id: String,
}

fn migrate_v1_to_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    // 1. Signatures, with dates normalized so lexical order is chronological
    tx.execute_batch(
        "ALTER TABLE transactions ADD COLUMN signature TEXT NOT NULL DEFAULT '';
         CREATE INDEX IF NOT EXISTS idx_transactions_signature ON transactions(signature);",
    )?;
    let rows: Vec<(String, String, String, String)> = {
        let mut stmt = tx.prepare("SELECT id, date, amount, description FROM transactions")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };
    for (id, date, amount, description) in &rows {
        let date = parse_instant(date)?;
        let amount = parse_decimal(amount)?;
        tx.execute(
            "UPDATE transactions SET date = ?, signature = ? WHERE id = ?",
            params![
                format_instant(date),
                signature_parts(date, amount, description),
                id
            ],
        )?;
    }

    // 2. Explicit transfer links from the implicit pairing convention
    tx.execute_batch(TRANSFERS_TABLE)?;
    let legs: Vec<LegacyLeg> = {
        let mut stmt = tx.prepare(
            "SELECT id, date, amount, category_id, account_id FROM transactions
             WHERE kind = 'transfer' ORDER BY date, id",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, date, amount, category_id, account_id)| {
                Ok(LegacyLeg {
                    id,
                    date,
                    amount: parse_decimal(&amount)?,
                    category_id,
                    account_id,
                })
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut used: HashSet<usize> = HashSet::new();
    let mut paired = 0;
    for (i, out) in legs.iter().enumerate() {
        if out.amount >= Decimal::ZERO || used.contains(&i) {
            continue;
        }
        let partner = legs.iter().enumerate().position(|(j, inc)| {
            !used.contains(&j)
                && inc.amount == -out.amount
                && inc.date == out.date
                && inc.category_id == out.category_id
                && inc.account_id != out.account_id
        });
        if let Some(j) = partner {
            used.insert(i);
            used.insert(j);
            tx.execute(
                "INSERT INTO transfers (id, source_leg_id, dest_leg_id) VALUES (?, ?, ?)",
                params![new_id(), out.id, legs[j].id],
            )?;
            paired += 1;
        }
    }

    // 3. Goal targets move from a JSON column to a join table
    tx.execute_batch(GOAL_ACCOUNTS_TABLE)?;
    let goals: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, target_accounts FROM savings_goals")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };
    for (goal_id, targets) in &goals {
        let accounts: Vec<String> = serde_json::from_str(targets).unwrap_or_default();
        for account_id in accounts {
            tx.execute(
                "INSERT OR IGNORE INTO goal_accounts (goal_id, account_id)
                 SELECT ?1, id FROM accounts WHERE id = ?2",
                params![goal_id, account_id],
            )?;
        }
    }
    tx.execute_batch("ALTER TABLE savings_goals DROP COLUMN target_accounts;")?;

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    info!(
        "v1 migration: {} signatures backfilled, {} transfers linked, {} goals moved",
        rows.len(),
        paired,
        goals.len()
    );
    Ok(())
}
