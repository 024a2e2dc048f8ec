//! Atomic ingestion of transaction batches
//!
//! Manual entry, edits, spreadsheet imports and transfers all go through
//! [`Database::ingest`]. A batch is validated up front, then resolved, written
//! and committed inside one SQL transaction. Any failure after validation
//! drops the transaction, so no row of the batch is ever visible on error.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::{format_instant, Database};
use crate::dedup::signature;
use crate::error::{is_constraint_violation, Error, IngestError, Result, RowError};
use crate::models::{NewEntry, NewTransaction, NewTransfer, Transaction, TransferRequest};
use crate::resolver::ResolutionPlan;

/// Outcome of a committed batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Transaction rows created
    pub inserted: usize,
    /// Transaction rows overwritten by id
    pub updated: usize,
    /// Transfer links written
    pub transfers: usize,
    pub created_accounts: Vec<String>,
    pub created_categories: Vec<String>,
}

/// Reject malformed rows before anything touches the store
fn validate(entries: &[NewEntry]) -> std::result::Result<(), IngestError> {
    let mut errors = Vec::new();
    let mut ids: HashSet<&str> = HashSet::new();

    for (row, entry) in entries.iter().enumerate() {
        let mut fail = |message: String| errors.push(RowError { row, message });

        if let NewEntry::Transfer(t) = entry {
            if t.id.trim().is_empty() {
                fail("transfer id is empty".into());
            }
            if t.source.amount >= rust_decimal::Decimal::ZERO {
                fail("transfer source leg must be negative".into());
            }
            if t.dest.amount <= rust_decimal::Decimal::ZERO {
                fail("transfer destination leg must be positive".into());
            }
            if t.source.amount.abs() != t.dest.amount.abs() {
                fail("transfer legs differ in magnitude".into());
            }
        }

        for leg in entry.legs() {
            if leg.id.trim().is_empty() {
                fail("id is empty".into());
            } else if !ids.insert(leg.id.as_str()) {
                fail(format!("id '{}' appears more than once in the batch", leg.id));
            }
            if leg.description.trim().is_empty() {
                fail("description is empty".into());
            }
            if leg.amount.is_zero() {
                fail("amount is zero".into());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(IngestError::Validation(errors))
    }
}

fn constraint(row: usize, err: rusqlite::Error) -> Error {
    if is_constraint_violation(&err) {
        IngestError::ConstraintViolation {
            row: Some(row),
            message: err.to_string(),
        }
        .into()
    } else {
        Error::Database(err)
    }
}

/// Upsert one leg; returns true when the row is new
fn write_leg(
    conn: &Connection,
    plan: &ResolutionPlan,
    row: usize,
    leg: &NewTransaction,
) -> Result<(bool, String)> {
    let account_id = plan.account_id(&leg.account)?.to_string();
    let category_id = plan.category_id(&leg.category, leg.kind)?;

    let exists = conn
        .query_row(
            "SELECT 1 FROM transactions WHERE id = ?",
            params![leg.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        r#"
        INSERT INTO transactions (id, date, description, amount, kind, account_id, category_id, signature)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            date = excluded.date,
            description = excluded.description,
            amount = excluded.amount,
            kind = excluded.kind,
            account_id = excluded.account_id,
            category_id = excluded.category_id,
            signature = excluded.signature
        "#,
        params![
            leg.id,
            format_instant(leg.date),
            leg.description.trim(),
            leg.amount.to_string(),
            leg.kind.as_str(),
            account_id,
            category_id,
            signature(leg),
        ],
    )
    .map_err(|e| constraint(row, e))?;

    Ok((!exists, account_id))
}

fn leg_is_linked(conn: &Connection, id: &str, except_link: Option<&str>) -> Result<bool> {
    let link: Option<String> = conn
        .query_row(
            "SELECT id FROM transfers WHERE source_leg_id = ?1 OR dest_leg_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (link, except_link) {
        (Some(link), Some(except)) => link != except,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

/// Remove legs an existing transfer no longer points at
///
/// Re-submitting a transfer id with new leg ids replaces the old legs, so the
/// transfer stays exactly two linked rows.
fn drop_replaced_legs(conn: &Connection, transfer: &NewTransfer) -> Result<()> {
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT source_leg_id, dest_leg_id FROM transfers WHERE id = ?",
            params![transfer.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((old_source, old_dest)) = existing else {
        return Ok(());
    };

    let keep = [transfer.source.id.as_str(), transfer.dest.id.as_str()];
    let stale: Vec<String> = [old_source, old_dest]
        .into_iter()
        .filter(|id| !keep.contains(&id.as_str()))
        .collect();
    if stale.is_empty() {
        return Ok(());
    }

    conn.execute("DELETE FROM transfers WHERE id = ?", params![transfer.id])?;
    for id in &stale {
        conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
    }
    debug!("Transfer {} replaced {} leg(s)", transfer.id, stale.len());
    Ok(())
}

fn write_transfer(
    conn: &Connection,
    plan: &ResolutionPlan,
    row: usize,
    transfer: &NewTransfer,
    report: &mut IngestReport,
) -> Result<()> {
    for leg in [&transfer.source, &transfer.dest] {
        if leg_is_linked(conn, &leg.id, Some(&transfer.id))? {
            return Err(IngestError::ConstraintViolation {
                row: Some(row),
                message: format!("transaction '{}' already belongs to another transfer", leg.id),
            }
            .into());
        }
    }

    drop_replaced_legs(conn, transfer)?;

    let (source_new, source_account) = write_leg(conn, plan, row, &transfer.source)?;
    let (dest_new, dest_account) = write_leg(conn, plan, row, &transfer.dest)?;
    if source_account == dest_account {
        return Err(IngestError::ConstraintViolation {
            row: Some(row),
            message: "transfer source and destination are the same account".into(),
        }
        .into());
    }

    conn.execute(
        r#"
        INSERT INTO transfers (id, source_leg_id, dest_leg_id) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            source_leg_id = excluded.source_leg_id,
            dest_leg_id = excluded.dest_leg_id
        "#,
        params![transfer.id, transfer.source.id, transfer.dest.id],
    )
    .map_err(|e| constraint(row, e))?;

    for new in [source_new, dest_new] {
        if new {
            report.inserted += 1;
        } else {
            report.updated += 1;
        }
    }
    report.transfers += 1;
    Ok(())
}

impl Database {
    /// Persist a batch atomically
    ///
    /// Rows are upserted by id, so re-submitting an existing id edits it.
    /// Transfers are written with both legs and their link, and must resolve
    /// to two different accounts. Any error leaves the store untouched.
    pub fn ingest(&mut self, entries: Vec<NewEntry>) -> Result<IngestReport> {
        validate(&entries)?;
        if entries.is_empty() {
            return Ok(IngestReport::default());
        }

        let report = self.in_transaction(|conn| {
            let mut plan = ResolutionPlan::build(conn, &entries)?;
            plan.apply(conn)?;

            let mut report = IngestReport {
                created_accounts: plan.created_account_names(),
                created_categories: plan.created_category_names(),
                ..Default::default()
            };

            for (row, entry) in entries.iter().enumerate() {
                match entry {
                    NewEntry::Flow(tx) => {
                        if leg_is_linked(conn, &tx.id, None)? {
                            return Err(IngestError::ConstraintViolation {
                                row: Some(row),
                                message: format!(
                                    "transaction '{}' is a transfer leg; edit the transfer instead",
                                    tx.id
                                ),
                            }
                            .into());
                        }
                        let (new, _) = write_leg(conn, &plan, row, tx)?;
                        if new {
                            report.inserted += 1;
                        } else {
                            report.updated += 1;
                        }
                    }
                    NewEntry::Transfer(transfer) => {
                        write_transfer(conn, &plan, row, transfer, &mut report)?
                    }
                }
            }

            debug!("Batch of {} entries written, committing", entries.len());
            Ok(report)
        })?;

        info!(
            "Ingested {} new, {} updated, {} transfer(s)",
            report.inserted, report.updated, report.transfers
        );
        Ok(report)
    }

    /// Ingest plain transactions
    pub fn ingest_transactions(&mut self, batch: Vec<NewTransaction>) -> Result<IngestReport> {
        self.ingest(batch.into_iter().map(NewEntry::from).collect())
    }

    /// Record a single transaction and return the stored row
    pub fn add_transaction(&mut self, tx: NewTransaction) -> Result<Transaction> {
        let id = tx.id.clone();
        self.ingest(vec![NewEntry::Flow(tx)])?;
        self.get_transaction(&id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))
    }

    /// Record a transfer between two accounts; returns the transfer id
    pub fn add_transfer(&mut self, request: TransferRequest) -> Result<String> {
        let transfer = NewTransfer::new(request);
        let id = transfer.id.clone();
        self.ingest(vec![NewEntry::Transfer(transfer)])?;
        Ok(id)
    }
}
