//! Explicit transfer links and the paired ledger view

use std::collections::{HashMap, HashSet};

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{LedgerEntry, Transaction};

/// A stored link between the two legs of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLink {
    pub id: String,
    pub source_leg_id: String,
    pub dest_leg_id: String,
}

impl Database {
    /// All transfer links
    pub fn list_transfer_links(&self) -> Result<Vec<TransferLink>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, source_leg_id, dest_leg_id FROM transfers ORDER BY id")?;
        let links = stmt
            .query_map([], |row| {
                Ok(TransferLink {
                    id: row.get(0)?,
                    source_leg_id: row.get(1)?,
                    dest_leg_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// The link a transaction belongs to, if it is a transfer leg
    pub fn transfer_for_leg(&self, leg_id: &str) -> Result<Option<TransferLink>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, source_leg_id, dest_leg_id FROM transfers
                 WHERE source_leg_id = ?1 OR dest_leg_id = ?1",
                params![leg_id],
                |row| {
                    Ok(TransferLink {
                        id: row.get(0)?,
                        source_leg_id: row.get(1)?,
                        dest_leg_id: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// The ledger as entries: linked legs collapse into one `Transfer` entry.
    ///
    /// Chronological, a transfer placed at its source leg.
    pub fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let txs = self.all_transactions()?;
        let links = self.list_transfer_links()?;

        let mut by_id: HashMap<String, Transaction> =
            txs.iter().cloned().map(|t| (t.id.clone(), t)).collect();
        let mut link_by_source: HashMap<&str, &TransferLink> = HashMap::new();
        let mut dest_legs: HashSet<&str> = HashSet::new();
        for link in &links {
            link_by_source.insert(link.source_leg_id.as_str(), link);
            dest_legs.insert(link.dest_leg_id.as_str());
        }

        let mut entries = Vec::with_capacity(txs.len());
        for tx in &txs {
            if dest_legs.contains(tx.id.as_str()) {
                continue;
            }
            match link_by_source.get(tx.id.as_str()) {
                Some(link) => {
                    let source = by_id.remove(&link.source_leg_id);
                    let dest = by_id.remove(&link.dest_leg_id);
                    if let (Some(source), Some(dest)) = (source, dest) {
                        entries.push(LedgerEntry::Transfer {
                            id: link.id.clone(),
                            source,
                            dest,
                        });
                    }
                }
                None => entries.push(LedgerEntry::Flow(tx.clone())),
            }
        }
        Ok(entries)
    }
}
