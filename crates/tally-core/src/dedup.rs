//! Signature-based duplicate detection for imports
//!
//! A signature is insensitive to time of day and to sign convention, so the
//! same bank line downloaded twice matches even if the exports disagree on
//! those. Two genuinely distinct same-day transactions with equal amount and
//! description are indistinguishable; they get flagged, never merged.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::Database;
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

/// Duplicate classification of one incoming row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DupStatus {
    /// Not seen before
    None,
    /// Matches a stored transaction
    InStore,
    /// Matches an earlier row of the same batch
    InBatch,
}

/// Signature from raw fields: day, absolute amount to cents, normalized description
pub fn signature_parts(date: DateTime<Utc>, amount: Decimal, description: &str) -> String {
    let mut magnitude = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    magnitude.rescale(2);

    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(magnitude.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(description.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Signature of an incoming candidate
pub fn signature(tx: &NewTransaction) -> String {
    signature_parts(tx.date, tx.amount, &tx.description)
}

impl Transaction {
    /// Signature of a stored row
    pub fn signature(&self) -> String {
        signature_parts(self.date, self.amount, &self.description)
    }
}

/// Classify each row of `batch` by id
///
/// Stored matches win over in-batch matches. The first occurrence of a
/// signature inside the batch stays `None`; later ones are `InBatch`.
pub fn classify(batch: &[NewTransaction], existing: &HashSet<String>) -> HashMap<String, DupStatus> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut statuses = HashMap::with_capacity(batch.len());

    for tx in batch {
        let sig = signature(tx);
        let status = if existing.contains(&sig) {
            DupStatus::InStore
        } else if !seen.insert(sig) {
            DupStatus::InBatch
        } else {
            DupStatus::None
        };
        statuses.insert(tx.id.clone(), status);
    }
    statuses
}

/// Apply the default keep-only-new policy, honouring per-row overrides
///
/// `overrides` maps a row id to an explicit keep (`true`) or skip (`false`).
pub fn select_for_import(
    batch: Vec<NewTransaction>,
    statuses: &HashMap<String, DupStatus>,
    overrides: &HashMap<String, bool>,
) -> Vec<NewTransaction> {
    batch
        .into_iter()
        .filter(|tx| match overrides.get(&tx.id) {
            Some(keep) => *keep,
            None => matches!(statuses.get(&tx.id), Some(DupStatus::None) | None),
        })
        .collect()
}

impl Database {
    /// Classify a batch against the signatures currently stored
    pub fn classify_batch(&self, batch: &[NewTransaction]) -> Result<HashMap<String, DupStatus>> {
        Ok(classify(batch, &self.existing_signatures()?))
    }
}
