//! Per-account running balances
//!
//! Balances are always recomputed from the full history. Transactions are
//! ordered once by `(date, id)`; the id tiebreak keeps same-instant rows
//! (transfer pairs, rapid manual entries) reproducible. The descending view
//! is the exact reverse of the computation order.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::models::Transaction;

/// A transaction annotated with its account's balance after it applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub balance_after: Decimal,
}

fn chronological(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    ordered
}

/// Running balances in ascending `(date, id)` order
pub fn compute_balances(transactions: &[Transaction]) -> Vec<BalancedTransaction> {
    let mut running: HashMap<&str, Decimal> = HashMap::new();

    chronological(transactions)
        .into_iter()
        .map(|tx| {
            let balance = running.entry(tx.account_id.as_str()).or_default();
            *balance += tx.amount;
            BalancedTransaction {
                transaction: tx.clone(),
                balance_after: *balance,
            }
        })
        .collect()
}

/// The display order: newest first, the reverse of [`compute_balances`]
pub fn compute_balances_desc(transactions: &[Transaction]) -> Vec<BalancedTransaction> {
    let mut balanced = compute_balances(transactions);
    balanced.reverse();
    balanced
}

/// Final balance per account id
pub fn account_totals(transactions: &[Transaction]) -> HashMap<String, Decimal> {
    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for tx in transactions {
        *totals.entry(tx.account_id.clone()).or_default() += tx.amount;
    }
    totals
}

impl Database {
    /// Running balances for one account, newest first
    pub fn account_ledger(&self, account_id: &str) -> Result<Vec<BalancedTransaction>> {
        Ok(compute_balances_desc(&self.account_transactions(account_id)?))
    }

    /// Current balance of one account
    pub fn current_balance(&self, account_id: &str) -> Result<Decimal> {
        Ok(self
            .account_transactions(account_id)?
            .iter()
            .map(|tx| tx.amount)
            .sum())
    }
}
