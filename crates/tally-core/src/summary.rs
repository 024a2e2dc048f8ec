//! Period aggregates
//!
//! Only income and expense rows count. Transfer legs cancel out across
//! accounts and balance adjustments are not flows, so both are excluded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::fiscal::{Period, PeriodKey};
use crate::models::{Transaction, TransactionKind, UNCATEGORIZED_LABEL};

/// Total for one category within a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub kind: TransactionKind,
    /// Absolute amount
    pub total: Decimal,
    pub count: usize,
}

/// Income/expense picture of a resolved period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub income: Decimal,
    /// Absolute amount spent
    pub expense: Decimal,
    pub net: Decimal,
    pub transaction_count: usize,
    /// Largest totals first
    pub by_category: Vec<CategoryTotal>,
}

/// Summarize `history` within `period`; `category_names` maps ids to display names
pub fn summarize(
    period: Period,
    history: &[Transaction],
    category_names: &HashMap<String, String>,
) -> PeriodSummary {
    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    let mut count = 0;
    let mut by_category: HashMap<(String, TransactionKind), (Decimal, usize)> = HashMap::new();

    for tx in period.filter(history) {
        if !tx.kind.is_flow() {
            continue;
        }
        count += 1;
        match tx.kind {
            TransactionKind::Income => income += tx.amount,
            _ => expense += -tx.amount,
        }

        let name = tx
            .category_id
            .as_ref()
            .and_then(|id| category_names.get(id))
            .cloned()
            .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_string());
        let slot = by_category.entry((name, tx.kind)).or_default();
        slot.0 += tx.amount.abs();
        slot.1 += 1;
    }

    let mut by_category: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|((category, kind), (total, count))| CategoryTotal {
            category,
            kind,
            total,
            count,
        })
        .collect();
    by_category.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });

    PeriodSummary {
        period,
        income,
        expense,
        net: income - expense,
        transaction_count: count,
        by_category,
    }
}

impl Database {
    /// Resolve `key` under the stored fiscal policy and summarize it
    pub fn period_summary(&self, key: PeriodKey, now: DateTime<Utc>) -> Result<PeriodSummary> {
        let history = self.all_transactions()?;
        let period = crate::fiscal::resolve(key, &self.fiscal_config()?, &history, now)?;
        let names = self
            .list_categories()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        Ok(summarize(period, &history, &names))
    }
}
