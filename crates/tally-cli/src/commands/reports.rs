//! Report commands: balances, period summary, fiscal policy, ad-hoc query

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tally_core::{
    compute_balances_desc, Book, Database, FiscalConfig, FiscalMode, PeriodKey, PeriodSummary,
    TransactionKind,
};

use super::{require_account, truncate, Names};

pub fn cmd_balances(
    db: &Database,
    account: Option<&str>,
    period: Option<PeriodKey>,
    now: DateTime<Utc>,
) -> Result<()> {
    let rows = match account {
        Some(name) => db.account_ledger(&require_account(db, name)?.id)?,
        None => compute_balances_desc(&db.all_transactions()?),
    };
    let window = period.map(|key| db.resolve_period(key, now)).transpose()?;

    if let Some(window) = &window {
        println!("📅 {}\n", window.label);
    }

    let names = Names::load(db)?;
    println!(
        "{:<10}  {:<30}  {:>12}  {:>14}  {}",
        "Date", "Description", "Amount", "Balance", "Account"
    );
    println!("{}", "-".repeat(90));
    for row in rows
        .iter()
        .filter(|r| window.as_ref().map_or(true, |w| w.contains(r.transaction.date)))
    {
        let tx = &row.transaction;
        println!(
            "{:<10}  {:<30}  {:>12}  {:>14}  {}",
            tx.date.format("%Y-%m-%d"),
            truncate(&tx.description, 30),
            tx.amount.to_string(),
            row.balance_after.to_string(),
            names.account(&tx.account_id)
        );
    }
    Ok(())
}

pub fn print_summary(summary: &PeriodSummary) {
    println!("📅 {}", summary.period.label);
    println!();
    println!("   Income:   {:>12}", summary.income.to_string());
    println!("   Expenses: {:>12}", summary.expense.to_string());
    println!("   Net:      {:>12}", summary.net.to_string());
    println!("   ({} transaction(s))", summary.transaction_count);

    if summary.by_category.is_empty() {
        return;
    }
    println!();
    for kind in [TransactionKind::Income, TransactionKind::Expense] {
        let rows: Vec<_> = summary
            .by_category
            .iter()
            .filter(|c| c.kind == kind)
            .collect();
        if rows.is_empty() {
            continue;
        }
        println!("   {}:", if kind == TransactionKind::Income { "Income" } else { "Spending" });
        for c in rows {
            println!(
                "     {:<24} {:>12}  ({})",
                truncate(&c.category, 24),
                c.total.to_string(),
                c.count
            );
        }
    }
}

pub fn cmd_period(db: &Database, key: PeriodKey, now: DateTime<Utc>) -> Result<PeriodSummary> {
    let summary = db
        .period_summary(key, now)
        .with_context(|| format!("Failed to summarize period {}", key))?;
    print_summary(&summary);
    Ok(summary)
}

pub fn cmd_fiscal_show(db: &Database) -> Result<FiscalConfig> {
    let config = db.fiscal_config()?;
    match &config.mode {
        FiscalMode::Calendar => println!("Fiscal periods: calendar months"),
        FiscalMode::FixedDay { start_day } => {
            println!("Fiscal periods: start on day {} of each month", start_day)
        }
        FiscalMode::IncomeTrigger { trigger_category } => {
            let names = Names::load(db)?;
            println!(
                "Fiscal periods: start at the first '{}' income of each month",
                names.category(Some(trigger_category.as_str()))
            );
        }
    }
    Ok(config)
}

pub fn cmd_fiscal_set(book: &mut Book, config: FiscalConfig) -> Result<()> {
    book.mutate(|db| db.set_fiscal_config(&config))
        .context("Failed to update fiscal policy")?;
    println!("✅ Fiscal policy set to {}", config.mode);
    Ok(())
}

/// Resolve an income category by name for the income-trigger policy
pub fn income_trigger_config(db: &Database, category: &str) -> Result<FiscalConfig> {
    let found = db
        .find_category(category, TransactionKind::Income)?
        .with_context(|| format!("Income category not found: {}", category))?;
    Ok(FiscalConfig::income_trigger(found.id))
}

pub fn cmd_query(db: &Database, sql: &str) -> Result<usize> {
    let result = db.run_query(sql)?;

    println!("{}", result.columns.join(" | "));
    println!("{}", "-".repeat(result.columns.join(" | ").len().max(3)));
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    println!("\n({} row(s))", result.rows.len());
    Ok(result.rows.len())
}
