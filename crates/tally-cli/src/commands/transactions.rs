//! Transaction commands: add, transfer, list, search, delete

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tally_core::import::parse_amount;
use tally_core::{
    AccountRef, Book, CategoryRef, Database, NewTransaction, Transaction, TransactionKind,
    TransferRequest,
};

use super::{parse_when, truncate, Names};

pub struct AddArgs<'a> {
    pub description: &'a str,
    pub amount: &'a str,
    pub date: Option<&'a str>,
    pub account: Option<&'a str>,
    pub category: Option<&'a str>,
    pub kind: Option<&'a str>,
}

pub fn cmd_add(book: &mut Book, args: AddArgs<'_>, now: DateTime<Utc>) -> Result<Transaction> {
    let amount =
        parse_amount(args.amount).with_context(|| format!("Invalid amount: {}", args.amount))?;
    let date = parse_when(args.date, now)?;
    let kind = match args.kind {
        Some(k) => k.parse::<TransactionKind>().map_err(anyhow::Error::msg)?,
        None if amount.is_sign_negative() => TransactionKind::Expense,
        None => TransactionKind::Income,
    };
    if kind == TransactionKind::Transfer {
        anyhow::bail!("Use `tally transfer` to move money between accounts");
    }

    let mut candidate = NewTransaction::new(date, args.description, amount, kind);
    if let Some(account) = args.account {
        candidate = candidate.with_account(AccountRef::name(account));
    }
    if let Some(category) = args.category {
        candidate = candidate.with_category(CategoryRef::name(category));
    }

    let tx = book
        .mutate(|db| db.add_transaction(candidate))
        .context("Failed to add transaction")?;

    let names = Names::load(book.db())?;
    println!(
        "✅ Added {} {} to {} ({})",
        tx.kind,
        tx.amount,
        names.account(&tx.account_id),
        names.category(tx.category_id.as_deref())
    );
    println!("   ID: {}", tx.id);
    Ok(tx)
}

pub struct TransferArgs<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub amount: &'a str,
    pub description: &'a str,
    pub date: Option<&'a str>,
    pub category: Option<&'a str>,
}

pub fn cmd_transfer(book: &mut Book, args: TransferArgs<'_>, now: DateTime<Utc>) -> Result<String> {
    let amount =
        parse_amount(args.amount).with_context(|| format!("Invalid amount: {}", args.amount))?;
    let request = TransferRequest {
        date: parse_when(args.date, now)?,
        description: args.description.to_string(),
        amount,
        from: AccountRef::name(args.from),
        to: AccountRef::name(args.to),
        category: args.category.map(CategoryRef::name).unwrap_or_default(),
    };

    let id = book
        .mutate(|db| db.add_transfer(request))
        .context("Failed to record transfer")?;

    println!(
        "✅ Moved {} from {} to {}",
        amount.abs(),
        args.from,
        args.to
    );
    println!("   Transfer ID: {}", id);
    Ok(id)
}

fn print_rows(db: &Database, rows: &[Transaction]) -> Result<()> {
    let names = Names::load(db)?;
    println!(
        "{:<36}  {:<10}  {:<30}  {:>12}  {:<16}  {}",
        "ID", "Date", "Description", "Amount", "Account", "Category"
    );
    println!("{}", "-".repeat(130));
    for tx in rows {
        println!(
            "{:<36}  {:<10}  {:<30}  {:>12}  {:<16}  {}",
            tx.id,
            tx.date.format("%Y-%m-%d"),
            truncate(&tx.description, 30),
            tx.amount.to_string(),
            truncate(names.account(&tx.account_id), 16),
            names.category(tx.category_id.as_deref())
        );
    }
    Ok(())
}

pub fn cmd_transactions_list(db: &Database, limit: i64) -> Result<usize> {
    let rows = db.list_transactions(limit, 0)?;
    if rows.is_empty() {
        println!("No transactions yet. Try: tally import --file statement.csv");
        return Ok(0);
    }

    println!(
        "📋 Showing {} of {} transaction(s)\n",
        rows.len(),
        db.count_transactions()?
    );
    print_rows(db, &rows)?;
    Ok(rows.len())
}

pub fn cmd_transactions_search(db: &Database, query: &str, limit: i64) -> Result<usize> {
    let rows = db.search_transactions(query, limit)?;
    if rows.is_empty() {
        println!("No transactions match '{}'", query);
        return Ok(0);
    }

    println!("🔍 {} match(es) for '{}'\n", rows.len(), query);
    print_rows(db, &rows)?;
    Ok(rows.len())
}

pub fn cmd_transactions_delete(book: &mut Book, id: &str) -> Result<usize> {
    let removed = book
        .mutate(|db| db.delete_transaction(id))
        .with_context(|| format!("Failed to delete transaction {}", id))?;

    if removed > 1 {
        println!("🗑️  Deleted transfer ({} legs)", removed);
    } else {
        println!("🗑️  Deleted transaction {}", id);
    }
    Ok(removed)
}
