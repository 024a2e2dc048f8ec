//! Account, category and savings goal commands

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::import::parse_amount;
use tally_core::{Book, Category, CategoryGroup, Database, SavingsGoal, TransactionKind};

use super::{require_account, truncate, Names};

// ========== Accounts ==========

pub fn cmd_accounts_list(db: &Database) -> Result<()> {
    let accounts = db.list_accounts()?;
    if accounts.is_empty() {
        println!("No accounts yet.");
        return Ok(());
    }

    println!("{:<24}  {:>14}  {:>6}  {}", "Account", "Balance", "Rows", "Savings");
    println!("{}", "-".repeat(60));
    for account in accounts {
        println!(
            "{:<24}  {:>14}  {:>6}  {}",
            truncate(&account.name, 24),
            db.current_balance(&account.id)?.to_string(),
            db.count_account_references(&account.id)?,
            if account.is_savings { "yes" } else { "" }
        );
    }
    Ok(())
}

pub fn cmd_accounts_add(book: &mut Book, name: &str, savings: bool) -> Result<()> {
    let account = book.mutate(|db| db.create_account(name, savings))?;
    println!("✅ Created account '{}'", account.name);
    Ok(())
}

pub fn cmd_accounts_rename(book: &mut Book, name: &str, new_name: &str) -> Result<()> {
    let account = require_account(book.db(), name)?;
    book.mutate(|db| db.rename_account(&account.id, new_name))?;
    println!("✅ Renamed account '{}' to '{}'", name, new_name.trim());
    Ok(())
}

pub fn cmd_accounts_delete(book: &mut Book, name: &str) -> Result<()> {
    let account = require_account(book.db(), name)?;
    book.mutate(|db| db.delete_account(&account.id))
        .with_context(|| format!("Cannot delete account '{}'", name))?;
    println!("🗑️  Deleted account '{}'", name);
    Ok(())
}

pub fn cmd_accounts_savings(book: &mut Book, name: &str, is_savings: bool) -> Result<()> {
    let account = require_account(book.db(), name)?;
    book.mutate(|db| db.set_account_savings(&account.id, is_savings))?;
    if is_savings {
        println!("🏦 '{}' is now a savings account", name);
    } else {
        println!("'{}' is no longer a savings account", name);
    }
    Ok(())
}

// ========== Categories ==========

fn parse_kind(kind: &str) -> Result<TransactionKind> {
    kind.parse::<TransactionKind>().map_err(anyhow::Error::msg)
}

fn require_category(db: &Database, name: &str, kind: &str) -> Result<Category> {
    let kind = parse_kind(kind)?;
    db.find_category(name, kind)?
        .with_context(|| format!("Category not found: {} ({})", name, kind))
}

pub fn cmd_categories_list(db: &Database) -> Result<()> {
    let categories = db.list_categories()?;
    if categories.is_empty() {
        println!("No categories yet.");
        return Ok(());
    }

    println!("{:<24}  {:<9}  {:<10}  {:>6}", "Category", "Kind", "Group", "Rows");
    println!("{}", "-".repeat(56));
    for c in categories {
        println!(
            "{:<24}  {:<9}  {:<10}  {:>6}",
            truncate(&c.name, 24),
            c.kind.as_str(),
            c.group.as_str(),
            db.count_category_references(&c.id)?
        );
    }
    Ok(())
}

pub fn cmd_categories_add(book: &mut Book, name: &str, kind: &str, group: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let group = group.parse::<CategoryGroup>().map_err(anyhow::Error::msg)?;
    let category = book.mutate(|db| db.create_category(name, kind, group))?;
    println!("✅ Created {} category '{}'", category.kind, category.name);
    Ok(())
}

pub fn cmd_categories_rename(book: &mut Book, name: &str, new_name: &str, kind: &str) -> Result<()> {
    let category = require_category(book.db(), name, kind)?;
    book.mutate(|db| db.rename_category(&category.id, new_name))?;
    println!("✅ Renamed category '{}' to '{}'", name, new_name.trim());
    Ok(())
}

pub fn cmd_categories_delete(book: &mut Book, name: &str, kind: &str) -> Result<()> {
    let category = require_category(book.db(), name, kind)?;
    book.mutate(|db| db.delete_category(&category.id))
        .with_context(|| format!("Cannot delete category '{}'", name))?;
    println!("🗑️  Deleted category '{}'", name);
    Ok(())
}

// ========== Goals ==========

pub fn cmd_goals_list(db: &Database) -> Result<()> {
    let progress = db.goal_progress()?;
    if progress.is_empty() {
        println!("No savings goals yet.");
        return Ok(());
    }

    let names = Names::load(db)?;
    for p in progress {
        let deadline = p
            .goal
            .deadline
            .map(|d| format!(" by {}", d))
            .unwrap_or_default();
        println!(
            "🎯 {} ({}%): {} of {}{}",
            p.goal.name, p.percent, p.saved, p.goal.target_amount, deadline
        );
        let accounts: Vec<&str> = p
            .goal
            .target_accounts
            .iter()
            .map(|id| names.account(id))
            .collect();
        println!("   Accounts: {}", accounts.join(", "));
        println!("   ID: {}", p.goal.id);
    }
    Ok(())
}

fn parse_target(target: &str) -> Result<Decimal> {
    parse_amount(target).with_context(|| format!("Invalid amount: {}", target))
}

fn parse_deadline(deadline: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(deadline, "%Y-%m-%d")
        .with_context(|| format!("Invalid deadline: {}", deadline))
}

fn account_ids(db: &Database, names: &[String]) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| require_account(db, name).map(|a| a.id))
        .collect()
}

pub fn cmd_goals_add(
    book: &mut Book,
    name: &str,
    target: &str,
    deadline: Option<&str>,
    accounts: &[String],
) -> Result<SavingsGoal> {
    let target = parse_target(target)?;
    let deadline = deadline.map(parse_deadline).transpose()?;
    let account_ids = account_ids(book.db(), accounts)?;

    let goal = book.mutate(|db| db.create_goal(name, target, deadline, &account_ids))?;
    println!("✅ Created goal '{}' ({})", goal.name, goal.target_amount);
    Ok(goal)
}

pub fn cmd_goals_delete(book: &mut Book, id: &str) -> Result<()> {
    book.mutate(|db| db.delete_goal(id))?;
    println!("🗑️  Deleted goal {}", id);
    Ok(())
}

/// Changes for `goals edit`; `None` keeps the stored value
#[derive(Default)]
pub struct GoalEdit<'a> {
    pub name: Option<&'a str>,
    pub target: Option<&'a str>,
    pub deadline: Option<&'a str>,
    pub clear_deadline: bool,
    pub accounts: &'a [String],
}

pub fn cmd_goals_edit(book: &mut Book, id: &str, edit: GoalEdit<'_>) -> Result<SavingsGoal> {
    let current = book
        .db()
        .get_goal(id)?
        .with_context(|| format!("Savings goal not found: {}", id))?;

    let name = edit.name.unwrap_or(&current.name).to_string();
    let target = edit
        .target
        .map(parse_target)
        .transpose()?
        .unwrap_or(current.target_amount);
    let deadline = match edit.deadline {
        Some(d) => Some(parse_deadline(d)?),
        None if edit.clear_deadline => None,
        None => current.deadline,
    };
    let accounts = if edit.accounts.is_empty() {
        current.target_accounts
    } else {
        account_ids(book.db(), edit.accounts)?
    };

    let goal = book.mutate(|db| db.update_goal(id, &name, target, deadline, &accounts))?;
    println!("✅ Updated goal '{}' ({})", goal.name, goal.target_amount);
    Ok(goal)
}
