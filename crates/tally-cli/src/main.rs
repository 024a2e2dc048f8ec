//! Tally CLI - Personal finance ledger
//!
//! Usage:
//!   tally init                     Create the ledger snapshot
//!   tally import --file CSV        Import transactions (duplicates skipped)
//!   tally add "Coffee" -4.50       Record a transaction
//!   tally period 2024-03           Summarize a period

mod cli;
mod commands;


use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tally_core::{FiscalConfig, TallySettings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let settings = TallySettings::load(cli.data_dir.clone()).context("Failed to load settings")?;
    let now = Utc::now();

    if matches!(cli.command, Commands::Init) {
        return commands::cmd_init(&settings, cli.no_encrypt);
    }

    let mut book = commands::open_book(&settings, cli.no_encrypt)?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Add {
            description,
            amount,
            date,
            account,
            category,
            kind,
        } => commands::cmd_add(
            &mut book,
            commands::AddArgs {
                description: &description,
                amount: &amount,
                date: date.as_deref(),
                account: account.as_deref(),
                category: category.as_deref(),
                kind: kind.as_deref(),
            },
            now,
        )
        .map(|_| ()),
        Commands::Transfer {
            from,
            to,
            amount,
            description,
            date,
            category,
        } => commands::cmd_transfer(
            &mut book,
            commands::TransferArgs {
                from: &from,
                to: &to,
                amount: &amount,
                description: &description,
                date: date.as_deref(),
                category: category.as_deref(),
            },
            now,
        )
        .map(|_| ()),
        Commands::Import {
            file,
            account,
            include_duplicates,
        } => commands::cmd_import(&mut book, &file, account, include_duplicates).map(|_| ()),
        Commands::Transactions { action } => match action {
            None => commands::cmd_transactions_list(book.db(), 20).map(|_| ()),
            Some(TransactionsAction::List { limit }) => {
                commands::cmd_transactions_list(book.db(), limit).map(|_| ())
            }
            Some(TransactionsAction::Search { query, limit }) => {
                commands::cmd_transactions_search(book.db(), &query, limit).map(|_| ())
            }
            Some(TransactionsAction::Delete { id }) => {
                commands::cmd_transactions_delete(&mut book, &id).map(|_| ())
            }
        },
        Commands::Accounts { action } => match action {
            None | Some(AccountsAction::List) => commands::cmd_accounts_list(book.db()),
            Some(AccountsAction::Add { name, savings }) => {
                commands::cmd_accounts_add(&mut book, &name, savings)
            }
            Some(AccountsAction::Rename { name, new_name }) => {
                commands::cmd_accounts_rename(&mut book, &name, &new_name)
            }
            Some(AccountsAction::Delete { name }) => commands::cmd_accounts_delete(&mut book, &name),
            Some(AccountsAction::Savings { name, off }) => {
                commands::cmd_accounts_savings(&mut book, &name, !off)
            }
        },
        Commands::Categories { action } => match action {
            None | Some(CategoriesAction::List) => commands::cmd_categories_list(book.db()),
            Some(CategoriesAction::Add { name, kind, group }) => {
                commands::cmd_categories_add(&mut book, &name, &kind, &group)
            }
            Some(CategoriesAction::Rename {
                name,
                new_name,
                kind,
            }) => commands::cmd_categories_rename(&mut book, &name, &new_name, &kind),
            Some(CategoriesAction::Delete { name, kind }) => {
                commands::cmd_categories_delete(&mut book, &name, &kind)
            }
        },
        Commands::Balances { account, period } => {
            let period = period
                .as_deref()
                .map(|p| commands::parse_period(Some(p), now))
                .transpose()?;
            commands::cmd_balances(book.db(), account.as_deref(), period, now)
        }
        Commands::Period { key } => {
            let key = commands::parse_period(key.as_deref(), now)?;
            commands::cmd_period(book.db(), key, now).map(|_| ())
        }
        Commands::Fiscal { action } => match action {
            None | Some(FiscalAction::Show) => commands::cmd_fiscal_show(book.db()).map(|_| ()),
            Some(FiscalAction::Calendar) => {
                commands::cmd_fiscal_set(&mut book, FiscalConfig::calendar())
            }
            Some(FiscalAction::FixedDay { day }) => {
                commands::cmd_fiscal_set(&mut book, FiscalConfig::fixed_day(day))
            }
            Some(FiscalAction::IncomeTrigger { category }) => {
                let config = commands::income_trigger_config(book.db(), &category)?;
                commands::cmd_fiscal_set(&mut book, config)
            }
        },
        Commands::Goals { action } => match action {
            None | Some(GoalsAction::List) => commands::cmd_goals_list(book.db()),
            Some(GoalsAction::Add {
                name,
                target,
                deadline,
                accounts,
            }) => commands::cmd_goals_add(&mut book, &name, &target, deadline.as_deref(), &accounts)
                .map(|_| ()),
            Some(GoalsAction::Edit {
                id,
                name,
                target,
                deadline,
                no_deadline,
                accounts,
            }) => commands::cmd_goals_edit(
                &mut book,
                &id,
                commands::GoalEdit {
                    name: name.as_deref(),
                    target: target.as_deref(),
                    deadline: deadline.as_deref(),
                    clear_deadline: no_deadline,
                    accounts: &accounts,
                },
            )
            .map(|_| ()),
            Some(GoalsAction::Delete { id }) => commands::cmd_goals_delete(&mut book, &id),
        },
        Commands::Query { sql } => commands::cmd_query(book.db(), &sql).map(|_| ()),
        Commands::Backup { action } => {
            let password = commands::effective_password(&settings, cli.no_encrypt);
            match action {
                BackupAction::Export { out } => commands::cmd_backup_export(
                    &book,
                    password.as_deref(),
                    &out.unwrap_or_else(|| settings.data_dir.join("backups")),
                    now.date_naive(),
                )
                .map(|_| ()),
                BackupAction::Restore { file } => {
                    commands::cmd_backup_restore(&mut book, &file, password.as_deref())
                }
            }
        }
        Commands::Reset { yes } => commands::cmd_reset(&mut book, yes).map(|_| ()),
        Commands::Insights { period } => {
            let key = commands::parse_period(period.as_deref(), now)?;
            commands::cmd_insights(book.db(), &settings.insights, key, now)
                .await
                .map(|_| ())
        }
    }
}
