//! Backup export/restore and reset

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::Book;

pub fn cmd_backup_export(
    book: &Book,
    password: Option<&str>,
    out_dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

    let (name, bytes) = book
        .export_backup(password, today)
        .context("Failed to export backup")?;
    let path = out_dir.join(&name);
    fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;

    let stats = book.db().stats()?;
    println!("✅ Backup created: {}", name);
    println!("   Location: {}", path.display());
    println!("   Size: {} bytes", bytes.len());
    println!("   Accounts: {}", stats.accounts);
    println!("   Transactions: {}", stats.transactions);
    if password.is_some() {
        println!("   🔒 Encrypted (same password required to restore)");
    }
    Ok(path)
}

pub fn cmd_backup_restore(book: &mut Book, file: &Path, password: Option<&str>) -> Result<()> {
    let blob =
        fs::read(file).with_context(|| format!("Failed to read backup: {}", file.display()))?;

    let stats = book
        .restore(&blob, password)
        .context("Restore failed; the current ledger was kept")?;

    println!("✅ Restored from {}", file.display());
    println!("   Accounts: {}", stats.accounts);
    println!("   Categories: {}", stats.categories);
    println!("   Transactions: {}", stats.transactions);
    println!("   Transfers: {}", stats.transfers);
    Ok(())
}

pub fn cmd_reset(book: &mut Book, yes: bool) -> Result<bool> {
    if !yes {
        print!("⚠️  This will delete all accounts, categories, transactions and goals.\n");
        print!("   Fiscal settings will be preserved.\n\n");
        print!("Are you sure? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(false);
        }
    }

    book.reset().context("Failed to reset ledger")?;
    println!("✅ Ledger reset complete.");
    Ok(true)
}
