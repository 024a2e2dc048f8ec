//! CSV import command

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    parse_csv, select_for_import, Book, ColumnMapping, DupStatus, Error, IngestReport,
};

pub fn cmd_import(
    book: &mut Book,
    file: &Path,
    account: Option<String>,
    include_duplicates: bool,
) -> Result<IngestReport> {
    println!("📥 Importing {}...", file.display());

    let reader =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let mapping = ColumnMapping {
        default_account: account,
        ..Default::default()
    };
    let batch = parse_csv(reader, &mapping).context("Failed to parse CSV")?;
    println!("   Parsed {} row(s)", batch.len());

    let statuses = book.db().classify_batch(&batch)?;
    let in_store = statuses
        .values()
        .filter(|s| **s == DupStatus::InStore)
        .count();
    let in_batch = statuses
        .values()
        .filter(|s| **s == DupStatus::InBatch)
        .count();
    if in_store + in_batch > 0 {
        println!(
            "   ⚠️  Possible duplicates: {} already in the ledger, {} repeated in the file",
            in_store, in_batch
        );
    }

    let overrides: HashMap<String, bool> = if include_duplicates {
        batch.iter().map(|tx| (tx.id.clone(), true)).collect()
    } else {
        HashMap::new()
    };
    let selected = select_for_import(batch, &statuses, &overrides);
    if selected.is_empty() {
        println!("✅ Nothing new to import");
        return Ok(IngestReport::default());
    }

    let report = book
        .mutate(|db| db.ingest_transactions(selected))
        .map_err(|e| {
            // Only the flush raises Storage; the batch is already committed in memory
            let message = match &e {
                Error::Storage(_) => "Imported, but the snapshot flush failed",
                _ => "Import failed; nothing was written",
            };
            anyhow::Error::new(e).context(message)
        })?;

    println!("✅ Imported {} transaction(s)", report.inserted);
    if !include_duplicates && in_store + in_batch > 0 {
        println!(
            "   Skipped {} duplicate(s) (use --include-duplicates to keep them)",
            in_store + in_batch
        );
    }
    if !report.created_accounts.is_empty() {
        println!("   New accounts: {}", report.created_accounts.join(", "));
    }
    if !report.created_categories.is_empty() {
        println!("   New categories: {}", report.created_categories.join(", "));
    }
    Ok(report)
}
