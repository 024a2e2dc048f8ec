//! Integration tests for tally-core
//!
//! These tests exercise the full import → dedup → ingest → persist workflow
//! through the public API.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use tally_core::{
    classify, parse_csv, select_for_import, AccountRef, Book, CategoryRef, ColumnMapping,
    Database, DupStatus, Error, FiscalConfig, IngestError, LocalStore, MemoryStore, NewEntry,
    NewTransaction, NewTransfer, PersistenceGateway, PeriodKey, TransactionKind, TransferRequest,
    DEFAULT_SNAPSHOT_KEY,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Bank export with one account column and an opening balance row
fn bank_csv() -> &'static str {
    r#"Date,Description,Amount,Category,Account,Type
2024-03-01,Opening balance,1500.00,,Checking,balance
2024-03-01,ACME Payroll,2500.00,Salary,Checking,
2024-03-03,Corner Grocer,-84.20,Groceries,Checking,
2024-03-05,Electric Co,-61.00,Utilities,Checking,
2024-03-09,Corner Grocer,-32.75,Groceries,Visa,
2024-03-12,Cinema,-18.00,Fun,Visa,"#
}

fn memory_book(password: Option<&str>) -> (MemoryStore, Book) {
    let store = MemoryStore::new();
    let gateway = PersistenceGateway::new(
        Box::new(store.clone()),
        DEFAULT_SNAPSHOT_KEY,
        password.map(String::from),
    );
    (store, Book::open(gateway).unwrap())
}

// =============================================================================
// Import workflow
// =============================================================================

#[test]
fn test_full_import_workflow() {
    let (_store, mut book) = memory_book(None);

    let batch = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    assert_eq!(batch.len(), 6);

    let statuses = book.db().classify_batch(&batch).unwrap();
    assert!(statuses.values().all(|s| *s == DupStatus::None));

    let report = book
        .mutate(|db| db.ingest_transactions(batch.clone()))
        .unwrap();
    assert_eq!(report.inserted, 6);
    assert_eq!(report.created_accounts.len(), 2);
    assert_eq!(report.created_categories.len(), 4);

    let checking = book
        .db()
        .find_account_by_name("Checking")
        .unwrap()
        .unwrap();
    assert_eq!(
        book.db().current_balance(&checking.id).unwrap(),
        dec("3854.80")
    );

    let now = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
    let summary = book
        .db()
        .period_summary(PeriodKey::current(now), now)
        .unwrap();
    assert_eq!(summary.income, dec("2500.00"));
    assert_eq!(summary.expense, dec("195.95"));
    assert_eq!(summary.transaction_count, 5);
}

#[test]
fn test_reimport_is_idempotent() {
    let mut db = Database::in_memory().unwrap();
    let first = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    db.ingest_transactions(first).unwrap();
    let count = db.count_transactions().unwrap();

    // Same file again: fresh ids, same signatures
    let second = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    let statuses = db.classify_batch(&second).unwrap();
    assert!(statuses.values().all(|s| *s == DupStatus::InStore));

    let keep = select_for_import(second, &statuses, &HashMap::new());
    assert!(keep.is_empty());
    db.ingest_transactions(keep).unwrap();
    assert_eq!(db.count_transactions().unwrap(), count);
}

#[test]
fn test_in_batch_duplicate_can_be_overridden() {
    let db = Database::in_memory().unwrap();
    let csv = "Date,Description,Amount\n2024-03-03,Coffee,-3.00\n2024-03-03,coffee ,-3.001\n";
    let batch = parse_csv(csv.as_bytes(), &ColumnMapping::default()).unwrap();

    let statuses = classify(&batch, &db.existing_signatures().unwrap());
    assert_eq!(statuses[&batch[0].id], DupStatus::None);
    assert_eq!(statuses[&batch[1].id], DupStatus::InBatch);

    let default_pick = select_for_import(batch.clone(), &statuses, &HashMap::new());
    assert_eq!(default_pick.len(), 1);

    let overrides: HashMap<String, bool> = [(batch[1].id.clone(), true)].into_iter().collect();
    assert_eq!(select_for_import(batch, &statuses, &overrides).len(), 2);
}

#[test]
fn test_failed_batch_writes_nothing() {
    let mut db = Database::in_memory().unwrap();
    let date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let good = NewTransaction::new(date, "Fine", dec("-5"), TransactionKind::Expense)
        .with_account(AccountRef::name("Checking"));
    let bad = NewTransaction::new(date, "  ", dec("0"), TransactionKind::Expense);

    match db.ingest_transactions(vec![good, bad]) {
        Err(Error::Ingest(IngestError::Validation(rows))) => {
            assert!(rows.iter().all(|r| r.row == 1));
            assert_eq!(rows.len(), 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(db.stats().unwrap().transactions, 0);
    assert_eq!(db.stats().unwrap().accounts, 0);

    // Same-account transfer resolves fine but violates the transfer rule
    let transfer = NewTransfer::new(TransferRequest {
        date,
        description: "Loop".into(),
        amount: dec("10"),
        from: AccountRef::name("Checking"),
        to: AccountRef::name("Checking"),
        category: CategoryRef::default(),
    });
    let result = db.ingest(vec![
        NewEntry::Flow(
            NewTransaction::new(date, "Before", dec("-1"), TransactionKind::Expense)
                .with_account(AccountRef::name("Visa")),
        ),
        NewEntry::Transfer(transfer),
    ]);
    assert!(matches!(
        result,
        Err(Error::Ingest(IngestError::ConstraintViolation { row: Some(1), .. }))
    ));
    assert_eq!(db.stats().unwrap().accounts, 0);
    assert_eq!(db.stats().unwrap().transactions, 0);
}

// =============================================================================
// Referential integrity
// =============================================================================

#[test]
fn test_referenced_entities_cannot_be_deleted() {
    let (_store, mut book) = memory_book(None);
    let batch = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    book.mutate(|db| db.ingest_transactions(batch)).unwrap();

    let visa = book.db().find_account_by_name("Visa").unwrap().unwrap();
    let err = book.mutate(|db| db.delete_account(&visa.id)).unwrap_err();
    assert!(matches!(err, Error::Referenced { references: 2, .. }));

    let groceries = book
        .db()
        .find_category("Groceries", TransactionKind::Expense)
        .unwrap()
        .unwrap();
    let err = book
        .mutate(|db| db.delete_category(&groceries.id))
        .unwrap_err();
    assert!(matches!(err, Error::Referenced { references: 2, .. }));

    // Nothing in the store points at a missing row
    let dangling: i64 = book
        .db()
        .conn()
        .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(dangling, 0);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_encrypted_snapshot_round_trip() {
    let (store, mut book) = memory_book(Some("correct horse"));
    let batch = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    book.mutate(|db| db.ingest_transactions(batch)).unwrap();
    book.mutate(|db| db.set_fiscal_config(&FiscalConfig::fixed_day(25)))
        .unwrap();

    let blob = store.get(DEFAULT_SNAPSHOT_KEY).unwrap();
    assert!(!tally_core::snapshot::is_plain_image(&blob));

    let reopened = Book::open(PersistenceGateway::new(
        Box::new(store.clone()),
        DEFAULT_SNAPSHOT_KEY,
        Some("correct horse".into()),
    ))
    .unwrap();
    assert_eq!(reopened.db().stats().unwrap(), book.db().stats().unwrap());
    assert_eq!(
        reopened.db().fiscal_config().unwrap(),
        FiscalConfig::fixed_day(25)
    );

    let wrong = Book::open(PersistenceGateway::new(
        Box::new(store.clone()),
        DEFAULT_SNAPSHOT_KEY,
        Some("battery staple".into()),
    ));
    assert!(matches!(wrong, Err(Error::Crypto)));

    let missing = Book::open(PersistenceGateway::new(
        Box::new(store),
        DEFAULT_SNAPSHOT_KEY,
        None,
    ));
    assert!(matches!(missing, Err(Error::Crypto)));
}

#[test]
fn test_local_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        Book::open(PersistenceGateway::new(
            Box::new(LocalStore::new(dir.path()).unwrap()),
            DEFAULT_SNAPSHOT_KEY,
            None,
        ))
        .unwrap()
    };

    let mut book = open();
    book.mutate(|db| db.create_account("Checking", false))
        .unwrap();
    drop(book);

    let book = open();
    assert_eq!(book.db().list_accounts().unwrap()[0].name, "Checking");
    assert!(dir.path().join("ledger.snapshot").exists());
}

#[test]
fn test_restore_keeps_ledger_on_bad_backup() {
    let (_store, mut book) = memory_book(None);
    let batch = parse_csv(bank_csv().as_bytes(), &ColumnMapping::default()).unwrap();
    book.mutate(|db| db.ingest_transactions(batch)).unwrap();
    let before = book.db().stats().unwrap();

    let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let (name, backup) = book.export_backup(Some("pw"), today).unwrap();
    assert_eq!(name, "tally-2024-03-31.db.enc");

    // Corrupted ciphertext
    let mut tampered = backup.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    assert!(matches!(
        book.restore(&tampered, Some("pw")),
        Err(Error::Crypto)
    ));

    // Garbage that decrypts to nothing useful
    assert!(book.restore(b"SQLite format 3\0garbage", None).is_err());
    assert_eq!(book.db().stats().unwrap(), before);

    // Restoring into a fresh ledger brings everything back
    let (_other_store, mut fresh) = memory_book(None);
    let restored = fresh.restore(&backup, Some("pw")).unwrap();
    assert_eq!(restored, before);
}

#[test]
fn test_failed_flush_keeps_memory_state() {
    let (store, mut book) = memory_book(None);
    book.mutate(|db| db.create_account("Checking", false))
        .unwrap();

    store.set_fail_writes(true);
    let err = book
        .mutate(|db| db.create_account("Visa", false))
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(book.db().list_accounts().unwrap().len(), 2);

    store.set_fail_writes(false);
    book.flush().unwrap();
    let reopened = Book::open(PersistenceGateway::new(
        Box::new(store),
        DEFAULT_SNAPSHOT_KEY,
        None,
    ))
    .unwrap();
    assert_eq!(reopened.db().list_accounts().unwrap().len(), 2);
}
