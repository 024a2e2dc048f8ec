//! Database tests

use super::schema::LEGACY_V1_SCHEMA;
use super::*;
use crate::fiscal::FiscalConfig;
use crate::models::*;
use crate::test_utils::{d, expense, utc};
use rusqlite::params;

fn table_exists(db: &Database, name: &str) -> bool {
    let count: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            [name],
            |row| row.get(0),
        )
        .unwrap();
    count == 1
}

fn user_version(db: &Database) -> i32 {
    db.conn()
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_accounts().unwrap().is_empty());
    assert_eq!(db.stats().unwrap(), LedgerStats::default());
    assert_eq!(user_version(&db), SCHEMA_VERSION);

    for table in [
        "accounts",
        "categories",
        "transactions",
        "transfers",
        "savings_goals",
        "goal_accounts",
        "configs",
    ] {
        assert!(table_exists(&db, table), "missing table {}", table);
    }
}

#[test]
fn test_migrates_v1_image() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(LEGACY_V1_SCHEMA).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO accounts (id, name, is_savings) VALUES ('a1', 'Checking', 0), ('a2', 'Savings', 1);
        INSERT INTO categories (id, name, kind) VALUES ('c1', 'Transfer', 'transfer');
        INSERT INTO transactions (id, date, description, amount, kind, account_id, category_id) VALUES
            ('t1', '2024-03-01T10:00:00+00:00', 'To savings', '-100.00', 'transfer', 'a1', 'c1'),
            ('t2', '2024-03-01T10:00:00+00:00', 'To savings', '100.00', 'transfer', 'a2', 'c1'),
            ('t3', '2024-03-02T08:00:00Z', 'Coffee', '-4.50', 'expense', 'a1', NULL),
            ('t4', '2024-03-05T08:00:00Z', 'Orphan leg', '-20.00', 'transfer', 'a1', 'c1');
        INSERT INTO savings_goals (id, name, target_amount, deadline, target_accounts)
            VALUES ('g1', 'Holiday', '1000', '2024-12-31', '["a2", "gone"]');
        "#,
    )
    .unwrap();

    let db = Database::from_connection(conn).unwrap();
    assert_eq!(user_version(&db), SCHEMA_VERSION);

    // Signatures backfilled and dates normalized
    let t1 = db.get_transaction("t1").unwrap().unwrap();
    assert_eq!(t1.date, utc(2024, 3, 1, 10, 0, 0));
    let stored: (String, String) = db
        .conn()
        .query_row(
            "SELECT date, signature FROM transactions WHERE id = 't3'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(stored.0, "2024-03-02T08:00:00.000Z");
    assert_eq!(
        stored.1,
        crate::dedup::signature_parts(utc(2024, 3, 2, 8, 0, 0), d("-4.50"), "Coffee")
    );

    // Only the matching pair is linked
    let links = db.list_transfer_links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].source_leg_id, "t1");
    assert_eq!(links[0].dest_leg_id, "t2");
    assert!(db.transfer_for_leg("t4").unwrap().is_none());

    // Goal targets moved, dangling ones dropped, old column gone
    let goals = db.list_goals().unwrap();
    assert_eq!(goals[0].target_accounts, vec!["a2".to_string()]);
    let old_column: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('savings_goals') WHERE name = 'target_accounts'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(old_column, 0);
}

#[test]
fn test_rejects_newer_schema() {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
        .unwrap();
    let result = Database::from_connection(conn);
    assert!(matches!(result, Err(Error::Integrity(_))));
}

#[test]
fn test_account_crud() {
    let mut db = Database::in_memory().unwrap();

    let checking = db.create_account("  Checking ", false).unwrap();
    assert_eq!(checking.name, "Checking");
    assert!(matches!(
        db.create_account("Checking", true),
        Err(Error::Duplicate { .. })
    ));
    assert!(matches!(
        db.create_account("   ", false),
        Err(Error::Validation(_))
    ));

    db.set_account_savings(&checking.id, true).unwrap();
    assert!(db.get_account(&checking.id).unwrap().unwrap().is_savings);

    db.delete_account(&checking.id).unwrap();
    assert!(db.list_accounts().unwrap().is_empty());
    assert!(matches!(
        db.delete_account(&checking.id),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_account_delete_refused_while_referenced() {
    let mut db = Database::in_memory().unwrap();
    let tx = db
        .add_transaction(expense("2024-01-02", "Lunch", "-12.00", "Visa", "Food"))
        .unwrap();

    let err = db.delete_account(&tx.account_id).unwrap_err();
    match err {
        Error::Referenced {
            entity, references, ..
        } => {
            assert_eq!(entity, "Account");
            assert_eq!(references, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(db.get_account(&tx.account_id).unwrap().is_some());

    db.delete_transaction(&tx.id).unwrap();
    db.delete_account(&tx.account_id).unwrap();
}

#[test]
fn test_category_delete_refused_while_referenced() {
    let mut db = Database::in_memory().unwrap();
    let tx = db
        .add_transaction(expense("2024-01-02", "Lunch", "-12.00", "Visa", "Food"))
        .unwrap();
    let category_id = tx.category_id.clone().unwrap();

    assert_eq!(db.count_category_references(&category_id).unwrap(), 1);
    assert!(matches!(
        db.delete_category(&category_id),
        Err(Error::Referenced { .. })
    ));

    db.delete_transaction(&tx.id).unwrap();
    db.delete_category(&category_id).unwrap();
    assert!(db.list_categories().unwrap().is_empty());
}

#[test]
fn test_rename_keeps_references() {
    let mut db = Database::in_memory().unwrap();
    let tx = db
        .add_transaction(expense("2024-01-02", "Lunch", "-12.00", "Visa", "Food"))
        .unwrap();

    db.rename_account(&tx.account_id, "Visa Gold").unwrap();
    db.rename_category(tx.category_id.as_deref().unwrap(), "Eating out")
        .unwrap();

    let stored = db.get_transaction(&tx.id).unwrap().unwrap();
    assert_eq!(stored, tx);
    assert_eq!(
        db.find_account_by_name("Visa Gold").unwrap().unwrap().id,
        tx.account_id
    );
    assert!(db
        .find_category("Eating out", TransactionKind::Expense)
        .unwrap()
        .is_some());
}

#[test]
fn test_rename_to_taken_name_is_duplicate() {
    let mut db = Database::in_memory().unwrap();
    db.create_account("Checking", false).unwrap();
    let visa = db.create_account("Visa", false).unwrap();
    assert!(matches!(
        db.rename_account(&visa.id, "Checking"),
        Err(Error::Duplicate { .. })
    ));
}

#[test]
fn test_category_names_unique_per_kind() {
    let mut db = Database::in_memory().unwrap();
    db.create_category("Gifts", TransactionKind::Expense, CategoryGroup::General)
        .unwrap();
    db.create_category("Gifts", TransactionKind::Income, CategoryGroup::General)
        .unwrap();
    assert!(matches!(
        db.create_category("Gifts", TransactionKind::Expense, CategoryGroup::Recurring),
        Err(Error::Duplicate { .. })
    ));
    assert_eq!(db.list_categories().unwrap().len(), 2);
}

#[test]
fn test_reset_keeps_configs() {
    let mut db = Database::in_memory().unwrap();
    db.add_transaction(expense("2024-01-02", "Lunch", "-12.00", "Visa", "Food"))
        .unwrap();
    db.set_fiscal_config(&FiscalConfig::fixed_day(25)).unwrap();

    db.reset().unwrap();

    assert_eq!(db.stats().unwrap(), LedgerStats::default());
    assert_eq!(db.fiscal_config().unwrap(), FiscalConfig::fixed_day(25));
}

#[test]
fn test_query_is_read_only() {
    let mut db = Database::in_memory().unwrap();
    db.create_account("Checking", false).unwrap();

    let result = db
        .run_query("SELECT name, is_savings FROM accounts;")
        .unwrap();
    assert_eq!(result.columns, vec!["name", "is_savings"]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], serde_json::json!("Checking"));

    for sql in [
        "INSERT INTO accounts (id, name) VALUES ('x', 'Sneaky')",
        "DELETE FROM accounts",
        "WITH doomed AS (SELECT id FROM accounts) DELETE FROM accounts WHERE id IN doomed",
        "PRAGMA user_version = 9",
    ] {
        assert!(
            matches!(db.run_query(sql), Err(Error::Query(_))),
            "allowed: {}",
            sql
        );
    }
    assert!(matches!(
        db.run_query("SELECT * FROM nowhere"),
        Err(Error::Query(_))
    ));
    assert_eq!(db.list_accounts().unwrap().len(), 1);
}

#[test]
fn test_image_round_trip() {
    let mut db = Database::in_memory().unwrap();
    db.ingest_transactions(vec![
        expense("2024-01-02", "Lunch", "-12.00", "Visa", "Food"),
        expense("2024-01-03", "Bus", "-2.50", "Cash", "Travel"),
    ])
    .unwrap();
    db.add_transfer(TransferRequest {
        date: utc(2024, 1, 4, 9, 0, 0),
        description: "Top up".into(),
        amount: d("50"),
        from: AccountRef::name("Visa"),
        to: AccountRef::name("Cash"),
        category: CategoryRef::default(),
    })
    .unwrap();
    db.set_fiscal_config(&FiscalConfig::fixed_day(10)).unwrap();

    let image = db.export_image().unwrap();
    let restored = Database::from_image(&image).unwrap();

    assert_eq!(restored.stats().unwrap(), db.stats().unwrap());
    assert_eq!(
        restored.all_transactions().unwrap(),
        db.all_transactions().unwrap()
    );
    assert_eq!(restored.list_entries().unwrap(), db.list_entries().unwrap());
    assert_eq!(restored.fiscal_config().unwrap(), FiscalConfig::fixed_day(10));
}

#[test]
fn test_from_image_rejects_bad_bytes() {
    assert!(matches!(
        Database::from_image(b"definitely not sqlite"),
        Err(Error::Integrity(_))
    ));

    // A valid SQLite file that is not a ledger
    let staging = tempfile::NamedTempFile::new().unwrap();
    let other = Connection::open(staging.path()).unwrap();
    other
        .execute_batch("CREATE TABLE notes (body TEXT); INSERT INTO notes VALUES ('hi');")
        .unwrap();
    drop(other);
    let bytes = std::fs::read(staging.path()).unwrap();
    assert!(matches!(
        Database::from_image(&bytes),
        Err(Error::Integrity(_))
    ));
}

#[test]
fn test_delete_transfer_leg_removes_pair() {
    let mut db = Database::in_memory().unwrap();
    let link_id = db
        .add_transfer(TransferRequest {
            date: utc(2024, 2, 1, 9, 0, 0),
            description: "Savings".into(),
            amount: d("200"),
            from: AccountRef::name("Checking"),
            to: AccountRef::name("Savings"),
            category: CategoryRef::default(),
        })
        .unwrap();
    let link = db.list_transfer_links().unwrap().pop().unwrap();
    assert_eq!(link.id, link_id);

    assert_eq!(db.delete_transaction(&link.dest_leg_id).unwrap(), 2);
    assert_eq!(db.count_transactions().unwrap(), 0);
    assert!(db.list_transfer_links().unwrap().is_empty());
    assert!(matches!(
        db.delete_transaction(&link.source_leg_id),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_list_entries_collapses_transfers() {
    let mut db = Database::in_memory().unwrap();
    db.add_transaction(expense("2024-02-01", "Rent", "-900", "Checking", "Housing"))
        .unwrap();
    db.add_transfer(TransferRequest {
        date: utc(2024, 2, 2, 9, 0, 0),
        description: "Savings".into(),
        amount: d("200"),
        from: AccountRef::name("Checking"),
        to: AccountRef::name("Savings"),
        category: CategoryRef::default(),
    })
    .unwrap();

    let entries = db.list_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(matches!(entries[0], LedgerEntry::Flow(_)));
    match &entries[1] {
        LedgerEntry::Transfer { source, dest, .. } => {
            assert_eq!(source.amount, d("-200"));
            assert_eq!(dest.amount, d("200"));
        }
        other => panic!("expected transfer, got {other:?}"),
    }
}

#[test]
fn test_goal_progress_and_account_cascade() {
    let mut db = Database::in_memory().unwrap();
    let savings = db.create_account("Savings", true).unwrap();
    let vacation = db.create_account("Vacation", true).unwrap();
    db.add_transaction(
        NewTransaction::new(
            utc(2024, 1, 1, 0, 0, 0),
            "Opening balance",
            d("300"),
            TransactionKind::Balance,
        )
        .with_account(AccountRef::id(&savings.id)),
    )
    .unwrap();

    let goal = db
        .create_goal(
            "Emergency fund",
            d("1000"),
            None,
            &[savings.id.clone(), vacation.id.clone()],
        )
        .unwrap();

    let progress = db.goal_progress().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].saved, d("300"));
    assert_eq!(progress[0].remaining, d("700"));
    assert_eq!(progress[0].percent, d("30.0"));

    db.delete_account(&vacation.id).unwrap();
    let goals = db.list_goals().unwrap();
    assert_eq!(goals[0].id, goal.id);
    assert_eq!(goals[0].target_accounts, vec![savings.id.clone()]);

    assert!(matches!(
        db.create_goal("Bad", d("0"), None, &[]),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        db.create_goal("Ghost", d("10"), None, &["nope".to_string()]),
        Err(Error::NotFound(_))
    ));
    assert_eq!(db.list_goals().unwrap().len(), 1);

    db.delete_goal(&goal.id).unwrap();
    assert!(db.list_goals().unwrap().is_empty());
}

#[test]
fn test_update_goal_rewrites_targets() {
    let mut db = Database::in_memory().unwrap();
    let savings = db.create_account("Savings", true).unwrap();
    let vacation = db.create_account("Vacation", true).unwrap();
    let goal = db
        .create_goal("Trip", d("500"), None, &[savings.id.clone()])
        .unwrap();

    let deadline = chrono::NaiveDate::from_ymd_opt(2024, 12, 31);
    let updated = db
        .update_goal(&goal.id, " Big trip ", d("800"), deadline, &[vacation.id.clone()])
        .unwrap();
    assert_eq!(updated.name, "Big trip");

    let stored = db.get_goal(&goal.id).unwrap().unwrap();
    assert_eq!(stored.name, "Big trip");
    assert_eq!(stored.target_amount, d("800"));
    assert_eq!(stored.deadline, deadline);
    assert_eq!(stored.target_accounts, vec![vacation.id.clone()]);

    assert!(matches!(
        db.update_goal("missing", "X", d("1"), None, &[]),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        db.update_goal(&goal.id, "Trip", d("-5"), None, &[]),
        Err(Error::Validation(_))
    ));
    // An unknown account rolls back the whole edit
    assert!(matches!(
        db.update_goal(&goal.id, "Renamed", d("900"), None, &["nope".to_string()]),
        Err(Error::NotFound(_))
    ));
    let stored = db.get_goal(&goal.id).unwrap().unwrap();
    assert_eq!(stored.name, "Big trip");
    assert_eq!(stored.target_accounts, vec![vacation.id]);
}

#[test]
fn test_goal_progress_with_zero_target() {
    let mut db = Database::in_memory().unwrap();
    let savings = db.create_account("Savings", true).unwrap();
    db.conn()
        .execute(
            "INSERT INTO savings_goals (id, name, target_amount) VALUES ('g', 'legacy', '0')",
            [],
        )
        .unwrap();
    db.conn()
        .execute(
            "INSERT INTO goal_accounts (goal_id, account_id) VALUES ('g', ?)",
            params![savings.id],
        )
        .unwrap();

    let progress = db.goal_progress().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].percent, d("0"));
    assert_eq!(progress[0].remaining, d("0"));
}

#[test]
fn test_fiscal_config_persistence() {
    let mut db = Database::in_memory().unwrap();
    assert_eq!(db.fiscal_config().unwrap(), FiscalConfig::calendar());

    assert!(matches!(
        db.set_fiscal_config(&FiscalConfig::income_trigger("missing")),
        Err(Error::NotFound(_))
    ));

    let salary = db
        .create_category("Salary", TransactionKind::Income, CategoryGroup::General)
        .unwrap();
    db.set_fiscal_config(&FiscalConfig::income_trigger(&salary.id))
        .unwrap();
    assert_eq!(
        db.fiscal_config().unwrap(),
        FiscalConfig::income_trigger(&salary.id)
    );

    let raw = db.get_config("fiscal_config").unwrap().unwrap();
    assert!(raw.contains("income_trigger"));
}

#[test]
fn test_search_and_paging() {
    let mut db = Database::in_memory().unwrap();
    db.ingest_transactions(vec![
        expense("2024-01-01", "Coffee Shop", "-4.00", "Visa", "Food"),
        expense("2024-01-02", "Grocer", "-40.00", "Visa", "Food"),
        expense("2024-01-03", "coffee beans", "-12.00", "Visa", "Food"),
    ])
    .unwrap();

    let newest = db.list_transactions(1, 0).unwrap();
    assert_eq!(newest[0].description, "coffee beans");
    let second = db.list_transactions(1, 1).unwrap();
    assert_eq!(second[0].description, "Grocer");

    assert_eq!(db.search_transactions("COFFEE", 10).unwrap().len(), 2);

    let account = db.find_account_by_name("Visa").unwrap().unwrap();
    assert_eq!(db.account_transactions(&account.id).unwrap().len(), 3);
    assert_eq!(db.existing_signatures().unwrap().len(), 3);
}

#[test]
fn test_raw_fk_enforced() {
    let db = Database::in_memory().unwrap();
    let result = db.conn().execute(
        "INSERT INTO transactions (id, date, description, amount, kind, account_id, signature)
         VALUES ('t', '2024-01-01T00:00:00.000Z', 'x', '1', 'income', 'missing', 's')",
        params![],
    );
    assert!(result.is_err());
}
