//! Entity resolution for account and category references
//!
//! Resolution is two-phase. [`ResolutionPlan::build`] reads the store once per
//! distinct reference in a batch and stages any rows that must be created,
//! without writing. [`ResolutionPlan::apply`] then inserts the staged rows
//! inside the caller's SQL transaction. Names are cached per plan, so a name
//! repeated across a batch creates at most one row.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::db::Database;
use crate::error::{is_constraint_violation, IngestError, Result};
use crate::models::{
    new_id, AccountRef, CategoryRef, NewEntry, NewTransaction, TransactionKind,
    DEFAULT_ACCOUNT_NAME,
};

/// How a reference was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing row
    Existing(String),
    /// A row staged for creation by this plan
    Staged(String),
}

impl Resolution {
    pub fn id(&self) -> &str {
        match self {
            Self::Existing(id) | Self::Staged(id) => id,
        }
    }
}

/// An account the plan will create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAccount {
    pub id: String,
    pub name: String,
}

/// A category the plan will create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCategory {
    pub id: String,
    pub name: String,
    pub kind: TransactionKind,
}

/// Per-batch resolution state
#[derive(Debug, Default)]
pub struct ResolutionPlan {
    account_ids: HashMap<String, Resolution>,
    account_names: HashMap<String, Resolution>,
    category_ids: HashMap<String, Resolution>,
    category_names: HashMap<(String, TransactionKind), Resolution>,
    staged_accounts: Vec<StagedAccount>,
    staged_categories: Vec<StagedCategory>,
}

fn clean(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|n| !n.is_empty())
}

impl ResolutionPlan {
    /// Pre-scan a batch and resolve every distinct reference once
    pub fn build(conn: &Connection, entries: &[NewEntry]) -> Result<Self> {
        let mut plan = Self::default();
        for entry in entries {
            for leg in entry.legs() {
                plan.scan_leg(conn, leg)?;
            }
        }
        debug!(
            "Resolution plan: {} account(s) and {} categor(ies) staged",
            plan.staged_accounts.len(),
            plan.staged_categories.len()
        );
        Ok(plan)
    }

    fn scan_leg(&mut self, conn: &Connection, leg: &NewTransaction) -> Result<()> {
        self.scan_account(conn, &leg.account)?;
        self.scan_category(conn, &leg.category, leg.kind)?;
        Ok(())
    }

    fn scan_account(&mut self, conn: &Connection, r: &AccountRef) -> Result<()> {
        if let Some(id) = &r.id {
            if self.account_ids.contains_key(id) {
                return Ok(());
            }
            let found: Option<String> = conn
                .query_row("SELECT id FROM accounts WHERE id = ?", params![id], |row| {
                    row.get(0)
                })
                .optional()?;
            if let Some(found) = found {
                self.account_ids
                    .insert(id.clone(), Resolution::Existing(found));
                return Ok(());
            }
            if clean(&r.name).is_none() {
                return Err(IngestError::ResolutionFailure {
                    reference: format!("account id '{}'", id),
                    reason: "no such account and no name to create it from".into(),
                }
                .into());
            }
        }

        let name = clean(&r.name).unwrap_or(DEFAULT_ACCOUNT_NAME);
        if self.account_names.contains_key(name) {
            return Ok(());
        }
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM accounts WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let resolution = match found {
            Some(id) => Resolution::Existing(id),
            None => {
                let id = new_id();
                self.staged_accounts.push(StagedAccount {
                    id: id.clone(),
                    name: name.to_string(),
                });
                Resolution::Staged(id)
            }
        };
        self.account_names.insert(name.to_string(), resolution);
        Ok(())
    }

    fn scan_category(
        &mut self,
        conn: &Connection,
        r: &CategoryRef,
        kind: TransactionKind,
    ) -> Result<()> {
        if let Some(id) = &r.id {
            if self.category_ids.contains_key(id) {
                return Ok(());
            }
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM categories WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(found) = found {
                self.category_ids
                    .insert(id.clone(), Resolution::Existing(found));
                return Ok(());
            }
            if clean(&r.name).is_none() {
                return Err(IngestError::ResolutionFailure {
                    reference: format!("category id '{}'", id),
                    reason: "no such category and no name to create it from".into(),
                }
                .into());
            }
        }

        let Some(name) = clean(&r.name) else {
            return Ok(());
        };
        let key = (name.to_string(), kind);
        if self.category_names.contains_key(&key) {
            return Ok(());
        }
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM categories WHERE name = ? AND kind = ?",
                params![name, kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let resolution = match found {
            Some(id) => Resolution::Existing(id),
            None => {
                let id = new_id();
                self.staged_categories.push(StagedCategory {
                    id: id.clone(),
                    name: name.to_string(),
                    kind,
                });
                Resolution::Staged(id)
            }
        };
        self.category_names.insert(key, resolution);
        Ok(())
    }

    /// Accounts this plan would create
    pub fn staged_accounts(&self) -> &[StagedAccount] {
        &self.staged_accounts
    }

    /// Categories this plan would create
    pub fn staged_categories(&self) -> &[StagedCategory] {
        &self.staged_categories
    }

    /// True when applying the plan creates nothing
    pub fn creates_nothing(&self) -> bool {
        self.staged_accounts.is_empty() && self.staged_categories.is_empty()
    }

    /// Names of staged accounts still owned by this plan (not lost to a race)
    pub fn created_account_names(&self) -> Vec<String> {
        self.staged_accounts
            .iter()
            .filter(|s| matches!(self.account_names.get(&s.name), Some(Resolution::Staged(_))))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Names of staged categories still owned by this plan
    pub fn created_category_names(&self) -> Vec<String> {
        self.staged_categories
            .iter()
            .filter(|s| {
                matches!(
                    self.category_names.get(&(s.name.clone(), s.kind)),
                    Some(Resolution::Staged(_))
                )
            })
            .map(|s| s.name.clone())
            .collect()
    }

    /// Insert staged rows
    ///
    /// A UNIQUE clash means the row appeared since the plan was built; the
    /// existing row is re-queried once and used instead.
    pub fn apply(&mut self, conn: &Connection) -> Result<()> {
        for staged in &self.staged_accounts {
            let inserted = conn.execute(
                "INSERT INTO accounts (id, name, is_savings) VALUES (?, ?, 0)",
                params![staged.id, staged.name],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    let id: String = conn.query_row(
                        "SELECT id FROM accounts WHERE name = ?",
                        params![staged.name],
                        |row| row.get(0),
                    )?;
                    self.account_names
                        .insert(staged.name.clone(), Resolution::Existing(id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        for staged in &self.staged_categories {
            let inserted = conn.execute(
                "INSERT INTO categories (id, name, kind, category_group) VALUES (?, ?, ?, 'general')",
                params![staged.id, staged.name, staged.kind.as_str()],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    let id: String = conn.query_row(
                        "SELECT id FROM categories WHERE name = ? AND kind = ?",
                        params![staged.name, staged.kind.as_str()],
                        |row| row.get(0),
                    )?;
                    self.category_names.insert(
                        (staged.name.clone(), staged.kind),
                        Resolution::Existing(id),
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Resolved account id for a reference seen during `build`
    pub fn account_id(&self, r: &AccountRef) -> Result<&str> {
        if let Some(res) = r.id.as_ref().and_then(|id| self.account_ids.get(id)) {
            return Ok(res.id());
        }
        let name = clean(&r.name).unwrap_or(DEFAULT_ACCOUNT_NAME);
        self.account_names
            .get(name)
            .map(Resolution::id)
            .ok_or_else(|| {
                IngestError::ResolutionFailure {
                    reference: format!("account '{}'", name),
                    reason: "reference was not part of the planned batch".into(),
                }
                .into()
            })
    }

    /// Resolved category id (`None` = uncategorized)
    pub fn category_id(&self, r: &CategoryRef, kind: TransactionKind) -> Result<Option<&str>> {
        if let Some(res) = r.id.as_ref().and_then(|id| self.category_ids.get(id)) {
            return Ok(Some(res.id()));
        }
        let Some(name) = clean(&r.name) else {
            return Ok(None);
        };
        self.category_names
            .get(&(name.to_string(), kind))
            .map(|res| Some(res.id()))
            .ok_or_else(|| {
                IngestError::ResolutionFailure {
                    reference: format!("category '{}' ({})", name, kind),
                    reason: "reference was not part of the planned batch".into(),
                }
                .into()
            })
    }
}

impl Database {
    /// Build a resolution plan for a batch without writing anything
    pub fn plan_resolution(&self, entries: &[NewEntry]) -> Result<ResolutionPlan> {
        ResolutionPlan::build(self.conn(), entries)
    }

    /// Resolve one account reference, creating the account if needed
    pub fn resolve_account(&mut self, r: &AccountRef) -> Result<String> {
        let probe = NewTransaction::new(
            chrono::Utc::now(),
            "",
            rust_decimal::Decimal::ZERO,
            TransactionKind::Balance,
        )
        .with_account(r.clone());
        let entries = [NewEntry::Flow(probe)];

        self.in_transaction(|conn| {
            let mut plan = ResolutionPlan::build(conn, &entries)?;
            plan.apply(conn)?;
            Ok(plan.account_id(r)?.to_string())
        })
    }

    /// Resolve one category reference for a kind; `None` when the reference is empty
    pub fn resolve_category(
        &mut self,
        r: &CategoryRef,
        kind: TransactionKind,
    ) -> Result<Option<String>> {
        let probe = NewTransaction::new(chrono::Utc::now(), "", rust_decimal::Decimal::ZERO, kind)
            .with_category(r.clone());
        let entries = [NewEntry::Flow(probe)];

        self.in_transaction(|conn| {
            let mut plan = ResolutionPlan::build(conn, &entries)?;
            plan.apply(conn)?;
            Ok(plan.category_id(r, kind)?.map(str::to_string))
        })
    }
}
