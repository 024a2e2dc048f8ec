//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `backup` - Backup export/restore and reset
//! - `core` - Init and shared utilities (open_book, date/period parsing)
//! - `entities` - Accounts, categories and savings goals
//! - `import` - CSV import with duplicate screening
//! - `insights` - Text-generation insights
//! - `reports` - Balances, period summaries, fiscal policy, ad-hoc query
//! - `transactions` - Add, transfer, list, search, delete

pub mod backup;
pub mod core;
pub mod entities;
pub mod import;
pub mod insights;
pub mod reports;
pub mod transactions;

use std::collections::HashMap;

use anyhow::Result;
use tally_core::{Database, UNCATEGORIZED_LABEL};

// Re-export command functions for main.rs
pub use backup::*;
pub use self::core::*;
pub use entities::*;
pub use import::*;
pub use insights::*;
pub use reports::*;
pub use transactions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Id to display-name lookups for rendering rows
pub struct Names {
    accounts: HashMap<String, String>,
    categories: HashMap<String, String>,
}

impl Names {
    pub fn load(db: &Database) -> Result<Self> {
        Ok(Self {
            accounts: db
                .list_accounts()?
                .into_iter()
                .map(|a| (a.id, a.name))
                .collect(),
            categories: db
                .list_categories()?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect(),
        })
    }

    pub fn account<'a>(&'a self, id: &'a str) -> &'a str {
        self.accounts.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn category(&self, id: Option<&str>) -> &str {
        id.and_then(|id| self.categories.get(id))
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED_LABEL)
    }
}
