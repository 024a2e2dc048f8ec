//! Category operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{column_error, Database};
use crate::error::{is_constraint_violation, Error, Result};
use crate::models::{new_id, Category, CategoryGroup, TransactionKind};

pub(crate) fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    let kind: String = row.get(2)?;
    let group: String = row.get(3)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind
            .parse()
            .map_err(|e: String| column_error(2, Error::Integrity(e)))?,
        group: group.parse().unwrap_or_default(),
    })
}

impl Database {
    /// Create a category explicitly (admin action)
    pub fn create_category(
        &mut self,
        name: &str,
        kind: TransactionKind,
        group: CategoryGroup,
    ) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name is empty".into()));
        }

        let category = Category {
            id: new_id(),
            name: name.to_string(),
            kind,
            group,
        };
        self.conn
            .execute(
                "INSERT INTO categories (id, name, kind, category_group) VALUES (?, ?, ?, ?)",
                params![
                    category.id,
                    category.name,
                    kind.as_str(),
                    group.as_str()
                ],
            )
            .map_err(|e| duplicate_or(e, name, kind))?;

        info!("Created category '{}' ({})", category.name, kind);
        Ok(category)
    }

    /// List all categories
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, category_group FROM categories ORDER BY kind, name",
        )?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: &str) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, kind, category_group FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?)
    }

    /// Get a category by its unique `(name, kind)` pair
    pub fn find_category(&self, name: &str, kind: TransactionKind) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, kind, category_group FROM categories WHERE name = ? AND kind = ?",
                params![name.trim(), kind.as_str()],
                row_to_category,
            )
            .optional()?)
    }

    /// Rename a category; id and references are preserved
    pub fn rename_category(&mut self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::Validation("category name is empty".into()));
        }
        let current = self
            .get_category(id)?
            .ok_or_else(|| Error::NotFound(format!("category {}", id)))?;

        self.conn
            .execute(
                "UPDATE categories SET name = ? WHERE id = ?",
                params![new_name, id],
            )
            .map_err(|e| duplicate_or(e, new_name, current.kind))?;
        Ok(())
    }

    /// Number of transactions pointing at a category
    pub fn count_category_references(&self, id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ?",
            params![id],
            |row| row.get(0),
        )?)
    }

    /// Delete a category, refused while any transaction references it
    pub fn delete_category(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let references: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(Error::Referenced {
                entity: "Category",
                id: id.to_string(),
                references,
            });
        }

        let deleted = tx.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        tx.commit()?;

        info!("Deleted category {}", id);
        Ok(())
    }
}

fn duplicate_or(err: rusqlite::Error, name: &str, kind: TransactionKind) -> Error {
    if is_constraint_violation(&err) {
        Error::Duplicate {
            entity: "Category",
            name: format!("{} ({})", name, kind),
        }
    } else {
        Error::Database(err)
    }
}
