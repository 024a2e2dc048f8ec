//! Read-only ad-hoc SQL

use rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::Value;

use super::Database;
use crate::error::{Error, Result};

const ALLOWED_PREFIXES: &[&str] = &["select", "with", "explain", "values"];

/// Tabular result of an ad-hoc query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Database {
    /// Run a read-only query
    ///
    /// Anything that would write (or is not a single read statement) is
    /// refused with `Error::Query`; SQL errors are reported the same way.
    pub fn run_query(&self, sql: &str) -> Result<QueryResult> {
        let trimmed = sql.trim().trim_end_matches(';').trim();
        let first_word = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if !ALLOWED_PREFIXES.contains(&first_word.as_str()) {
            return Err(Error::Query(
                "only SELECT, WITH, EXPLAIN and VALUES statements are allowed".into(),
            ));
        }

        let mut stmt = self
            .conn
            .prepare(trimmed)
            .map_err(|e| Error::Query(e.to_string()))?;
        if !stmt.readonly() {
            return Err(Error::Query("statement would modify the ledger".into()));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(|e| Error::Query(e.to_string()))?;
        while let Some(row) = cursor.next().map_err(|e| Error::Query(e.to_string()))? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                let value = row.get_ref(i).map_err(|e| Error::Query(e.to_string()))?;
                values.push(to_json(value));
            }
            rows.push(values);
        }

        Ok(QueryResult { columns, rows })
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(format!("<{} bytes>", b.len())),
    }
}
