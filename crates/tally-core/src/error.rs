//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Invalid data: {0}")]
    Validation(String),

    /// Delete refused because rows still point at the entity
    #[error("{entity} '{id}' is referenced by {references} transaction(s)")]
    Referenced {
        entity: &'static str,
        id: String,
        references: i64,
    },

    #[error("{entity} named '{name}' already exists")]
    Duplicate { entity: &'static str, name: String },

    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Deliberately vague: never reveal whether the key or the payload was bad
    #[error("incorrect password or corrupted data")]
    Crypto,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The external text-generation service failed
    #[error("Insight backend error: {0}")]
    Collaborator(String),
}

/// A single rejected row from an ingestion batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position of the row in the submitted batch
    pub row: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Failure of an ingestion batch. Nothing from the batch has been written.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{} invalid row(s): {}", .0.len(), join_rows(.0))]
    Validation(Vec<RowError>),

    #[error("constraint violation{}: {message}", row_suffix(.row))]
    ConstraintViolation { row: Option<usize>, message: String },

    #[error("could not resolve {reference}: {reason}")]
    ResolutionFailure { reference: String, reason: String },
}

fn join_rows(rows: &[RowError]) -> String {
    rows.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(" at row {}", r)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;

/// True when SQLite rejected a write because of a UNIQUE/FK/CHECK constraint
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_message_is_generic() {
        assert_eq!(
            Error::Crypto.to_string(),
            "incorrect password or corrupted data"
        );
    }

    #[test]
    fn test_referenced_message_includes_count() {
        let err = Error::Referenced {
            entity: "Account",
            id: "abc".into(),
            references: 3,
        };
        assert_eq!(
            err.to_string(),
            "Account 'abc' is referenced by 3 transaction(s)"
        );
    }

    #[test]
    fn test_validation_lists_rows() {
        let err = IngestError::Validation(vec![
            RowError {
                row: 0,
                message: "description is empty".into(),
            },
            RowError {
                row: 4,
                message: "amount is zero".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 invalid row(s)"));
        assert!(msg.contains("row 4: amount is zero"));
    }
}
