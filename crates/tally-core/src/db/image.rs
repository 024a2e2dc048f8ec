//! Whole-store images
//!
//! An image is the raw bytes of an SQLite database file. Export goes through
//! the online backup API into a staging file; import validates a staged copy
//! read-only before restoring it into a fresh in-memory connection.

use std::io::Write;

use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, OpenFlags};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::Database;
use crate::error::{Error, Result};

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";
const REQUIRED_TABLES: &[&str] = &["accounts", "categories", "transactions", "configs"];

impl Database {
    /// Serialize the whole store to database image bytes
    pub fn export_image(&self) -> Result<Vec<u8>> {
        let staging = NamedTempFile::new()?;
        self.conn
            .backup(DatabaseName::Main, staging.path(), None)
            .map_err(|e| Error::Storage(format!("image export failed: {}", e)))?;
        let bytes = std::fs::read(staging.path())?;

        debug!("Exported database image ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Open a store from image bytes
    ///
    /// The image must pass an integrity check and carry the ledger tables
    /// before anything is loaded; older schema versions are migrated forward.
    /// Failures are `Error::Integrity` and leave no state behind.
    pub fn from_image(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SQLITE_HEADER.len() || &bytes[..SQLITE_HEADER.len()] != SQLITE_HEADER {
            return Err(Error::Integrity("not a database image".into()));
        }

        let mut staging = NamedTempFile::new()?;
        staging.write_all(bytes)?;
        staging.flush()?;

        validate_staged(staging.path())
            .map_err(|e| Error::Integrity(format!("invalid database image: {}", e)))?;

        let mut conn = Connection::open_in_memory()?;
        conn.restore(DatabaseName::Main, staging.path(), None::<fn(Progress)>)
            .map_err(|e| Error::Integrity(format!("could not load database image: {}", e)))?;

        let db = Self::from_connection(conn)?;
        let violations: i64 =
            db.conn
                .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| {
                    row.get(0)
                })?;
        if violations > 0 {
            return Err(Error::Integrity(format!(
                "database image has {} dangling reference(s)",
                violations
            )));
        }

        info!("Loaded database image ({} bytes)", bytes.len());
        Ok(db)
    }
}

fn validate_staged(path: &std::path::Path) -> std::result::Result<(), String> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| e.to_string())?;

    let check: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    if check != "ok" {
        return Err(check);
    }

    for table in REQUIRED_TABLES {
        let present: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        if present == 0 {
            return Err(format!("missing table '{}'", table));
        }
    }
    Ok(())
}
