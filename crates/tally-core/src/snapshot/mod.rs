//! Durable snapshots of the in-memory ledger
//!
//! The whole store is serialized to a database image after every mutation
//! (write-through) and kept under one logical key.
//!
//! # Architecture
//!
//! - `SnapshotStore` trait defines where image bytes live
//! - `LocalStore` keeps them in a directory, written atomically
//! - `MemoryStore` keeps them in memory (tests, dry runs)
//! - `PersistenceGateway` adds the optional encryption envelope
//! - `Book` owns the single `Database` and flushes through the gateway
//!
//! # Backup naming
//!
//! Exported backups are named `tally-YYYY-MM-DD.db`, or `.db.enc` when
//! encrypted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::LedgerStats;

pub mod crypto;

/// Default logical key for the live snapshot
pub const DEFAULT_SNAPSHOT_KEY: &str = "ledger";

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";

/// True when the bytes are a plain (unencrypted) database image
pub fn is_plain_image(bytes: &[u8]) -> bool {
    bytes.starts_with(SQLITE_HEADER)
}

/// File name for an exported backup taken on `date`
pub fn backup_name(date: NaiveDate, encrypted: bool) -> String {
    let ext = if encrypted { "db.enc" } else { "db" };
    format!("tally-{}.{}", date.format("%Y-%m-%d"), ext)
}

/// Storage backend for snapshot bytes
pub trait SnapshotStore: Send + Sync {
    /// Human-readable name for this store
    fn name(&self) -> &str;

    /// Bytes stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes under `key`
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Snapshots as files in a directory
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Create a new local store
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Storage(format!(
                    "Failed to create snapshot directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!("Created snapshot directory: {}", dir.display());
        }
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.snapshot", key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        use std::io::Write;

        // Stage next to the target so the rename stays on one filesystem
        let mut staging = NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::Storage(format!("Failed to stage snapshot: {}", e)))?;
        staging
            .write_all(bytes)
            .and_then(|_| staging.as_file().sync_all())
            .map_err(|e| Error::Storage(format!("Failed to write snapshot: {}", e)))?;
        staging
            .persist(self.path_for(key))
            .map_err(|e| Error::Storage(format!("Failed to replace snapshot: {}", e)))?;
        Ok(())
    }
}

/// Snapshots held in memory; clones share the same contents
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail, as a full disk would
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw bytes currently stored under `key`
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl SnapshotStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("storage quota exceeded".into()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Serializes the store to and from (optionally encrypted) snapshot bytes
pub struct PersistenceGateway {
    store: Box<dyn SnapshotStore>,
    key: String,
    password: Option<String>,
}

impl PersistenceGateway {
    pub fn new(
        store: Box<dyn SnapshotStore>,
        key: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }

    /// Wrap image bytes for storage
    pub fn seal(&self, image: &[u8]) -> Result<Vec<u8>> {
        match &self.password {
            Some(password) => crypto::encrypt(image, password),
            None => Ok(image.to_vec()),
        }
    }

    /// Unwrap stored or supplied bytes into image bytes
    ///
    /// Plain images are accepted as-is so an unencrypted store can be opened
    /// after a password is set. Encrypted bytes without a password fail the
    /// same way a wrong password does.
    pub fn unseal(&self, blob: &[u8]) -> Result<Vec<u8>> {
        unseal_with(blob, self.password.as_deref())
    }

    /// Load the live snapshot, if one exists
    pub fn load(&self) -> Result<Option<Database>> {
        let Some(blob) = self.store.load(&self.key)? else {
            return Ok(None);
        };
        let image = self.unseal(&blob)?;
        Ok(Some(Database::from_image(&image)?))
    }

    /// Write the live snapshot
    pub fn flush(&self, db: &Database) -> Result<()> {
        let sealed = self.seal(&db.export_image()?)?;
        self.store.save(&self.key, &sealed).map_err(|e| {
            Error::Storage(format!("flush to {} store failed: {}", self.store.name(), e))
        })?;
        debug!("Flushed snapshot '{}' ({} bytes)", self.key, sealed.len());
        Ok(())
    }
}

/// Unwrap a blob with an explicit password choice
pub fn unseal_with(blob: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
    if is_plain_image(blob) {
        return Ok(blob.to_vec());
    }
    match password {
        Some(password) => crypto::decrypt(blob, password),
        None => Err(Error::Crypto),
    }
}

/// The write-through ledger handle
///
/// Owns exactly one `Database`. Every mutation goes through [`Book::mutate`]
/// and is flushed when it commits. A failed flush is reported as
/// `Error::Storage`; the in-memory ledger keeps the committed change and stays
/// authoritative.
pub struct Book {
    db: Database,
    gateway: PersistenceGateway,
}

impl Book {
    /// Open the live snapshot, or start an empty ledger when there is none
    pub fn open(gateway: PersistenceGateway) -> Result<Self> {
        let db = match gateway.load()? {
            Some(db) => {
                info!("Loaded ledger snapshot");
                db
            }
            None => {
                info!("No snapshot found, starting empty ledger");
                Database::in_memory()?
            }
        };
        Ok(Self { db, gateway })
    }

    /// Read access
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Run a mutation and flush on success
    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let out = f(&mut self.db)?;
        self.flush()?;
        Ok(out)
    }

    /// Write the current state to durable storage
    pub fn flush(&self) -> Result<()> {
        self.gateway.flush(&self.db).map_err(|e| {
            warn!("Snapshot flush failed, in-memory ledger kept: {}", e);
            match e {
                e @ Error::Storage(_) => e,
                other => Error::Storage(other.to_string()),
            }
        })
    }

    /// Clear ledger data (configs survive) and flush
    pub fn reset(&mut self) -> Result<()> {
        self.mutate(|db| db.reset())
    }

    /// Export a downloadable backup: (file name, bytes)
    pub fn export_backup(
        &self,
        password: Option<&str>,
        today: NaiveDate,
    ) -> Result<(String, Vec<u8>)> {
        let image = self.db.export_image()?;
        let password = password.filter(|p| !p.is_empty());
        let bytes = match password {
            Some(password) => crypto::encrypt(&image, password)?,
            None => image,
        };
        Ok((backup_name(today, password.is_some()), bytes))
    }

    /// Replace the ledger with a supplied backup
    ///
    /// The backup is decrypted and validated as a database image first; on
    /// any failure the current ledger is untouched. On success the new ledger
    /// is flushed as the live snapshot.
    pub fn restore(&mut self, blob: &[u8], password: Option<&str>) -> Result<LedgerStats> {
        let image = unseal_with(blob, password)?;
        let replacement = Database::from_image(&image)?;
        let stats = replacement.stats()?;

        self.db = replacement;
        info!(
            "Restored ledger: {} accounts, {} transactions",
            stats.accounts, stats.transactions
        );
        self.flush()?;
        Ok(stats)
    }
}
