//! Tally Core Library
//!
//! Persistence and consistency engine for the Tally personal finance tracker:
//! - In-memory SQLite ledger store with schema migrations
//! - Two-phase account/category resolution and atomic batch ingestion
//! - Explicit transfer pairing and running balances
//! - Signature-based duplicate detection for imports
//! - Fiscal period resolution and period summaries
//! - Encrypted snapshot persistence and backup/restore
//! - Optional text-generation insights (Ollama)

pub mod balances;
pub mod db;
pub mod dedup;
pub mod error;
pub mod fiscal;
pub mod import;
pub mod ingest;
pub mod insights;
pub mod models;
pub mod resolver;
pub mod settings;
pub mod snapshot;
pub mod summary;

/// Test utilities including mock Ollama server
#[cfg(test)]
pub mod test_utils;

pub use balances::{compute_balances, compute_balances_desc, BalancedTransaction};
pub use db::{Database, QueryResult, TransferLink, SCHEMA_VERSION};
pub use dedup::{classify, select_for_import, DupStatus};
pub use error::{Error, IngestError, Result, RowError};
pub use fiscal::{FiscalConfig, FiscalMode, Period, PeriodKey};
pub use import::{parse_csv, ColumnMapping};
pub use ingest::IngestReport;
pub use insights::{
    generate_insights, Insight, InsightBackend, InsightKind, InsightOutcome, InsightResponse,
    InsightSnapshot, MockBackend, OllamaBackend,
};
pub use models::*;
pub use resolver::{Resolution, ResolutionPlan};
pub use settings::{InsightSettings, TallySettings};
pub use snapshot::{
    Book, LocalStore, MemoryStore, PersistenceGateway, SnapshotStore, DEFAULT_SNAPSHOT_KEY,
};
pub use summary::{CategoryTotal, PeriodSummary};
