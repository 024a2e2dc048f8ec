//! Insight generation boundary
//!
//! The ledger hands a read-only [`InsightSnapshot`] to an external
//! text-generation service and gets back either structured insight records or
//! free text. The service is optional: [`generate_insights`] turns a missing
//! or failing backend into [`InsightOutcome::Unavailable`] and never returns
//! an error, so the ledger is never blocked on it.
//!
//! # Architecture
//!
//! - `InsightBackend` trait: one async `generate` call
//! - `OllamaBackend`: local Ollama server over HTTP
//! - `MockBackend`: canned responses for tests and offline use

mod mock;
mod ollama;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::balances::account_totals;
use crate::db::Database;
use crate::error::Result;
use crate::fiscal::PeriodKey;
use crate::models::{TransactionKind, UNCATEGORIZED_LABEL};
use crate::settings::InsightSettings;
use crate::summary::PeriodSummary;

/// What an insight is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Tip,
    Warning,
    Trend,
    #[serde(other)]
    Info,
}

/// One structured insight record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub content: String,
    #[serde(default = "default_kind")]
    pub kind: InsightKind,
}

fn default_kind() -> InsightKind {
    InsightKind::Info
}

/// What the backend returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "body", rename_all = "lowercase")]
pub enum InsightResponse {
    Structured(Vec<Insight>),
    Text(String),
}

/// Result shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InsightOutcome {
    Ready { response: InsightResponse },
    Unavailable { reason: String },
}

/// A recent transaction as shown to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotTransaction {
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub account: String,
    pub category: String,
}

/// Current balance of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub account: String,
    pub is_savings: bool,
    pub balance: Decimal,
}

/// Read-only view of the ledger handed to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightSnapshot {
    pub summary: PeriodSummary,
    pub recent: Vec<SnapshotTransaction>,
    pub balances: Vec<AccountBalance>,
}

impl InsightSnapshot {
    /// Build a snapshot for a period with up to `recent_limit` latest transactions
    pub fn build(
        db: &Database,
        key: PeriodKey,
        now: DateTime<Utc>,
        recent_limit: i64,
    ) -> Result<Self> {
        let summary = db.period_summary(key, now)?;
        let accounts = db.list_accounts()?;
        let categories = db.list_categories()?;

        let account_name = |id: &str| {
            accounts
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let category_name = |id: &Option<String>| {
            id.as_ref()
                .and_then(|id| categories.iter().find(|c| &c.id == id))
                .map(|c| c.name.clone())
                .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_string())
        };

        let recent = db
            .list_transactions(recent_limit, 0)?
            .into_iter()
            .map(|tx| SnapshotTransaction {
                account: account_name(&tx.account_id),
                category: category_name(&tx.category_id),
                date: tx.date,
                description: tx.description,
                amount: tx.amount,
                kind: tx.kind,
            })
            .collect();

        let totals = account_totals(&db.all_transactions()?);
        let balances = accounts
            .iter()
            .map(|a| AccountBalance {
                account: a.name.clone(),
                is_savings: a.is_savings,
                balance: totals.get(&a.id).copied().unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            summary,
            recent,
            balances,
        })
    }
}

/// Trait for text-generation backends
#[async_trait]
pub trait InsightBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Produce insights for a snapshot
    async fn generate(&self, snapshot: &InsightSnapshot) -> Result<InsightResponse>;
}

/// Build the configured backend, if any
pub fn backend_from_settings(settings: &InsightSettings) -> Option<OllamaBackend> {
    settings
        .host
        .as_deref()
        .map(|host| OllamaBackend::new(host, &settings.model, settings.timeout_secs))
}

/// Ask the backend for insights, degrading to `Unavailable` on any problem
pub async fn generate_insights(
    backend: Option<&dyn InsightBackend>,
    snapshot: &InsightSnapshot,
) -> InsightOutcome {
    let Some(backend) = backend else {
        return InsightOutcome::Unavailable {
            reason: "insights are not configured".into(),
        };
    };

    match backend.generate(snapshot).await {
        Ok(response) => {
            debug!("Insights generated by {}", backend.name());
            InsightOutcome::Ready { response }
        }
        Err(e) => {
            warn!("Insight backend {} unavailable: {}", backend.name(), e);
            InsightOutcome::Unavailable {
                reason: format!("{} is unavailable", backend.name()),
            }
        }
    }
}

/// Interpret raw backend text: a JSON list of insights, an object with an
/// `insights` list, or otherwise plain text
pub fn parse_response(text: &str) -> InsightResponse {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    #[derive(Deserialize)]
    struct Wrapped {
        insights: Vec<Insight>,
    }

    if let Ok(list) = serde_json::from_str::<Vec<Insight>>(body) {
        return InsightResponse::Structured(list);
    }
    if let Ok(wrapped) = serde_json::from_str::<Wrapped>(body) {
        return InsightResponse::Structured(wrapped.insights);
    }
    InsightResponse::Text(trimmed.to_string())
}

/// Prompt sent to text backends
pub(crate) fn build_prompt(snapshot: &InsightSnapshot) -> Result<String> {
    let data = serde_json::to_string_pretty(snapshot)?;
    Ok(format!(
        "You are a personal finance assistant. Using the ledger data below, write 2-4 short, \
         specific insights about spending and saving for the period \"{}\".\n\
         Respond with JSON only: {{\"insights\": [{{\"title\": \"...\", \"content\": \"...\", \
         \"kind\": \"tip|warning|trend|info\"}}]}}\n\nLedger data:\n{}",
        snapshot.summary.period.label, data
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{AccountRef, CategoryRef, NewTransaction};
    use crate::test_utils::{d, utc, MockOllamaServer};

    fn seeded_snapshot() -> InsightSnapshot {
        let mut db = Database::in_memory().unwrap();
        db.ingest_transactions(vec![
            NewTransaction::new(
                utc(2024, 3, 1, 9, 0, 0),
                "Payroll",
                d("2500"),
                TransactionKind::Income,
            )
            .with_account(AccountRef::name("Checking"))
            .with_category(CategoryRef::name("Salary")),
            NewTransaction::new(
                utc(2024, 3, 3, 18, 0, 0),
                "Groceries",
                d("-84.20"),
                TransactionKind::Expense,
            )
            .with_account(AccountRef::name("Checking"))
            .with_category(CategoryRef::name("Food")),
        ])
        .unwrap();
        InsightSnapshot::build(&db, "2024-03".parse().unwrap(), utc(2024, 3, 31, 0, 0, 0), 20)
            .unwrap()
    }

    #[test]
    fn test_snapshot_contents() {
        let snapshot = seeded_snapshot();
        assert_eq!(snapshot.summary.income, d("2500"));
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.recent[0].description, "Groceries");
        assert_eq!(snapshot.recent[0].category, "Food");
        assert_eq!(snapshot.balances[0].balance, d("2415.80"));
    }

    #[test]
    fn test_parse_response_shapes() {
        let list = r#"[{"title":"A","content":"B","kind":"tip"}]"#;
        assert!(matches!(parse_response(list), InsightResponse::Structured(v) if v.len() == 1));

        let wrapped = "```json\n{\"insights\":[{\"title\":\"A\",\"content\":\"B\",\"kind\":\"odd\"}]}\n```";
        match parse_response(wrapped) {
            InsightResponse::Structured(v) => assert_eq!(v[0].kind, InsightKind::Info),
            other => panic!("unexpected: {other:?}"),
        }

        assert_eq!(
            parse_response("  Spending is steady.  "),
            InsightResponse::Text("Spending is steady.".into())
        );
    }

    #[tokio::test]
    async fn test_not_configured_is_unavailable() {
        let outcome = generate_insights(None, &seeded_snapshot()).await;
        assert!(matches!(outcome, InsightOutcome::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_failing_backend_degrades() {
        let backend = MockBackend::failing();
        let outcome = generate_insights(Some(&backend), &seeded_snapshot()).await;
        assert_eq!(
            outcome,
            InsightOutcome::Unavailable {
                reason: "mock is unavailable".into()
            }
        );
    }

    #[tokio::test]
    async fn test_failing_backend_reports_collaborator_error() {
        let err = MockBackend::failing()
            .generate(&seeded_snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator(_)));
    }

    #[tokio::test]
    async fn test_mock_backend_ready() {
        let backend = MockBackend::new();
        let outcome = generate_insights(Some(&backend), &seeded_snapshot()).await;
        assert!(matches!(
            outcome,
            InsightOutcome::Ready {
                response: InsightResponse::Structured(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_ollama_backend_against_mock_server() {
        let server = MockOllamaServer::start(
            r#"{"insights":[{"title":"Food","content":"Groceries were 3% of income.","kind":"trend"}]}"#,
        )
        .await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2", 5);

        let outcome = generate_insights(Some(&backend), &seeded_snapshot()).await;
        match outcome {
            InsightOutcome::Ready {
                response: InsightResponse::Structured(insights),
            } => {
                assert_eq!(insights.len(), 1);
                assert_eq!(insights[0].kind, InsightKind::Trend);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ollama_unreachable_degrades() {
        let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3.2", 2);
        let outcome = generate_insights(Some(&backend), &seeded_snapshot()).await;
        assert!(matches!(outcome, InsightOutcome::Unavailable { .. }));
    }

    #[test]
    fn test_backend_from_settings() {
        assert!(backend_from_settings(&InsightSettings::default()).is_none());
        let settings = InsightSettings {
            host: Some("http://localhost:11434/".into()),
            ..Default::default()
        };
        assert!(backend_from_settings(&settings).is_some());
    }
}
