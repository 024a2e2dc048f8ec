//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Name used when a transaction names no account at all
pub const DEFAULT_ACCOUNT_NAME: &str = "Main Account";

/// Display label for transactions without a category
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Generate a fresh opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A money container (bank account, wallet, card)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub is_savings: bool,
}

/// Transaction type, also used as the category type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    /// One leg of a transfer between two accounts
    Transfer,
    /// Non-flow adjustment: moves the running balance, never counts as income or expense
    Balance,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Balance => "balance",
        }
    }

    /// Whether this kind counts toward income/expense aggregates
    pub fn is_flow(&self) -> bool {
        matches!(self, Self::Income | Self::Expense)
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "balance" | "adjustment" => Ok(Self::Balance),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Budgeting group a category belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Recurring,
    #[default]
    General,
    Savings,
    Debt,
}

impl CategoryGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recurring => "recurring",
            Self::General => "general",
            Self::Savings => "savings",
            Self::Debt => "debt",
        }
    }
}

impl std::str::FromStr for CategoryGroup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recurring" => Ok(Self::Recurring),
            "general" => Ok(Self::General),
            "savings" => Ok(Self::Savings),
            "debt" => Ok(Self::Debt),
            _ => Err(format!("Unknown category group: {}", s)),
        }
    }
}

impl std::fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending/earning category. `(name, kind)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: TransactionKind,
    pub group: CategoryGroup,
}

/// A stored transaction row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Negative = outflow, positive = inflow
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub account_id: String,
    pub category_id: Option<String>,
}

/// Reference to an account by id or by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl AccountRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Reference to a category by id or by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl CategoryRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// A transaction candidate before entity resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Reusing an existing id overwrites that row
    pub id: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub account: AccountRef,
    pub category: CategoryRef,
}

impl NewTransaction {
    pub fn new(
        date: DateTime<Utc>,
        description: impl Into<String>,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: new_id(),
            date,
            description: description.into(),
            amount,
            kind,
            account: AccountRef::default(),
            category: CategoryRef::default(),
        }
    }

    pub fn with_account(mut self, account: AccountRef) -> Self {
        self.account = account;
        self
    }

    pub fn with_category(mut self, category: CategoryRef) -> Self {
        self.category = category;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// User input describing money moving between two accounts
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub date: DateTime<Utc>,
    pub description: String,
    /// Magnitude; the sign is ignored
    pub amount: Decimal,
    pub from: AccountRef,
    pub to: AccountRef,
    pub category: CategoryRef,
}

/// A transfer ready for ingestion: two legs plus an explicit link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub id: String,
    pub source: NewTransaction,
    pub dest: NewTransaction,
}

impl NewTransfer {
    /// Build both legs: negative on the source account, positive on the destination
    pub fn new(request: TransferRequest) -> Self {
        let magnitude = request.amount.abs();
        let source = NewTransaction::new(
            request.date,
            request.description.clone(),
            -magnitude,
            TransactionKind::Transfer,
        )
        .with_account(request.from)
        .with_category(request.category.clone());
        let dest = NewTransaction::new(
            request.date,
            request.description,
            magnitude,
            TransactionKind::Transfer,
        )
        .with_account(request.to)
        .with_category(request.category);

        Self {
            id: new_id(),
            source,
            dest,
        }
    }
}

/// One unit of an ingestion batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewEntry {
    Flow(NewTransaction),
    Transfer(NewTransfer),
}

impl NewEntry {
    /// The transaction rows this entry writes
    pub fn legs(&self) -> Vec<&NewTransaction> {
        match self {
            Self::Flow(tx) => vec![tx],
            Self::Transfer(t) => vec![&t.source, &t.dest],
        }
    }
}

impl From<NewTransaction> for NewEntry {
    fn from(tx: NewTransaction) -> Self {
        Self::Flow(tx)
    }
}

impl From<NewTransfer> for NewEntry {
    fn from(t: NewTransfer) -> Self {
        Self::Transfer(t)
    }
}

/// A stored ledger entry with transfer pairing made explicit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerEntry {
    Flow(Transaction),
    Transfer {
        id: String,
        source: Transaction,
        dest: Transaction,
    },
}

impl LedgerEntry {
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Flow(tx) => tx.date,
            Self::Transfer { source, .. } => source.date,
        }
    }
}

/// A savings target tracked against one or more accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: String,
    pub name: String,
    pub target_amount: Decimal,
    pub deadline: Option<NaiveDate>,
    pub target_accounts: Vec<String>,
}

/// Progress of a savings goal against current account balances
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub goal: SavingsGoal,
    pub saved: Decimal,
    pub remaining: Decimal,
    /// 0-100, capped
    pub percent: Decimal,
}

/// Counts of rows per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub accounts: i64,
    pub categories: i64,
    pub transactions: i64,
    pub transfers: i64,
    pub goals: i64,
}
