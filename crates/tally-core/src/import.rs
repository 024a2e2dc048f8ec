//! Spreadsheet import: mapped CSV columns to transaction candidates

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AccountRef, CategoryRef, NewTransaction, TransactionKind};

/// Which header names hold which field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    /// Account name used when the row has no account column/value
    #[serde(default)]
    pub default_account: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: "Date".into(),
            description: "Description".into(),
            amount: "Amount".into(),
            category: Some("Category".into()),
            account: Some("Account".into()),
            kind: Some("Type".into()),
            default_account: None,
        }
    }
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    account: Option<usize>,
    kind: Option<usize>,
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

fn required_column(headers: &StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name).ok_or_else(|| Error::Import(format!("Missing column: {}", name)))
}

impl Columns {
    fn locate(headers: &StringRecord, mapping: &ColumnMapping) -> Result<Self> {
        let optional = |name: &Option<String>| name.as_deref().and_then(|n| find_column(headers, n));
        Ok(Self {
            date: required_column(headers, &mapping.date)?,
            description: required_column(headers, &mapping.description)?,
            amount: required_column(headers, &mapping.amount)?,
            category: optional(&mapping.category),
            account: optional(&mapping.account),
            kind: optional(&mapping.kind),
        })
    }
}

fn cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse a mapped CSV into candidates
///
/// Rows without a type value are typed by sign: negative is an expense,
/// positive is income.
pub fn parse_csv<R: Read>(reader: R, mapping: &ColumnMapping) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = Columns::locate(&headers, mapping)?;
    let mut transactions = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = index + 2;

        let date_str = cell(&record, Some(columns.date))
            .ok_or_else(|| Error::Import(format!("line {}: missing date", line)))?;
        let date = parse_date(&date_str).map_err(|_| {
            Error::Import(format!("line {}: unable to parse date '{}'", line, date_str))
        })?;

        let description = cell(&record, Some(columns.description))
            .ok_or_else(|| Error::Import(format!("line {}: missing description", line)))?;

        let amount_str = cell(&record, Some(columns.amount))
            .ok_or_else(|| Error::Import(format!("line {}: missing amount", line)))?;
        let amount = parse_amount(&amount_str).map_err(|_| {
            Error::Import(format!("line {}: unable to parse amount '{}'", line, amount_str))
        })?;

        let kind = match cell(&record, columns.kind) {
            Some(k) => k
                .parse::<TransactionKind>()
                .map_err(|e| Error::Import(format!("line {}: {}", line, e)))?,
            None if amount.is_sign_negative() => TransactionKind::Expense,
            None => TransactionKind::Income,
        };

        let account = cell(&record, columns.account)
            .or_else(|| mapping.default_account.clone())
            .map(AccountRef::name)
            .unwrap_or_default();
        let category = cell(&record, columns.category)
            .map(CategoryRef::name)
            .unwrap_or_default();

        transactions.push(
            NewTransaction::new(date, description, amount, kind)
                .with_account(account)
                .with_category(category),
        );
    }

    debug!("Parsed {} candidate(s) from CSV", transactions.len());
    Ok(transactions)
}

/// Parse a date cell: `YYYY-MM-DD`, `MM/DD/YYYY` or a full RFC 3339 instant
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
    ];
    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount cell, handling currency symbols, separators and parentheses
pub fn parse_amount(s: &str) -> Result<Decimal> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed.replace(['$', ',', ' ', '(', ')'], "");

    let value = cleaned
        .parse::<Decimal>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))?;
    Ok(if negative { -value.abs() } else { value })
}
