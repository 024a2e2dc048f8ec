//! Fiscal period resolution
//!
//! Maps a month key (or "all") to a concrete `[start, end]` window under the
//! configured policy. Resolution is pure; callers re-run it whenever the
//! history or the policy changes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Transaction;

/// How a "month" is cut
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FiscalMode {
    /// Plain calendar months
    #[default]
    Calendar,
    /// Periods run from `start_day` of the previous month to the day before `start_day`
    FixedDay { start_day: u32 },
    /// Periods start at the first transaction in `trigger_category` (a category id)
    IncomeTrigger { trigger_category: String },
}

impl std::fmt::Display for FiscalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar => write!(f, "calendar"),
            Self::FixedDay { start_day } => write!(f, "fixed day {}", start_day),
            Self::IncomeTrigger { trigger_category } => {
                write!(f, "income trigger ({})", trigger_category)
            }
        }
    }
}

/// Process-wide fiscal policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FiscalConfig {
    pub mode: FiscalMode,
}

impl FiscalConfig {
    pub fn calendar() -> Self {
        Self::default()
    }

    pub fn fixed_day(start_day: u32) -> Self {
        Self {
            mode: FiscalMode::FixedDay { start_day },
        }
    }

    pub fn income_trigger(trigger_category: impl Into<String>) -> Self {
        Self {
            mode: FiscalMode::IncomeTrigger {
                trigger_category: trigger_category.into(),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            FiscalMode::FixedDay { start_day } if !(1..=31).contains(start_day) => Err(
                Error::Validation(format!("start day must be 1-31, got {}", start_day)),
            ),
            FiscalMode::IncomeTrigger { trigger_category } if trigger_category.trim().is_empty() => {
                Err(Error::Validation("trigger category is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// A user-selected period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKey {
    All,
    Month { year: i32, month: u32 },
}

impl PeriodKey {
    /// The month containing `now`
    pub fn current(now: DateTime<Utc>) -> Self {
        Self::Month {
            year: now.year(),
            month: now.month(),
        }
    }
}

impl std::str::FromStr for PeriodKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let invalid = || Error::Validation(format!("period must be 'all' or YYYY-MM, got '{}'", s));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self::Month { year, month })
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

/// A resolved window. `start == None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl Period {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| instant >= start) && instant <= self.end
    }

    /// Transactions falling inside the window
    pub fn filter<'a>(&self, history: &'a [Transaction]) -> Vec<&'a Transaction> {
        history.iter().filter(|tx| self.contains(tx.date)).collect()
    }
}

fn one_ms() -> Duration {
    Duration::milliseconds(1)
}

fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn day_start(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| Error::Validation(format!("no such date {:04}-{:02}-{:02}", year, month, day)))
}

fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (ny, nm) = next_month(year, month);
    let days = (day_start(ny, nm, 1)? - day_start(year, month, 1)?).num_days();
    Ok(days as u32)
}

/// Calendar bounds of a month: first instant to last millisecond
fn month_bounds(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (ny, nm) = next_month(year, month);
    Ok((day_start(year, month, 1)?, day_start(ny, nm, 1)? - one_ms()))
}

fn range_label(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!("{} – {}", start.format("%-d %b"), end.format("%-d %b"))
}

fn calendar_period(year: i32, month: u32) -> Result<Period> {
    let (start, end) = month_bounds(year, month)?;
    Ok(Period {
        start: Some(start),
        end,
        label: start.format("%B %Y").to_string(),
    })
}

fn fixed_day_period(year: i32, month: u32, start_day: u32) -> Result<Period> {
    let (py, pm) = prev_month(year, month);
    let start = day_start(py, pm, start_day.min(days_in_month(py, pm)?))?;
    let end = day_start(year, month, start_day.min(days_in_month(year, month)?))? - one_ms();
    Ok(Period {
        start: Some(start),
        end,
        label: range_label(start, end),
    })
}

fn earliest_trigger(
    history: &[Transaction],
    category_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|tx| tx.category_id.as_deref() == Some(category_id))
        .map(|tx| tx.date)
        .filter(|date| *date >= from && *date <= to)
        .min()
}

fn income_trigger_period(
    year: i32,
    month: u32,
    category_id: &str,
    history: &[Transaction],
) -> Result<Period> {
    let (py, pm) = prev_month(year, month);
    let (prev_start, prev_end) = month_bounds(py, pm)?;
    let Some(start) = earliest_trigger(history, category_id, prev_start, prev_end) else {
        return calendar_period(year, month);
    };

    let (cur_start, cur_end) = month_bounds(year, month)?;
    let end = match earliest_trigger(history, category_id, cur_start, cur_end) {
        Some(next) => next - one_ms(),
        None => cur_end,
    };
    Ok(Period {
        start: Some(start),
        end,
        label: range_label(start, end),
    })
}

/// Resolve a period key under a fiscal policy
///
/// `history` is only consulted in income-trigger mode. `now` closes the
/// "all" window.
pub fn resolve(
    key: PeriodKey,
    config: &FiscalConfig,
    history: &[Transaction],
    now: DateTime<Utc>,
) -> Result<Period> {
    let (year, month) = match key {
        PeriodKey::All => {
            return Ok(Period {
                start: None,
                end: now,
                label: "All time".into(),
            })
        }
        PeriodKey::Month { year, month } => (year, month),
    };

    match &config.mode {
        FiscalMode::Calendar => calendar_period(year, month),
        FiscalMode::FixedDay { start_day } => {
            config.validate()?;
            fixed_day_period(year, month, *start_day)
        }
        FiscalMode::IncomeTrigger { trigger_category } => {
            income_trigger_period(year, month, trigger_category, history)
        }
    }
}

impl Database {
    /// Resolve a period with the stored policy and full history
    pub fn resolve_period(&self, key: PeriodKey, now: DateTime<Utc>) -> Result<Period> {
        let config = self.fiscal_config()?;
        let history = match config.mode {
            FiscalMode::IncomeTrigger { .. } => self.all_transactions()?,
            _ => Vec::new(),
        };
        resolve(key, &config, &history, now)
    }
}
