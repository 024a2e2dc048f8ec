//! Savings goals

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::{params, Connection};
use tracing::info;

use super::{column_error, parse_decimal, Database};
use crate::balances;
use crate::error::{Error, Result};
use crate::models::{new_id, GoalProgress, SavingsGoal};

fn validate_goal(name: &str, target_amount: Decimal) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("goal name is empty".into()));
    }
    if target_amount <= Decimal::ZERO {
        return Err(Error::Validation("goal target must be positive".into()));
    }
    Ok(name.to_string())
}

fn link_accounts(conn: &Connection, goal_id: &str, accounts: &[String]) -> Result<()> {
    for account_id in accounts {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE id = ?",
            params![account_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::NotFound(format!("account {}", account_id)));
        }
        conn.execute(
            "INSERT OR IGNORE INTO goal_accounts (goal_id, account_id) VALUES (?, ?)",
            params![goal_id, account_id],
        )?;
    }
    Ok(())
}

impl Database {
    /// Create a savings goal tracked against the given accounts
    pub fn create_goal(
        &mut self,
        name: &str,
        target_amount: Decimal,
        deadline: Option<NaiveDate>,
        target_accounts: &[String],
    ) -> Result<SavingsGoal> {
        let goal = SavingsGoal {
            id: new_id(),
            name: validate_goal(name, target_amount)?,
            target_amount,
            deadline,
            target_accounts: target_accounts.to_vec(),
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO savings_goals (id, name, target_amount, deadline) VALUES (?, ?, ?, ?)",
            params![
                goal.id,
                goal.name,
                goal.target_amount.to_string(),
                goal.deadline.map(|d| d.to_string())
            ],
        )?;
        link_accounts(&tx, &goal.id, &goal.target_accounts)?;
        tx.commit()?;

        info!("Created savings goal '{}'", goal.name);
        Ok(goal)
    }

    /// Fetch one goal with its target accounts
    pub fn get_goal(&self, id: &str) -> Result<Option<SavingsGoal>> {
        Ok(self.list_goals()?.into_iter().find(|g| g.id == id))
    }

    /// Replace a goal's name, target, deadline and target accounts
    pub fn update_goal(
        &mut self,
        id: &str,
        name: &str,
        target_amount: Decimal,
        deadline: Option<NaiveDate>,
        target_accounts: &[String],
    ) -> Result<SavingsGoal> {
        let goal = SavingsGoal {
            id: id.to_string(),
            name: validate_goal(name, target_amount)?,
            target_amount,
            deadline,
            target_accounts: target_accounts.to_vec(),
        };

        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE savings_goals SET name = ?, target_amount = ?, deadline = ? WHERE id = ?",
            params![
                goal.name,
                goal.target_amount.to_string(),
                goal.deadline.map(|d| d.to_string()),
                goal.id
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("savings goal {}", id)));
        }
        tx.execute("DELETE FROM goal_accounts WHERE goal_id = ?", params![goal.id])?;
        link_accounts(&tx, &goal.id, &goal.target_accounts)?;
        tx.commit()?;

        info!("Updated savings goal '{}'", goal.name);
        Ok(goal)
    }

    /// List goals with their target accounts
    pub fn list_goals(&self) -> Result<Vec<SavingsGoal>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, target_amount, deadline FROM savings_goals ORDER BY name")?;
        let mut goals = stmt
            .query_map([], |row| {
                let target: String = row.get(2)?;
                let deadline: Option<String> = row.get(3)?;
                Ok(SavingsGoal {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    target_amount: parse_decimal(&target).map_err(|e| column_error(2, e))?,
                    deadline: deadline.and_then(|d| d.parse().ok()),
                    target_accounts: Vec::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut targets = self
            .conn
            .prepare("SELECT account_id FROM goal_accounts WHERE goal_id = ? ORDER BY account_id")?;
        for goal in &mut goals {
            goal.target_accounts = targets
                .query_map(params![goal.id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
        }
        Ok(goals)
    }

    /// Delete a goal; its account links cascade
    pub fn delete_goal(&mut self, id: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM savings_goals WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("savings goal {}", id)));
        }
        Ok(())
    }

    /// Progress of every goal against current balances of its accounts
    pub fn goal_progress(&self) -> Result<Vec<GoalProgress>> {
        let totals = balances::account_totals(&self.all_transactions()?);
        let hundred = Decimal::from(100);

        Ok(self
            .list_goals()?
            .into_iter()
            .map(|goal| {
                let saved: Decimal = goal
                    .target_accounts
                    .iter()
                    .filter_map(|id| totals.get(id))
                    .sum();
                let remaining = (goal.target_amount - saved).max(Decimal::ZERO);
                // Legacy or restored goals may carry a zero target
                let percent = saved
                    .checked_div(goal.target_amount)
                    .and_then(|ratio| ratio.checked_mul(hundred))
                    .unwrap_or(Decimal::ZERO)
                    .clamp(Decimal::ZERO, hundred)
                    .round_dp(1);
                GoalProgress {
                    goal,
                    saved,
                    remaining,
                    percent,
                }
            })
            .collect())
    }
}
