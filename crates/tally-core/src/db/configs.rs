//! Key/value configuration

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::Database;
use crate::error::{Error, Result};
use crate::fiscal::{FiscalConfig, FiscalMode};

const FISCAL_CONFIG_KEY: &str = "fiscal_config";

impl Database {
    /// Raw config value
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM configs WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Set a raw config value, replacing any previous one
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO configs (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Current fiscal policy, `calendar` when never set
    pub fn fiscal_config(&self) -> Result<FiscalConfig> {
        match self.get_config(FISCAL_CONFIG_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(FiscalConfig::default()),
        }
    }

    /// Replace the fiscal policy after validating it against the store
    pub fn set_fiscal_config(&mut self, config: &FiscalConfig) -> Result<()> {
        config.validate()?;
        if let FiscalMode::IncomeTrigger { trigger_category } = &config.mode {
            if self.get_category(trigger_category)?.is_none() {
                return Err(Error::NotFound(format!("category {}", trigger_category)));
            }
        }

        let json = serde_json::to_string(config)?;
        self.set_config(FISCAL_CONFIG_KEY, &json)?;
        info!("Fiscal policy set to {}", config.mode);
        Ok(())
    }
}
