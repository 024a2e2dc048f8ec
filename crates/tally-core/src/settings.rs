//! Application settings
//!
//! Resolution order: built-in defaults, then `tally.toml` in the data
//! directory, then environment variables.
//!
//! ```toml
//! snapshot_key = "ledger"
//!
//! [insights]
//! host = "http://localhost:11434"
//! model = "llama3.2"
//! timeout_secs = 60
//! ```
//!
//! Environment variables:
//! - `TALLY_DATA_DIR`: data directory (default: platform data dir + `tally`)
//! - `TALLY_PASSWORD`: snapshot password; unset means snapshots are not encrypted
//! - `OLLAMA_HOST`: insight backend URL; unset means insights are not configured
//! - `OLLAMA_MODEL`: insight model name

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::snapshot::DEFAULT_SNAPSHOT_KEY;

pub const SETTINGS_FILE: &str = "tally.toml";
pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Text-generation collaborator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightSettings {
    /// Base URL; `None` means not configured
    pub host: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            host: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Resolved settings for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySettings {
    pub data_dir: PathBuf,
    pub snapshot_key: String,
    /// Snapshot password (never read from the settings file)
    pub password: Option<String>,
    pub insights: InsightSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    snapshot_key: Option<String>,
    insights: Option<RawInsights>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInsights {
    host: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
}

impl TallySettings {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            password: None,
            insights: InsightSettings::default(),
        }
    }

    /// Load settings from the process environment
    ///
    /// `data_dir` (e.g. a CLI flag) wins over `TALLY_DATA_DIR`.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self> {
        Self::load_with(data_dir, |name| std::env::var(name).ok())
    }

    /// Load settings with an explicit environment lookup
    pub fn load_with(
        data_dir: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| env("TALLY_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let mut settings = Self::with_data_dir(&data_dir);
        settings.apply_file(&data_dir.join(SETTINGS_FILE))?;
        settings.apply_env(env);
        Ok(settings)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let raw: RawSettings = toml::from_str(&fs::read_to_string(path)?)?;
        debug!("Loaded settings from {}", path.display());

        if let Some(key) = raw.snapshot_key {
            self.snapshot_key = key;
        }
        if let Some(insights) = raw.insights {
            if insights.host.is_some() {
                self.insights.host = insights.host;
            }
            if let Some(model) = insights.model {
                self.insights.model = model;
            }
            if let Some(timeout) = insights.timeout_secs {
                self.insights.timeout_secs = timeout;
            }
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(password) = non_empty("TALLY_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(host) = non_empty("OLLAMA_HOST") {
            self.insights.host = Some(host);
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.insights.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            TallySettings::load_with(Some(dir.path().to_path_buf()), env_from(&[])).unwrap();
        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.snapshot_key, DEFAULT_SNAPSHOT_KEY);
        assert_eq!(settings.password, None);
        assert_eq!(settings.insights, InsightSettings::default());
    }

    #[test]
    fn test_file_then_env_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "snapshot_key = \"household\"\n[insights]\nhost = \"http://file:11434\"\nmodel = \"gemma3\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let settings = TallySettings::load_with(
            None,
            env_from(&[
                ("TALLY_DATA_DIR", dir.path().to_str().unwrap()),
                ("OLLAMA_MODEL", "qwen2.5"),
                ("TALLY_PASSWORD", "pw"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.snapshot_key, "household");
        assert_eq!(settings.insights.host.as_deref(), Some("http://file:11434"));
        assert_eq!(settings.insights.model, "qwen2.5");
        assert_eq!(settings.insights.timeout_secs, 5);
        assert_eq!(settings.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "snapshot_key = [").unwrap();
        let result = TallySettings::load_with(Some(dir.path().to_path_buf()), env_from(&[]));
        assert!(matches!(result, Err(crate::Error::Settings(_))));
    }
}
