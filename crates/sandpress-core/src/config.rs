//! Isolation configuration
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `sandpress.toml` at the project root (`[isolation]` table)
//! 3. Environment: `SANDPRESS_ISOLATION`, `SANDPRESS_DATABASE`, `SANDPRESS_SETTLE_MS`

use crate::errors::{io_error, IsolationError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Name of the project config file (also a project-root marker)
pub const CONFIG_FILE: &str = "sandpress.toml";

pub const ENV_MODE: &str = "SANDPRESS_ISOLATION";
pub const ENV_DATABASE: &str = "SANDPRESS_DATABASE";
pub const ENV_SETTLE_MS: &str = "SANDPRESS_SETTLE_MS";

/// Default suffix appended to the live database path for the snapshot
pub const DEFAULT_SNAPSHOT_SUFFIX: &str = ".snapshot";

/// Which isolation strategy the harness drives per test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Savepoint scope per test; snapshot only as a hard-reset fallback
    #[default]
    Transaction,
    /// Restore the file snapshot before every test
    Snapshot,
    /// No isolation; tests see whatever state earlier tests left
    Disabled,
}

impl IsolationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Transaction => "transaction",
            IsolationMode::Snapshot => "snapshot",
            IsolationMode::Disabled => "disabled",
        }
    }
}

impl FromStr for IsolationMode {
    type Err = IsolationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transaction" | "transactions" | "savepoint" => Ok(IsolationMode::Transaction),
            "snapshot" | "file" => Ok(IsolationMode::Snapshot),
            "none" | "disabled" | "off" => Ok(IsolationMode::Disabled),
            _ => Err(IsolationError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved isolation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationConfig {
    pub mode: IsolationMode,
    /// Explicit database path; `None` means search the conventional locations
    pub database: Option<PathBuf>,
    /// Pause after closing the handle, before overwriting the live file
    pub settle_delay_ms: u64,
    pub snapshot_suffix: String,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            mode: IsolationMode::default(),
            database: None,
            settle_delay_ms: default_settle_delay_ms(),
            snapshot_suffix: DEFAULT_SNAPSHOT_SUFFIX.to_string(),
        }
    }
}

// Windows may hold the file lock briefly after the handle is closed.
fn default_settle_delay_ms() -> u64 {
    if cfg!(windows) {
        50
    } else {
        0
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    isolation: IsolationSection,
}

#[derive(Debug, Default, Deserialize)]
struct IsolationSection {
    mode: Option<String>,
    database: Option<PathBuf>,
    settle_delay_ms: Option<u64>,
    snapshot_suffix: Option<String>,
}

impl IsolationConfig {
    /// Load defaults, then `sandpress.toml` under `project_root`, then the
    /// process environment
    pub fn load(project_root: Option<&Path>) -> Result<Self> {
        let mut config = match project_root.map(|root| root.join(CONFIG_FILE)) {
            Some(path) if path.is_file() => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| io_error("read_config", &path, e))?;
                Self::from_toml_str(&text)?
            }
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        if let (Some(root), Some(db)) = (project_root, config.database.as_ref()) {
            if db.is_relative() {
                config.database = Some(root.join(db));
            }
        }
        Ok(config)
    }

    /// Parse a `sandpress.toml` document on top of the defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(text).map_err(|e| IsolationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        let section = file.isolation;
        let mut config = Self::default();
        if let Some(mode) = section.mode {
            config.mode = mode.parse()?;
        }
        if section.database.is_some() {
            config.database = section.database;
        }
        if let Some(ms) = section.settle_delay_ms {
            config.settle_delay_ms = ms;
        }
        if let Some(suffix) = section.snapshot_suffix {
            config.snapshot_suffix = validate_suffix(suffix)?;
        }
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_MODE).filter(|v| !v.trim().is_empty()) {
            self.mode = mode.parse()?;
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(ms) = lookup(ENV_SETTLE_MS).filter(|v| !v.trim().is_empty()) {
            self.settle_delay_ms = ms
                .trim()
                .parse()
                .map_err(|_| IsolationError::InvalidConfig {
                    reason: format!("{} must be whole milliseconds, got {:?}", ENV_SETTLE_MS, ms),
                })?;
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn validate_suffix(suffix: String) -> Result<String> {
    if suffix.is_empty() || suffix.contains(['/', '\\']) {
        return Err(IsolationError::InvalidConfig {
            reason: format!("snapshot_suffix must be a non-empty file suffix, got {:?}", suffix),
        }
        .into());
    }
    Ok(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IsoErrorKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IsolationConfig::default();
        assert_eq!(config.mode, IsolationMode::Transaction);
        assert_eq!(config.database, None);
        assert_eq!(config.snapshot_suffix, ".snapshot");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Snapshot".parse(), Ok(IsolationMode::Snapshot));
        assert_eq!(" transaction ".parse(), Ok(IsolationMode::Transaction));
        assert_eq!("off".parse(), Ok(IsolationMode::Disabled));
        assert_eq!("none".parse(), Ok(IsolationMode::Disabled));
        assert!("bogus".parse::<IsolationMode>().is_err());
    }

    #[test]
    fn test_toml_section() {
        let config = IsolationConfig::from_toml_str(
            r#"
            [isolation]
            mode = "snapshot"
            database = "wp/db.sqlite"
            settle_delay_ms = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, IsolationMode::Snapshot);
        assert_eq!(config.database, Some(PathBuf::from("wp/db.sqlite")));
        assert_eq!(config.settle_delay(), Duration::from_millis(25));
        assert_eq!(config.snapshot_suffix, ".snapshot");
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = IsolationConfig::from_toml_str("").unwrap();
        assert_eq!(config, IsolationConfig::default());
    }

    #[test]
    fn test_invalid_mode_in_toml_is_rejected() {
        let err = IsolationConfig::from_toml_str("[isolation]\nmode = \"maybe\"\n").unwrap_err();
        assert_eq!(err.kind(), IsoErrorKind::InvalidInput);
    }

    #[test]
    fn test_bad_suffix_rejected() {
        let err =
            IsolationConfig::from_toml_str("[isolation]\nsnapshot_suffix = \"a/b\"\n").unwrap_err();
        assert_eq!(err.kind(), IsoErrorKind::Config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IsolationConfig::default();
        config
            .apply_env(env(&[
                (ENV_MODE, "snapshot"),
                (ENV_DATABASE, "/tmp/live.db"),
                (ENV_SETTLE_MS, "7"),
            ]))
            .unwrap();

        assert_eq!(config.mode, IsolationMode::Snapshot);
        assert_eq!(config.database, Some(PathBuf::from("/tmp/live.db")));
        assert_eq!(config.settle_delay_ms, 7);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = IsolationConfig::default();
        config.apply_env(env(&[(ENV_MODE, "  ")])).unwrap();
        assert_eq!(config.mode, IsolationMode::Transaction);
    }

    #[test]
    fn test_bad_settle_value_is_config_error() {
        let mut config = IsolationConfig::default();
        let err = config
            .apply_env(env(&[(ENV_SETTLE_MS, "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), IsoErrorKind::Config);
    }
}
