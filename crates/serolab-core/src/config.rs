//! Core configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::reports::DEFAULT_MAX_IN_FLIGHT;

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Settings for opening a [`crate::LabCore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// SQLite file path; in-memory when absent
    #[serde(default)]
    pub database_path: Option<String>,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_fetches: usize,

    /// `tracing-subscriber` filter directive, used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_in_flight_fetches: default_max_in_flight(),
            log_filter: default_log_filter(),
        }
    }
}

impl CoreConfig {
    /// Parse from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: CoreConfig =
            serde_json::from_str(json).context("failed to parse core configuration")?;
        Ok(config.normalized())
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    fn normalized(mut self) -> Self {
        self.max_in_flight_fetches = self.max_in_flight_fetches.max(1);
        if self.log_filter.trim().is_empty() {
            self.log_filter = default_log_filter();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.max_in_flight_fetches, 8);
        assert_eq!(config.log_filter, "info");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = CoreConfig::from_json_str(r#"{"max_in_flight_fetches": 0}"#).unwrap();
        assert_eq!(config.max_in_flight_fetches, 1);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = CoreConfig::from_json_str("{not json").unwrap_err();
        assert!(err.to_string().contains("core configuration"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serolab.json");
        std::fs::write(
            &path,
            r#"{"database_path": "lab.db", "log_filter": "serolab_core=debug"}"#,
        )
        .unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("lab.db"));
        assert_eq!(config.log_filter, "serolab_core=debug");
        assert_eq!(config.max_in_flight_fetches, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CoreConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
