//! Selector settings and their loader
//!
//! ```yaml
//! global_upstream_strategy: use-newest
//! verbose: false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "RUN_SELECTOR_CONFIG";

/// Settings file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "run-selector.yaml";

/// Order in which upstream builds are offered when a triggering selector
/// defers to the global setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpstreamOrder {
    #[default]
    UseOldest,
    UseNewest,
}

/// Process-wide selector settings. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorSettings {
    pub global_upstream_strategy: UpstreamOrder,
    /// Default verbosity for requests that don't choose one
    pub verbose: bool,
}

impl SelectorSettings {
    pub fn with_global_upstream_strategy(mut self, order: UpstreamOrder) -> Self {
        self.global_upstream_strategy = order;
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse selector settings YAML")
    }
}

pub struct SettingsLoader {
    path: Option<PathBuf>,
}

impl SettingsLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Resolution order:
    /// 1. `RUN_SELECTOR_CONFIG` environment variable
    /// 2. `run-selector.yaml` in the working directory, if present
    /// 3. no file; [`SettingsLoader::load`] yields defaults
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::new(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::new(DEFAULT_CONFIG_FILE);
        }
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<SelectorSettings> {
        let Some(path) = &self.path else {
            info!("No selector settings file, using defaults");
            return Ok(SelectorSettings::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selector settings: {:?}", path))?;
        let settings = SelectorSettings::from_yaml_str(&content)
            .with_context(|| format!("Invalid selector settings: {:?}", path))?;
        info!(
            path = %path.display(),
            upstream = ?settings.global_upstream_strategy,
            "Loaded selector settings"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = SelectorSettings::default();
        assert_eq!(settings.global_upstream_strategy, UpstreamOrder::UseOldest);
        assert!(!settings.verbose);
    }

    #[test]
    fn test_parse_yaml() {
        let settings =
            SelectorSettings::from_yaml_str("global_upstream_strategy: use-newest\n").unwrap();
        assert_eq!(settings.global_upstream_strategy, UpstreamOrder::UseNewest);
        assert!(!settings.verbose);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(SelectorSettings::from_yaml_str("strategy: newest\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "verbose: true").unwrap();
        writeln!(file, "global_upstream_strategy: use-newest").unwrap();

        let settings = SettingsLoader::new(file.path()).load().unwrap();
        assert!(settings.verbose);
        assert_eq!(settings.global_upstream_strategy, UpstreamOrder::UseNewest);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SettingsLoader::new(dir.path().join("absent.yaml"))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read selector settings"));
    }
}
