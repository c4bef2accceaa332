//! Relay configuration, loaded from an optional TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the race engine.
    pub upstream_url: String,
    /// Group the checkpoints are filed under.
    pub group_id: String,
    /// Cumulative distance reported with every checkpoint.
    pub km_travelled: f64,
    pub upstream_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: "http://localhost:8000".to_string(),
            group_id: "tkfegbl1.testgroup".to_string(),
            km_travelled: 265.5,
            upstream_timeout_secs: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid relay config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RelayConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(RelayConfig::from_toml("").unwrap(), RelayConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = RelayConfig::from_toml(
            r#"
            upstream_url = "http://engine:9000"
            km_travelled = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream_url, "http://engine:9000");
        assert_eq!(config.km_travelled, 12.5);
        assert_eq!(config.group_id, "tkfegbl1.testgroup");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        assert!(matches!(
            RelayConfig::from_toml("km_travelled = \"far\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
