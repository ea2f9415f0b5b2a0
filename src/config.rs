//! DagRelay Configuration Module
//!
//! Config is stored in `~/.config/dagrelay/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`DAGRELAY_TIMEOUT_MS`, `DAGRELAY_MAX_RETRIES`, `DAGRELAY_ADDRESS`)
//! 2. Config file (`~/.config/dagrelay/config.toml`)
//! 3. Defaults
//!
//! ```toml
//! providers = ["writer", "reviewer"]
//!
//! [invoker]
//! timeout_ms = 120000
//!
//! [runner]
//! max_retries = 2
//! retry_output_limit = 2000
//!
//! [transport]
//! address = "127.0.0.1:7400"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RelayError, Result};

pub const ENV_TIMEOUT_MS: &str = "DAGRELAY_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "DAGRELAY_MAX_RETRIES";
pub const ENV_ADDRESS: &str = "DAGRELAY_ADDRESS";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// Provider ids known to be available
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,

    #[serde(default)]
    pub invoker: InvokerConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokerConfig {
    /// Per-invocation timeout when a node sets none
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    /// Additional attempts after a validation failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Characters of the previous output echoed into a retry prompt
    #[serde(default = "default_retry_output_limit")]
    pub retry_output_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_output_limit: default_retry_output_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// `host:port` of the duplex endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_output_limit() -> usize {
    2_000
}

impl RelayConfig {
    /// Returns `~/.config/dagrelay/` on Unix, `%APPDATA%/dagrelay/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dagrelay")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default path
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RelayError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| RelayError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Creates parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| RelayError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| RelayError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| RelayError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>(ENV_TIMEOUT_MS) {
            self.invoker.timeout_ms = ms;
        }

        if let Some(retries) = env_parse::<u32>(ENV_MAX_RETRIES) {
            self.runner.max_retries = retries;
        }

        if let Ok(address) = std::env::var(ENV_ADDRESS) {
            if !address.is_empty() {
                self.transport.address = Some(address);
            }
        }

        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.invoker.timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_dagrelay() {
        let path = RelayConfig::config_path();
        assert!(path.to_string_lossy().contains("dagrelay"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
        assert_eq!(path.parent().unwrap(), RelayConfig::config_dir());
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.invoker.timeout_ms, 120_000);
        assert_eq!(config.runner.max_retries, 2);
        assert_eq!(config.runner.retry_output_limit, 2_000);
        assert!(config.transport.address.is_none());
        assert!(config.providers.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = RelayConfig {
            providers: vec!["writer".into()],
            invoker: InvokerConfig { timeout_ms: 500 },
            runner: RunnerConfig {
                max_retries: 4,
                retry_output_limit: 100,
            },
            transport: TransportConfig {
                address: Some("127.0.0.1:7400".into()),
            },
        };
        config.save_to(&path).unwrap();

        assert_eq!(RelayConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[runner]\nmax_retries = 5\n").unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        assert_eq!(config.runner.max_retries, 5);
        assert_eq!(config.runner.retry_output_limit, 2_000);
        assert_eq!(config.invoker.timeout_ms, 120_000);
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = RelayConfig::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[runner\nmax_retries = ").unwrap();

        let err = RelayConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "RELAY-060");
    }

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var(ENV_TIMEOUT_MS, "250");
        env::set_var(ENV_MAX_RETRIES, "7");
        env::set_var(ENV_ADDRESS, "10.0.0.1:9000");

        let config = RelayConfig::default().with_env();
        assert_eq!(config.invoker.timeout_ms, 250);
        assert_eq!(config.runner.max_retries, 7);
        assert_eq!(config.transport.address.as_deref(), Some("10.0.0.1:9000"));

        env::remove_var(ENV_TIMEOUT_MS);
        env::remove_var(ENV_MAX_RETRIES);
        env::remove_var(ENV_ADDRESS);
    }

    #[test]
    #[serial]
    fn test_env_ignores_empty_and_garbage() {
        env::set_var(ENV_TIMEOUT_MS, "soon");
        env::set_var(ENV_ADDRESS, "");

        let config = RelayConfig {
            transport: TransportConfig {
                address: Some("from-file:1".into()),
            },
            ..Default::default()
        }
        .with_env();
        assert_eq!(config.invoker.timeout_ms, 120_000);
        assert_eq!(config.transport.address.as_deref(), Some("from-file:1"));

        env::remove_var(ENV_TIMEOUT_MS);
        env::remove_var(ENV_ADDRESS);
    }

    #[test]
    fn test_toml_format() {
        let config = RelayConfig {
            providers: vec!["a".into()],
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("providers = ["));
        assert!(toml_str.contains("[invoker]"));
        assert!(toml_str.contains("timeout_ms = 120000"));
        assert!(toml_str.contains("[runner]"));
    }
}
