//! Configuration System
//!
//! Hierarchical configuration loading, figment-backed, merging in order:
//! - `config.toml` (default configuration)
//! - `config.local.toml` (git-ignored local overrides)
//! - Environment variables (`FEDQP_` prefix, `__` as the nesting separator)
//!
//! (spec.md §4.8 "Configuration")
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//!
//! [federation]
//! config_file = "/data/federation.json"
//!
//! [execution]
//! query_timeout_secs = 30
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! FEDQP_SERVER__BIND_ADDR=0.0.0.0:9090
//! FEDQP_EXECUTION__QUERY_TIMEOUT_SECS=60
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level FedQP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FedqpConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub federation: FederationConfig,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Federation config file location; defaults to the `CONFIG_FILE` env var
/// if set, else the `federation.config_file` key (spec.md §6 "`CONFIG_FILE`
/// environment variable").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    #[serde(default = "default_federation_config_file")]
    pub config_file: String,
}

/// Execution-engine tunables surfaced through configuration rather than
/// hardcoded (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "default_bind_join_raised_limit")]
    pub bind_join_raised_limit: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

/// Logging configuration (spec.md §4.7 "tracing conventions").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_federation_config_file() -> String {
    std::env::var("CONFIG_FILE").unwrap_or_else(|_| "federation.json".to_string())
}
fn default_limit() -> u64 {
    10_000
}
fn default_bind_join_raised_limit() -> u64 {
    10_000
}
fn default_query_timeout_secs() -> u64 {
    30
}
fn default_max_queue_depth() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig {
            config_file: default_federation_config_file(),
        }
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            default_limit: default_limit(),
            bind_join_raised_limit: default_bind_join_raised_limit(),
            query_timeout_secs: default_query_timeout_secs(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for FedqpConfig {
    fn default() -> Self {
        FedqpConfig {
            server: ServerConfig::default(),
            federation: FederationConfig::default(),
            execution: ExecutionSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FedqpConfig {
    /// Load configuration from default locations, merged in order:
    /// `config.toml`, `config.local.toml`, then `FEDQP_*` env vars.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            FedqpConfig::default(),
        ))
        .merge(Toml::file("config.toml"))
        .merge(Toml::file("config.local.toml"))
        .merge(Env::prefixed("FEDQP_").split("__"))
        .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(
            FedqpConfig::default(),
        ))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FEDQP_").split("__"))
        .extract()
    }

    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.execution.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_shape() {
        let config = FedqpConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.execution.default_limit, 10_000);
        assert_eq!(config.execution.bind_join_raised_limit, 10_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn config_serialization_round_trips_sections() {
        let config = FedqpConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[federation]"));
        assert!(toml_str.contains("[execution]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn env_override_wins_over_file_default() {
        std::env::set_var("FEDQP_SERVER__BIND_ADDR", "127.0.0.1:9999");
        let config: FedqpConfig = Figment::from(figment::providers::Serialized::defaults(
            FedqpConfig::default(),
        ))
        .merge(Env::prefixed("FEDQP_").split("__"))
        .extract()
        .unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9999");
        std::env::remove_var("FEDQP_SERVER__BIND_ADDR");
    }
}
