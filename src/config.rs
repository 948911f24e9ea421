// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Memory,
}

/// Isolation level set at the start of every PostgreSQL unit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// `None` keeps the server default.
    pub fn set_statement(&self) -> Option<&'static str> {
        match self {
            Self::ReadCommitted => None,
            Self::RepeatableRead => Some("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ"),
            Self::Serializable => Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub isolation: IsolationLevel,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    /// Upper bound on one transfer unit; 0 disables it.
    pub deadline_ms: u64,
    pub retry: RetryConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

impl TransferConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            multiplier: cfg.multiplier,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`. `DATABASE_URL` overrides `database.url`.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_yaml(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
            other => other,
        })?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.backend == Backend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Invalid(
                "database.url is required for the postgres backend".to_string(),
            ));
        }
        if self.transfer.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transfer.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.transfer.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "transfer.retry.multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: bankledger.log
server:
  host: 127.0.0.1
  port: 8080
database:
  backend: memory
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.database.backend, Backend::Memory);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.isolation, IsolationLevel::ReadCommitted);
        assert_eq!(config.rotation, "daily");
        assert_eq!(config.transfer.deadline(), Some(Duration::from_secs(5)));
        assert_eq!(config.server_addr(), "127.0.0.1:8080");
        config.validate().unwrap();
    }

    #[test]
    fn test_postgres_requires_url() {
        let yaml = MINIMAL.replace("backend: memory", "backend: postgres");
        let config = AppConfig::from_yaml(&yaml).unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_retry_section_maps_to_policy() {
        let yaml = format!(
            "{}\ntransfer:\n  deadline_ms: 0\n  retry:\n    max_attempts: 5\n    initial_backoff_ms: 20\n    max_backoff_ms: 400\n    multiplier: 3.0\n",
            MINIMAL
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        let policy = RetryPolicy::from(&config.transfer.retry);

        assert_eq!(config.transfer.deadline(), None);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(20));
        assert_eq!(policy.max_backoff, Duration::from_millis(400));
    }

    #[test]
    fn test_isolation_level_statement() {
        assert_eq!(IsolationLevel::ReadCommitted.set_statement(), None);
        assert!(
            IsolationLevel::Serializable
                .set_statement()
                .unwrap()
                .ends_with("SERIALIZABLE")
        );
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let yaml = MINIMAL.replace("backend: memory", "backend: redis");
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::Parse { .. })
        ));
    }
}
