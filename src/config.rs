use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::transfer::MonitorPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid ADDRESS override '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("Built-in JWT secret refused in '{0}' environment, set JWT_SECRET")]
    InsecureJwtSecret(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// `minutely`, `hourly`, `daily` or `never`
    pub rotation: String,
    /// Rotated files kept on disk; unset keeps all of them
    #[serde(default)]
    pub max_log_files: Option<usize>,
    pub gateway: GatewayConfig,
    /// PostgreSQL ledger URL; absent means the in-memory ledger (simulation)
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// HS256 secret for bearer tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Transfer monitor tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub step_secs: u64,
    /// Monitors allowed to poll at the same time
    pub max_concurrent: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 5,
            step_secs: 2,
            max_concurrent: 1024,
        }
    }
}

impl From<&MonitorConfig> for MonitorPolicy {
    fn from(cfg: &MonitorConfig) -> Self {
        MonitorPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
            step: Duration::from_secs(cfg.step_secs),
        }
    }
}

/// Fallback secret when neither the file nor `JWT_SECRET` sets one
pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// The only environment allowed to run on [`DEFAULT_JWT_SECRET`]
pub const DEV_ENV: &str = "dev";

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate(env)?;
        Ok(config)
    }

    /// Checks that depend on the environment name
    pub fn validate(&self, env: &str) -> Result<(), ConfigError> {
        if env != DEV_ENV && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret(env.to_string()));
        }
        Ok(())
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// `DATABASE_URL`, `ADDRESS` (host:port) and `JWT_SECRET` win over the file
    pub fn apply_env_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.postgres_url = Some(url);
        }

        if let Some(addr) = var("ADDRESS").filter(|v| !v.is_empty()) {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidAddress(addr.clone()))?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidAddress(addr.clone()))?;
            if !host.is_empty() {
                self.gateway.host = host.to_string();
            }
            self.gateway.port = port;
        }

        if let Some(secret) = var("JWT_SECRET").filter(|v| !v.is_empty()) {
            self.jwt_secret = secret;
        }

        Ok(())
    }

    pub fn monitor_policy(&self) -> MonitorPolicy {
        MonitorPolicy::from(&self.monitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
"#;

    #[test]
    fn test_defaults_for_optional_sections() {
        let cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(cfg.postgres_url.is_none());
        assert!(cfg.max_log_files.is_none());
        assert_eq!(cfg.monitor.max_attempts, 5);
        assert_eq!(cfg.monitor.max_concurrent, 1024);
        assert_eq!(cfg.monitor_policy(), MonitorPolicy::default());
    }

    #[test]
    fn test_partial_monitor_section() {
        let yaml = format!("{}monitor:\n  max_attempts: 3\n", MINIMAL);
        let cfg = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.monitor.max_attempts, 3);
        assert_eq!(cfg.monitor.base_delay_secs, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://u:p@db:5432/ledger"),
            ("ADDRESS", "127.0.0.1:9090"),
            ("JWT_SECRET", "s3cret"),
        ]
        .into_iter()
        .collect();

        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(
            cfg.postgres_url.as_deref(),
            Some("postgres://u:p@db:5432/ledger")
        );
        assert_eq!(cfg.gateway.host, "127.0.0.1");
        assert_eq!(cfg.gateway.port, 9090);
        assert_eq!(cfg.jwt_secret, "s3cret");
    }

    #[test]
    fn test_port_only_address() {
        let mut cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        cfg.apply_env_overrides(|k| (k == "ADDRESS").then(|| ":7000".to_string()))
            .unwrap();
        assert_eq!(cfg.gateway.host, "0.0.0.0");
        assert_eq!(cfg.gateway.port, 7000);
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        let err = cfg
            .apply_env_overrides(|k| (k == "ADDRESS").then(|| "nonsense".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }

    #[test]
    fn test_default_secret_only_in_dev() {
        let cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.jwt_secret, DEFAULT_JWT_SECRET);
        assert!(cfg.validate("dev").is_ok());

        for env in ["prod", "staging", "Dev"] {
            let err = cfg.validate(env).unwrap_err();
            assert!(matches!(err, ConfigError::InsecureJwtSecret(ref e) if e == env));
        }
    }

    #[test]
    fn test_secret_from_env_passes_in_prod() {
        let mut cfg = AppConfig::from_yaml(MINIMAL).unwrap();
        cfg.apply_env_overrides(|k| (k == "JWT_SECRET").then(|| "rotated-secret".to_string()))
            .unwrap();
        assert!(cfg.validate("prod").is_ok());
    }

    #[test]
    fn test_shipped_prod_file_needs_secret() {
        let content = std::fs::read_to_string("config/prod.yaml").unwrap();
        let cfg = AppConfig::from_yaml(&content).unwrap();
        assert!(matches!(
            cfg.validate("prod"),
            Err(ConfigError::InsecureJwtSecret(_))
        ));
    }
}
