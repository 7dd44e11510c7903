//! Configuration module for Compliance Core.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Token and password settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign bearer tokens.
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,
    #[serde(default = "default_token_hours")]
    pub token_duration_hours: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

fn default_issuer() -> String {
    "compliance-core".to_string()
}

fn default_token_hours() -> i64 {
    12
}

fn default_min_password_length() -> usize {
    10
}

/// Compliance rules that vary per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    /// Days until an assignment is due when no due date is given.
    pub default_due_days: i64,
    /// Days after discovery by which a PHI breach must be notified.
    pub breach_notification_days: i64,
}

/// Log output settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output for local development.
    Pretty,
}

fn default_log_level() -> String {
    "compliance_core=info,tower_http=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (COMPLIANCE__*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("COMPLIANCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            default_due_days: 14,
            breach_notification_days: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compliance_config() {
        let config = ComplianceConfig::default();
        assert_eq!(config.default_due_days, 14);
        assert_eq!(config.breach_notification_days, 60);
    }

    #[test]
    fn test_auth_defaults_apply() {
        let auth: AuthConfig = serde_json::from_str(r#"{"jwt_secret": "s3cret"}"#).unwrap();
        assert_eq!(auth.jwt_issuer, "compliance-core");
        assert_eq!(auth.token_duration_hours, 12);
        assert_eq!(auth.min_password_length, 10);
    }

    #[test]
    fn test_logging_section() {
        let logging: LoggingConfig = serde_json::from_str(r#"{"format": "pretty"}"#).unwrap();
        assert_eq!(logging.format, LogFormat::Pretty);
        assert_eq!(logging.level, "compliance_core=info,tower_http=info");

        let logging = LoggingConfig::default();
        assert_eq!(logging.format, LogFormat::Json);
    }
}
