//! Configuration module for junkmail.

use serde::Deserialize;
use std::path::Path;

use crate::settings::{MAX_RETENTION_SECS, MIN_RETENTION_SECS};
use crate::{JunkmailError, Result};

/// SMTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Mail domain announced in the banner.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Read timeout in seconds for a single command or data line.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Maximum accepted message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    25
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_max_connections() -> usize {
    100
}

fn default_read_timeout() -> u64 {
    60
}

fn default_max_message_size() -> usize {
    25 * 1024 * 1024 // 25MB
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            domain: default_domain(),
            max_connections: default_max_connections(),
            read_timeout_secs: default_read_timeout(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// Durable registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/addresses.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Ephemeral store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Redis server.
    Redis,
    /// In-process map (development only, lost on restart).
    Memory,
}

/// Ephemeral store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Which backend to use.
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    /// Connection URL for the Redis backend.
    #[serde(default = "default_store_url")]
    pub url: String,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Redis
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_store_url(),
        }
    }
}

/// Retention configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Retention in seconds used until a value is persisted in settings.
    #[serde(default = "default_retention_secs")]
    pub default_secs: u64,
}

fn default_retention_secs() -> u64 {
    3600
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            default_secs: default_retention_secs(),
        }
    }
}

/// Inbox address configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressConfig {
    /// Whether inbox views never expire.
    #[serde(default = "default_permanent")]
    pub permanent: bool,
}

fn default_permanent() -> bool {
    true
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            permanent: default_permanent(),
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Whether the background reconciler runs.
    #[serde(default = "default_reconcile_enabled")]
    pub enabled: bool,
    /// Interval between passes in seconds.
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
    /// Registry page size per pass step.
    #[serde(default = "default_reconcile_batch")]
    pub batch_size: i64,
}

fn default_reconcile_enabled() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    300 // 5 minutes
}

fn default_reconcile_batch() -> i64 {
    100
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconcile_enabled(),
            interval_secs: default_reconcile_interval(),
            batch_size: default_reconcile_batch(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/junkmail.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// SMTP listener configuration.
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Durable registry configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Ephemeral store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Retention configuration.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Inbox address configuration.
    #[serde(default)]
    pub addresses: AddressConfig,
    /// Reconciler configuration.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(JunkmailError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| JunkmailError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `JUNKMAIL_SMTP_HOST`, `JUNKMAIL_SMTP_PORT`, `JUNKMAIL_SMTP_DOMAIN`
    /// - `JUNKMAIL_REDIS_URL`
    /// - `JUNKMAIL_DB_PATH`
    ///
    /// Empty values are ignored, as is a port that does not parse.
    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = env_value("JUNKMAIL_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = env_value("JUNKMAIL_SMTP_PORT").and_then(|p| p.parse().ok()) {
            self.smtp.port = port;
        }
        if let Some(domain) = env_value("JUNKMAIL_SMTP_DOMAIN") {
            self.smtp.domain = domain;
        }
        if let Some(url) = env_value("JUNKMAIL_REDIS_URL") {
            self.store.url = url;
        }
        if let Some(path) = env_value("JUNKMAIL_DB_PATH") {
            self.database.path = path;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `smtp.max_connections` is zero
    /// - `smtp.domain` is empty
    /// - `retention.default_secs` is outside the accepted retention range
    /// - `reconcile.batch_size` is not positive
    /// - `reconcile.interval_secs` is zero
    pub fn validate(&self) -> Result<()> {
        if self.smtp.max_connections == 0 {
            return Err(JunkmailError::Validation(
                "smtp.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.smtp.domain.trim().is_empty() {
            return Err(JunkmailError::Validation(
                "smtp.domain must not be empty".to_string(),
            ));
        }
        if !(MIN_RETENTION_SECS..=MAX_RETENTION_SECS).contains(&self.retention.default_secs) {
            return Err(JunkmailError::Validation(format!(
                "retention.default_secs must be between {MIN_RETENTION_SECS} and {MAX_RETENTION_SECS}"
            )));
        }
        if self.reconcile.batch_size <= 0 {
            return Err(JunkmailError::Validation(
                "reconcile.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.reconcile.interval_secs == 0 {
            return Err(JunkmailError::Validation(
                "reconcile.interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
