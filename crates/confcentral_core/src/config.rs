//! Runtime configuration for the core and its hosts.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `validate` rejects values that would disable retries or timers.

use crate::db::DEFAULT_TRANSACTION_ATTEMPTS;
use crate::logging::default_log_level;
use crate::queue::RetryPolicy;
use crate::views::DEFAULT_NEAR_SOLD_OUT_SEATS;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Queue retry settings in serializable form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueRetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for QueueRetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_delay.as_millis() as u64,
            max_backoff_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl QueueRetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rolling log files; file logging is off when unset.
    pub log_dir: Option<PathBuf>,
    pub transaction_attempts: u32,
    pub queue_retry: QueueRetryConfig,
    pub announcement_refresh_secs: u64,
    pub near_sold_out_seats: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("confcentral.sqlite3"),
            log_level: default_log_level().to_string(),
            log_dir: None,
            transaction_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
            queue_retry: QueueRetryConfig::default(),
            announcement_refresh_secs: 60,
            near_sold_out_seats: DEFAULT_NEAR_SOLD_OUT_SEATS,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transaction_attempts must be at least 1".to_string(),
            ));
        }
        if self.queue_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "queue_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.queue_retry.multiplier.is_finite() || self.queue_retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "queue_retry.multiplier must be a finite number >= 1".to_string(),
            ));
        }
        if self.announcement_refresh_secs == 0 {
            return Err(ConfigError::Invalid(
                "announcement_refresh_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn announcement_refresh_period(&self) -> Duration {
        Duration::from_secs(self.announcement_refresh_secs)
    }
}
