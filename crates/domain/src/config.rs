//! Configuration management
//!
//! All durations are stored as milliseconds so the same structures load
//! unchanged from TOML, JSON and environment variables.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_IDENTITY_HEADER, DEFAULT_MAX_QUEUE_AGE_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_PROBE_INTERVAL_MS, DEFAULT_PROBE_TIMEOUT_MS,
    DEFAULT_REFRESH_TOKEN_ENDPOINT, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT,
};
use crate::errors::{BackstopError, ErrorKind, Result};
use crate::impl_domain_enum_conversions;
use crate::types::is_valid_header_name;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL relative request paths are resolved against.
    pub base_url: String,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Header carrying the member id on every request.
    pub identity_header: String,
    pub retry: RetryConfig,
    pub session: SessionConfig,
    pub offline: OfflineQueueConfig,
    pub probe: ProbeConfig,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            retry: RetryConfig::default(),
            session: SessionConfig::default(),
            offline: OfflineQueueConfig::default(),
            probe: ProbeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks every section for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BackstopError::Config("base_url must not be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(BackstopError::Config("timeout_ms must be greater than zero".into()));
        }
        if !is_valid_header_name(&self.identity_header) {
            return Err(BackstopError::Config(format!(
                "identity_header must be a valid HTTP header name, got {:?}",
                self.identity_header
            )));
        }
        self.retry.validate()?;
        self.session.validate()?;
        self.offline.validate()?;
        self.probe.validate()
    }
}

/// Backoff randomisation applied on top of exponential delays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterMode {
    /// Exact `base * 2^n` delays.
    #[default]
    None,
    /// Decorrelated jitter bounded by three times the exponential delay.
    Decorrelated,
}

impl_domain_enum_conversions!(JitterMode {
    None => "none",
    Decorrelated => "decorrelated",
});

/// Retry configuration, immutable once the client is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub retryable_kinds: BTreeSet<ErrorKind>,
    pub jitter: JitterMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            retryable_kinds: default_retryable_kinds(),
            jitter: JitterMode::None,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] when delays would overflow a
    /// `Duration` computation.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > 32 {
            return Err(BackstopError::Config(format!(
                "retry.max_retries must be at most 32, got {}",
                self.max_retries
            )));
        }
        Ok(())
    }
}

/// Kinds retried when no explicit set is configured.
pub fn default_retryable_kinds() -> BTreeSet<ErrorKind> {
    [ErrorKind::NetworkError, ErrorKind::Timeout, ErrorKind::InternalServer].into_iter().collect()
}

/// Session refresh configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Endpoint POSTed to (with credentials) to refresh the session.
    pub refresh_token_endpoint: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { refresh_token_endpoint: DEFAULT_REFRESH_TOKEN_ENDPOINT.to_string() }
    }
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] when the endpoint is blank.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_token_endpoint.trim().is_empty() {
            return Err(BackstopError::Config(
                "session.refresh_token_endpoint must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Offline queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineQueueConfig {
    pub max_queue_age_ms: u64,
}

impl Default for OfflineQueueConfig {
    fn default() -> Self {
        Self { max_queue_age_ms: DEFAULT_MAX_QUEUE_AGE_MS }
    }
}

impl OfflineQueueConfig {
    pub fn max_queue_age(&self) -> Duration {
        Duration::from_millis(self.max_queue_age_ms)
    }

    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] for a zero queue age.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_age_ms == 0 {
            return Err(BackstopError::Config(
                "offline.max_queue_age_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Connectivity probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Health endpoint; the probe is disabled when unset.
    pub health_path: Option<String>,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            health_path: None,
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] when an enabled probe has a zero
    /// interval or timeout.
    pub fn validate(&self) -> Result<()> {
        if self.health_path.is_some() && (self.interval_ms == 0 || self.timeout_ms == 0) {
            return Err(BackstopError::Config(
                "probe.interval_ms and probe.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl_domain_enum_conversions!(Environment {
    Development => "development",
    Production => "production",
});

/// Logging and error reporting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub environment: Environment,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Endpoint receiving error reports in production.
    pub remote_endpoint: Option<String>,
    pub app_version: String,
    pub user_agent: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            level: "info".to_string(),
            remote_endpoint: None,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
