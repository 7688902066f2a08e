//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment when present
//! 2. Attempts to load from environment variables
//! 3. If `BACKSTOP_BASE_URL` is unset, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `BACKSTOP_BASE_URL`: Base URL for relative request paths (required)
//! - `BACKSTOP_TIMEOUT_MS`: Per-attempt timeout
//! - `BACKSTOP_IDENTITY_HEADER`: Header carrying the member id
//! - `BACKSTOP_MAX_RETRIES`: Retries after the first attempt
//! - `BACKSTOP_BASE_DELAY_MS`: First backoff delay
//! - `BACKSTOP_RETRYABLE_KINDS`: Comma-separated error kinds (e.g.
//!   `NETWORK_ERROR,TIMEOUT`)
//! - `BACKSTOP_JITTER`: `none` or `decorrelated`
//! - `BACKSTOP_REFRESH_TOKEN_ENDPOINT`: Session refresh endpoint
//! - `BACKSTOP_MAX_QUEUE_AGE_MS`: Offline queue time-to-live
//! - `BACKSTOP_HEALTH_PATH`: Health endpoint for the connectivity probe
//! - `BACKSTOP_PROBE_INTERVAL_MS` / `BACKSTOP_PROBE_TIMEOUT_MS`
//! - `BACKSTOP_ENVIRONMENT`: `development` or `production`
//! - `BACKSTOP_LOG_LEVEL`: Default tracing filter directive
//! - `BACKSTOP_ERROR_REPORT_URL`: Remote error report endpoint
//! - `BACKSTOP_APP_VERSION` / `BACKSTOP_USER_AGENT`: Error report metadata
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./backstop.toml`, `./backstop.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use backstop_domain::{BackstopError, ClientConfig, ErrorKind, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["backstop.toml", "backstop.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `BackstopError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `BACKSTOP_BASE_URL` is required; every other variable is optional and
/// falls back to the built-in default.
///
/// # Errors
/// Returns `BackstopError::Config` if the base URL is missing, a variable
/// has an invalid value, or validation fails.
pub fn load_from_env() -> Result<ClientConfig> {
    config_from_vars(|key| std::env::var(key).ok())
}

/// Build a configuration from an arbitrary variable source.
///
/// # Errors
/// See [`load_from_env`].
pub fn config_from_vars<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let base_url = var("BACKSTOP_BASE_URL").ok_or_else(|| {
        BackstopError::Config("Missing required environment variable: BACKSTOP_BASE_URL".into())
    })?;
    let mut config = ClientConfig::new(base_url);

    if let Some(v) = var("BACKSTOP_TIMEOUT_MS") {
        config.timeout_ms = parse_value("BACKSTOP_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = var("BACKSTOP_IDENTITY_HEADER") {
        config.identity_header = v;
    }

    if let Some(v) = var("BACKSTOP_MAX_RETRIES") {
        config.retry.max_retries = parse_value("BACKSTOP_MAX_RETRIES", &v)?;
    }
    if let Some(v) = var("BACKSTOP_BASE_DELAY_MS") {
        config.retry.base_delay_ms = parse_value("BACKSTOP_BASE_DELAY_MS", &v)?;
    }
    if let Some(v) = var("BACKSTOP_RETRYABLE_KINDS") {
        config.retry.retryable_kinds = parse_kinds(&v)?;
    }
    if let Some(v) = var("BACKSTOP_JITTER") {
        config.retry.jitter = parse_value("BACKSTOP_JITTER", &v)?;
    }

    if let Some(v) = var("BACKSTOP_REFRESH_TOKEN_ENDPOINT") {
        config.session.refresh_token_endpoint = v;
    }
    if let Some(v) = var("BACKSTOP_MAX_QUEUE_AGE_MS") {
        config.offline.max_queue_age_ms = parse_value("BACKSTOP_MAX_QUEUE_AGE_MS", &v)?;
    }

    config.probe.health_path = var("BACKSTOP_HEALTH_PATH");
    if let Some(v) = var("BACKSTOP_PROBE_INTERVAL_MS") {
        config.probe.interval_ms = parse_value("BACKSTOP_PROBE_INTERVAL_MS", &v)?;
    }
    if let Some(v) = var("BACKSTOP_PROBE_TIMEOUT_MS") {
        config.probe.timeout_ms = parse_value("BACKSTOP_PROBE_TIMEOUT_MS", &v)?;
    }

    if let Some(v) = var("BACKSTOP_ENVIRONMENT") {
        config.logging.environment = parse_value("BACKSTOP_ENVIRONMENT", &v)?;
    }
    if let Some(v) = var("BACKSTOP_LOG_LEVEL") {
        config.logging.level = v;
    }
    config.logging.remote_endpoint = var("BACKSTOP_ERROR_REPORT_URL");
    if let Some(v) = var("BACKSTOP_APP_VERSION") {
        config.logging.app_version = v;
    }
    if let Some(v) = var("BACKSTOP_USER_AGENT") {
        config.logging.user_agent = v;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `BackstopError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when probing)
/// - File cannot be read or parsed
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BackstopError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            BackstopError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BackstopError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); a missing
/// extension is treated as JSON.
///
/// # Errors
/// Returns `BackstopError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BackstopError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BackstopError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(BackstopError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| BackstopError::Config(format!("Invalid {key}: {e}")))
}

fn parse_kinds(value: &str) -> Result<BTreeSet<ErrorKind>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .map(|kind| parse_value::<ErrorKind>("BACKSTOP_RETRYABLE_KINDS", kind))
        .collect()
}
