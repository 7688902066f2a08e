//! Tracing subscriber initialisation

use backstop_domain::{BackstopError, Environment, LoggingConfig};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `config.level`. Production writes JSON lines,
/// development writes human-readable output.
///
/// # Errors
/// Returns `BackstopError::Config` for an unparsable level and
/// `BackstopError::Internal` when a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), BackstopError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.environment {
        Environment::Production => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        Environment::Development => registry.with(fmt::layer().pretty().with_target(true)).try_init(),
    };

    result.map_err(|err| BackstopError::Internal(format!("tracing already initialised: {err}")))
}

/// Filter from `RUST_LOG`, falling back to the configured level.
///
/// # Errors
/// Returns `BackstopError::Config` when the configured level is not a valid
/// filter directive.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, BackstopError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|err| BackstopError::Config(format!("invalid logging.level {:?}: {err}", config.level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_accepted() {
        let config = LoggingConfig { level: "backstop_core=debug,info".into(), ..LoggingConfig::default() };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn second_init_reports_an_error() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(BackstopError::Internal(_))));
    }
}
