//! Structured sink for errors surfaced to the user
//!
//! Every terminal request failure is formatted once as an [`ErrorReport`].
//! Development builds emit it as a `tracing` event; production builds with a
//! remote endpoint additionally POST the JSON report on a background task.

use std::collections::BTreeMap;

use backstop_core::ErrorSink;
use backstop_domain::constants::{CONTENT_TYPE_JSON, CONTEXT_REQUEST_URL};
use backstop_domain::{AppError, BackstopError, Environment, ErrorKind, LoggingConfig};
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::errors::InfraError;

/// Wire format of a reported error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub context: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub app_version: String,
    pub user_agent: String,
    /// URL of the failing request, when known.
    pub url: Option<String>,
}

impl ErrorReport {
    pub fn new(error: &AppError, config: &LoggingConfig) -> Self {
        let url = error.request_url().map(str::to_string).or_else(|| {
            error.context.get(CONTEXT_REQUEST_URL).and_then(Value::as_str).map(str::to_string)
        });

        Self {
            kind: error.kind,
            message: error.message.clone(),
            status_code: error.status_code,
            context: error.context.clone(),
            timestamp: error.timestamp,
            environment: config.environment,
            app_version: config.app_version.clone(),
            user_agent: config.user_agent.clone(),
            url,
        }
    }
}

#[derive(Clone)]
struct RemoteReporter {
    client: reqwest::Client,
    endpoint: Url,
}

impl RemoteReporter {
    async fn send(&self, report: &ErrorReport) -> Result<(), reqwest::Error> {
        self.client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// [`ErrorSink`] writing to tracing and, in production, a remote endpoint.
#[derive(Clone)]
pub struct ErrorLogger {
    config: LoggingConfig,
    remote: Option<RemoteReporter>,
}

impl ErrorLogger {
    /// Create a logger with its own reqwest client for remote delivery.
    ///
    /// # Errors
    /// Returns `BackstopError::Config` for an invalid remote endpoint.
    pub fn new(config: LoggingConfig) -> Result<Self, BackstopError> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a logger that reports through an existing reqwest client.
    ///
    /// # Errors
    /// Returns `BackstopError::Config` for an invalid remote endpoint.
    pub fn with_client(config: LoggingConfig, client: reqwest::Client) -> Result<Self, BackstopError> {
        let remote = match (&config.environment, &config.remote_endpoint) {
            (Environment::Production, Some(endpoint)) => {
                let endpoint =
                    Url::parse(endpoint).map_err(|err| BackstopError::from(InfraError::from(err)))?;
                Some(RemoteReporter { client, endpoint })
            }
            _ => None,
        };
        Ok(Self { config, remote })
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    fn emit(&self, report: &ErrorReport) {
        let context = serde_json::to_string(&report.context).unwrap_or_default();
        error!(
            kind = %report.kind,
            status = ?report.status_code,
            url = report.url.as_deref().unwrap_or(""),
            environment = %report.environment,
            app_version = %report.app_version,
            context = %context,
            "{}",
            report.message
        );
    }

    fn dispatch(&self, remote: RemoteReporter, report: ErrorReport) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(kind = %report.kind, "No async runtime; error report not sent");
            return;
        };

        handle.spawn(async move {
            match remote.send(&report).await {
                Ok(()) => debug!(endpoint = %remote.endpoint, "Error report delivered"),
                Err(e) => warn!(endpoint = %remote.endpoint, error = %e, "Failed to deliver error report"),
            }
        });
    }
}

impl ErrorSink for ErrorLogger {
    fn log_error(&self, error: &AppError) {
        let report = ErrorReport::new(error, &self.config);
        self.emit(&report);

        if let Some(remote) = &self.remote {
            self.dispatch(remote.clone(), report);
        }
    }
}
