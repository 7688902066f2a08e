//! Error types used throughout the client
//!
//! Two families live here:
//! - [`AppError`]: the typed outcome of a failed request, produced by the
//!   classifier and handed to callers, loggers and event subscribers.
//! - [`BackstopError`]: construction and configuration failures that happen
//!   outside of any request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{CONTEXT_CANCELLED, CONTEXT_TIMED_OUT, NETWORK_ERROR_MESSAGE};
use crate::impl_domain_enum_conversions;

/// Closed set of failure categories a request can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServer,
    InvalidInput,
    DuplicateEntry,
    ResourceExpired,
    InsufficientPermissions,
    NetworkError,
    Timeout,
    Unknown,
}

impl_domain_enum_conversions!(ErrorKind {
    BadRequest => "BAD_REQUEST",
    Unauthorized => "UNAUTHORIZED",
    Forbidden => "FORBIDDEN",
    NotFound => "NOT_FOUND",
    InternalServer => "INTERNAL_SERVER",
    InvalidInput => "INVALID_INPUT",
    DuplicateEntry => "DUPLICATE_ENTRY",
    ResourceExpired => "RESOURCE_EXPIRED",
    InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
    NetworkError => "NETWORK_ERROR",
    Timeout => "TIMEOUT",
    Unknown => "UNKNOWN",
});

impl ErrorKind {
    /// User-facing message used when the server did not supply one.
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "the request was malformed",
            Self::Unauthorized => "authentication is required",
            Self::Forbidden => "access to this resource is forbidden",
            Self::NotFound => "the requested resource was not found",
            Self::InternalServer => "the server failed to process the request",
            Self::InvalidInput => "the submitted data is invalid",
            Self::DuplicateEntry => "the resource already exists",
            Self::ResourceExpired => "the resource has expired",
            Self::InsufficientPermissions => "insufficient permissions for this action",
            Self::NetworkError => NETWORK_ERROR_MESSAGE,
            Self::Timeout => "the request timed out",
            Self::Unknown => "an unexpected error occurred",
        }
    }
}

/// Extra fields carried by specialised errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetail {
    #[default]
    None,
    /// Per-field validation messages returned with a 400.
    Validation { field_errors: BTreeMap<String, Vec<String>> },
    /// The request that never received a response.
    Network { request_url: String, request_method: String },
}

/// Shared handle to the lower-level error an [`AppError`] was built from.
pub type SourceError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Typed request failure.
///
/// `timestamp` records when the failure was classified, so every retry of
/// the same request yields a distinct timestamp.
#[derive(Clone, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub status_code: Option<u16>,
    #[source]
    pub original_error: Option<SourceError>,
    pub detail: ErrorDetail,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            status_code: None,
            original_error: None,
            detail: ErrorDetail::None,
        }
    }

    /// Error of `kind` carrying its default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Validation failure with per-field messages.
    pub fn validation(
        message: impl Into<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
            .with_detail(ErrorDetail::Validation { field_errors })
    }

    /// Network failure for a request that never received a response.
    pub fn network(request_url: impl Into<String>, request_method: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, NETWORK_ERROR_MESSAGE).with_detail(
            ErrorDetail::Network {
                request_url: request_url.into(),
                request_method: request_method.into(),
            },
        )
    }

    /// Error returned when the caller's cancellation token fired.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Unknown, "request cancelled").with_context(CONTEXT_CANCELLED, true)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.original_error = Some(Arc::new(source));
        self
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Field errors when this is a validation failure.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match &self.detail {
            ErrorDetail::Validation { field_errors } => Some(field_errors),
            _ => None,
        }
    }

    pub fn request_url(&self) -> Option<&str> {
        match &self.detail {
            ErrorDetail::Network { request_url, .. } => Some(request_url),
            _ => None,
        }
    }

    pub fn request_method(&self) -> Option<&str> {
        match &self.detail {
            ErrorDetail::Network { request_method, .. } => Some(request_method),
            _ => None,
        }
    }

    /// True when the transport gave up waiting for a response.
    pub fn timed_out(&self) -> bool {
        self.context.get(CONTEXT_TIMED_OUT).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_cancelled(&self) -> bool {
        self.context.get(CONTEXT_CANCELLED).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("status_code", &self.status_code)
            .field("timestamp", &self.timestamp)
            .field("context", &self.context)
            .field("detail", &self.detail)
            .field("original_error", &self.original_error.as_ref().map(ToString::to_string))
            .finish()
    }
}

/// Main error type for client construction and configuration
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BackstopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for client construction and configuration
pub type Result<T> = std::result::Result<T, BackstopError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_kind_wire_format() {
        let json = serde_json::to_string(&ErrorKind::InternalServer).unwrap();
        assert_eq!(json, "\"INTERNAL_SERVER\"");
        let parsed: ErrorKind = serde_json::from_str("\"NETWORK_ERROR\"").unwrap();
        assert_eq!(parsed, ErrorKind::NetworkError);
    }

    #[test]
    fn test_error_kind_parses_from_env_style_strings() {
        assert_eq!("timeout".parse::<ErrorKind>().unwrap(), ErrorKind::Timeout);
        assert_eq!("Internal_Server".parse::<ErrorKind>().unwrap(), ErrorKind::InternalServer);
        assert!("TEAPOT".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_validation_error_exposes_field_errors() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), vec!["must not be blank".to_string()]);

        let error = AppError::validation("invalid payload", fields.clone());

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.field_errors(), Some(&fields));
        assert!(error.request_url().is_none());
    }

    #[test]
    fn test_network_error_carries_request() {
        let error = AppError::network("https://api.test/widgets", "GET");

        assert_eq!(error.message, NETWORK_ERROR_MESSAGE);
        assert_eq!(error.request_url(), Some("https://api.test/widgets"));
        assert_eq!(error.request_method(), Some("GET"));
        assert!(error.field_errors().is_none());
    }

    #[test]
    fn test_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let error = AppError::from_kind(ErrorKind::NetworkError).with_source(io);

        let source = error.source().expect("source should be set");
        assert_eq!(source.to_string(), "reset by peer");
    }

    #[test]
    fn test_context_flags() {
        let error = AppError::from_kind(ErrorKind::NetworkError).with_context(CONTEXT_TIMED_OUT, true);
        assert!(error.timed_out());
        assert!(!error.is_cancelled());
        assert!(AppError::cancelled().is_cancelled());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let error = AppError::new(ErrorKind::NotFound, "widget 7 not found").with_status(404);
        assert_eq!(error.to_string(), "NOT_FOUND: widget 7 not found");
        assert_eq!(error.status_code, Some(404));
    }
}
