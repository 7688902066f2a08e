//! Port interfaces for the request pipeline

use async_trait::async_trait;
use backstop_domain::{AppError, RequestSpec, ResponseData, TransportFailure};

/// Trait for issuing a single HTTP attempt
///
/// Implementations resolve relative paths, apply the per-attempt timeout and
/// report every non-2xx status as [`TransportFailure::Status`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` once.
    ///
    /// # Errors
    ///
    /// Returns [`TransportFailure::NoResponse`] when nothing came back,
    /// [`TransportFailure::Status`] for non-2xx responses and
    /// [`TransportFailure::InvalidRequest`] when the request could not be
    /// built.
    async fn send(&self, request: &RequestSpec) -> Result<ResponseData, TransportFailure>;
}

/// Trait for recording errors surfaced to the user
///
/// Called exactly once per terminal request failure. Must not block the
/// caller: remote delivery, if any, happens in the background.
pub trait ErrorSink: Send + Sync {
    fn log_error(&self, error: &AppError);
}
