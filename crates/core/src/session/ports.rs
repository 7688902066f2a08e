//! Port interfaces for session management

use async_trait::async_trait;
use backstop_domain::TransportFailure;

/// Trait for refreshing the authenticated session
///
/// Implementations perform a single refresh call (for HTTP, a credentialed
/// POST to the refresh endpoint) and report whether it succeeded.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Refresh the session once.
    ///
    /// # Errors
    ///
    /// Returns the transport failure when the call did not complete with a
    /// 2xx status.
    async fn refresh(&self) -> Result<(), TransportFailure>;
}
