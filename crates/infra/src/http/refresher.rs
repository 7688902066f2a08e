//! Session refresh over HTTP

use async_trait::async_trait;
use backstop_core::{HttpTransport, SessionRefresher};
use backstop_domain::{RequestSpec, TransportFailure};
use tracing::{debug, instrument};

use super::client::HttpClient;

/// POSTs the refresh endpoint with the client's cookie jar.
///
/// Shares the reqwest client (and therefore the cookie store) with the
/// transport so a refreshed session cookie is seen by the replayed request.
#[derive(Clone)]
pub struct HttpSessionRefresher {
    client: HttpClient,
    endpoint: String,
}

impl HttpSessionRefresher {
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SessionRefresher for HttpSessionRefresher {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn refresh(&self) -> Result<(), TransportFailure> {
        let request = RequestSpec::post(self.endpoint.as_str(), serde_json::json!({}));
        let response = self.client.send(&request).await?;
        debug!(status = response.status, "session refreshed");
        Ok(())
    }
}
