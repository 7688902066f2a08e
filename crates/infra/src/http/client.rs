use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use backstop_core::HttpTransport;
use backstop_domain::constants::{CONTENT_TYPE_JSON, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT};
use backstop_domain::{BackstopError, HttpMethod, RequestSpec, ResponseData, TransportFailure};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::errors::{transport_failure, InfraError};

/// reqwest-backed transport issuing exactly one attempt per `send`.
///
/// Retries, refresh and offline handling live in the request pipeline; this
/// type only resolves URLs, applies the timeout and maps the outcome.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Underlying reqwest client; shares the connection pool and cookie jar.
    pub fn reqwest_client(&self) -> &ReqwestClient {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `path` against the base URL. Absolute URLs are used as-is.
    ///
    /// Unlike `Url::join`, a base path such as `/v1` is preserved.
    ///
    /// # Errors
    /// Returns the URL parse error when the result is not a valid URL.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn send(&self, request: &RequestSpec) -> Result<ResponseData, TransportFailure> {
        let url = self.resolve(&request.path).map_err(|err| {
            TransportFailure::invalid_request(format!("invalid request URL {}: {err}", request.path))
        })?;
        let method = to_reqwest_method(request.method);
        debug!(%method, %url, "sending HTTP request");

        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(ACCEPT, CONTENT_TYPE_JSON);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            transport_failure(&err)
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let bytes = response.bytes().await.map_err(|err| transport_failure(&err))?;
        let body = parse_body(&bytes);
        debug!(%method, %url, status, "received HTTP response");

        if (200..300).contains(&status) {
            Ok(ResponseData { status, headers, body })
        } else {
            Err(TransportFailure::Status { status, body })
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    cookie_store: bool,
    client: Option<ReqwestClient>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
            cookie_store: true,
            client: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Keep cookies between requests (on by default); required for
    /// credentialed session refresh.
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Reuse an existing reqwest client instead of building one. Agent,
    /// header and cookie settings are ignored in that case.
    pub fn client(mut self, client: ReqwestClient) -> Self {
        self.client = Some(client);
        self
    }

    /// # Errors
    /// Returns `BackstopError::Config` when the base URL is missing or
    /// invalid, or the reqwest client cannot be built.
    pub fn build(self) -> Result<HttpClient, BackstopError> {
        let base_url = self
            .base_url
            .ok_or_else(|| BackstopError::Config("HTTP client requires a base URL".into()))?;
        let base_url = Url::parse(&base_url).map_err(|err| BackstopError::from(InfraError::from(err)))?;

        let client = match self.client {
            Some(client) => client,
            None => {
                let mut builder = ReqwestClient::builder()
                    .cookie_store(self.cookie_store)
                    .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
                if let Some(headers) = self.default_headers {
                    builder = builder.default_headers(headers);
                }
                builder.build().map_err(|err| BackstopError::from(InfraError::from(err)))?
            }
        };

        Ok(HttpClient { client, base_url, timeout: self.timeout })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// Empty bodies (204/205) become `None`; non-JSON text is kept as a string.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> HttpClient {
        HttpClient::builder().base_url(server.uri()).build().expect("http client")
    }

    #[tokio::test]
    async fn returns_json_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).send(&RequestSpec::get("/widgets")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(json!([{"id": 1}])));
    }

    #[tokio::test]
    async fn sends_json_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widgets"))
            .and(header("content-type", "application/json"))
            .and(header("x-member-id", "m-9"))
            .and(body_json(json!({"name": "gear"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let request =
            RequestSpec::post("/widgets", json!({"name": "gear"})).with_header("X-Member-Id", "m-9");
        let response = client_for(&server).send(&request).await.unwrap();

        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn empty_success_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = client_for(&server).send(&RequestSpec::delete("/widgets/1")).await.unwrap();

        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "no such widget"})),
            )
            .mount(&server)
            .await;

        let failure = client_for(&server).send(&RequestSpec::get("/widgets/7")).await.unwrap_err();

        assert_eq!(
            failure,
            TransportFailure::status(404, Some(json!({"message": "no such widget"})))
        );
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let failure = client_for(&server).send(&RequestSpec::get("/")).await.unwrap_err();

        assert_eq!(failure, TransportFailure::status(502, Some(json!("bad gateway"))));
    }

    #[tokio::test]
    async fn connection_refused_is_no_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = HttpClient::builder().base_url(format!("http://{addr}")).build().unwrap();
        let failure = client.send(&RequestSpec::get("/widgets")).await.unwrap_err();

        assert!(matches!(failure, TransportFailure::NoResponse { timed_out: false, .. }));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .base_url(server.uri())
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let failure = client.send(&RequestSpec::get("/slow")).await.unwrap_err();

        assert!(matches!(failure, TransportFailure::NoResponse { timed_out: true, .. }));
    }

    #[tokio::test]
    async fn unsendable_requests_never_reach_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = client_for(&server);

        let bad_value = RequestSpec::get("/widgets").with_header("X-Member-Id", "m-1\nInjected: x");
        let bad_name = RequestSpec::get("/widgets").with_header("X Member", "m-1");
        let bad_url = RequestSpec::get("http://[::1");

        for request in [bad_value, bad_name, bad_url] {
            let failure = client.send(&request).await.unwrap_err();
            assert!(
                matches!(failure, TransportFailure::InvalidRequest { .. }),
                "{request:?} gave {failure:?}"
            );
        }
    }

    #[test]
    fn resolve_keeps_base_path() {
        let client = HttpClient::builder().base_url("https://api.test/v1/").build().unwrap();

        assert_eq!(client.resolve("/widgets").unwrap().as_str(), "https://api.test/v1/widgets");
        assert_eq!(client.resolve("widgets").unwrap().as_str(), "https://api.test/v1/widgets");
        assert_eq!(
            client.resolve("https://other.test/x").unwrap().as_str(),
            "https://other.test/x"
        );
    }

    #[test]
    fn build_requires_valid_base_url() {
        assert!(HttpClient::builder().build().is_err());
        assert!(matches!(
            HttpClient::builder().base_url("::nope").build(),
            Err(BackstopError::Config(_))
        ));
    }
}
