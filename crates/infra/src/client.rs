//! Resilient HTTP client facade
//!
//! Wires the reqwest adapters into the core request pipeline from a single
//! [`ClientConfig`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use backstop_domain::ClientConfig;
//! use backstop_infra::ResilientClient;
//!
//! let mut client = ResilientClient::builder(ClientConfig::new("https://api.example.com")).build()?;
//! client.start()?;
//! client.identity().set_member_id("member-42")?;
//!
//! let widgets: serde_json::Value = client.get("/widgets").await?;
//! # let _ = widgets;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use backstop_core::{
    ConnectivityMonitor, ErrorClassifier, ErrorSink, EventBus, OfflineQueue, ReplayWorker,
    ReplayWorkerConfig, RequestPipeline, SessionIdentity,
};
use backstop_domain::constants::EVENT_CHANNEL_CAPACITY;
use backstop_domain::{
    AppError, BackstopError, ClientConfig, ClientEvent, ConnectivityState, ErrorKind, RequestSpec,
    ResponseData, Result,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::InfraError;
use crate::health::ConnectivityProbe;
use crate::http::{HttpClient, HttpSessionRefresher};
use crate::observability::ErrorLogger;

/// HTTP client with classification, retries, session refresh and offline
/// replay.
pub struct ResilientClient {
    config: ClientConfig,
    http: HttpClient,
    pipeline: Arc<RequestPipeline>,
    worker: ReplayWorker,
    probe: Option<ConnectivityProbe>,
}

impl ResilientClient {
    pub fn builder(config: ClientConfig) -> ResilientClientBuilder {
        ResilientClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        self.pipeline.connectivity()
    }

    pub fn identity(&self) -> &Arc<SessionIdentity> {
        self.pipeline.identity()
    }

    /// Receive client events (failures, session expiry, queue activity).
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.pipeline.events().subscribe()
    }

    /// Start the replay worker and, when configured, the connectivity probe.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Internal`] if already started.
    pub fn start(&mut self) -> Result<()> {
        self.worker.start()?;
        if let Some(probe) = self.probe.as_mut() {
            probe.start()?;
        }
        info!(base_url = %self.config.base_url, "Resilient client started");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Cancel in-flight calls and stop background tasks.
    ///
    /// Queued requests stay queued; they are not replayed after shutdown.
    pub async fn shutdown(&mut self) {
        self.pipeline.shutdown();
        if let Some(probe) = self.probe.as_mut() {
            if probe.is_running() {
                if let Err(e) = probe.stop().await {
                    warn!(error = %e, "Failed to stop connectivity probe");
                }
            }
        }
        if self.worker.is_running() {
            if let Err(e) = self.worker.stop().await {
                warn!(error = %e, "Failed to stop replay worker");
            }
        }
    }

    /// Execute a raw request.
    ///
    /// # Errors
    ///
    /// Returns the classified [`AppError`] when the request fails.
    pub async fn execute(&self, request: RequestSpec) -> std::result::Result<ResponseData, AppError> {
        self.pipeline.execute(request).await
    }

    /// Execute a raw request that stops when `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub async fn execute_with_cancel(
        &self,
        request: RequestSpec,
        cancel: &CancellationToken,
    ) -> std::result::Result<ResponseData, AppError> {
        self.pipeline.execute_with_cancel(request, cancel).await
    }

    /// # Errors
    ///
    /// Returns the request failure, or an `Unknown` error when the response
    /// body does not decode into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, AppError> {
        self.send_json(RequestSpec::get(path)).await
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` when `body` does not serialize, otherwise as
    /// [`Self::get`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        self.send_json(RequestSpec::post(path, body)).await
    }

    /// # Errors
    ///
    /// See [`Self::post`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        self.send_json(RequestSpec::put(path, body)).await
    }

    /// # Errors
    ///
    /// See [`Self::post`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode_body(body)?;
        self.send_json(RequestSpec::patch(path, body)).await
    }

    /// # Errors
    ///
    /// See [`Self::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, AppError> {
        self.send_json(RequestSpec::delete(path)).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestSpec,
    ) -> std::result::Result<T, AppError> {
        let path = request.path.clone();
        let response = self.pipeline.execute(request).await?;

        serde_json::from_value(response.body_or_null()).map_err(|err| {
            let error = AppError::new(
                ErrorKind::Unknown,
                format!("failed to decode response from {path}: {err}"),
            )
            .with_status(response.status)
            .with_source(err);
            self.pipeline.report_failure(error)
        })
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> std::result::Result<Value, AppError> {
    serde_json::to_value(body).map_err(|err| {
        AppError::new(ErrorKind::InvalidInput, format!("failed to encode request body: {err}"))
            .with_source(err)
    })
}

/// Builder for [`ResilientClient`].
///
/// Everything is derived from the [`ClientConfig`]; the setters replace
/// individual collaborators, mainly for embedding and tests.
pub struct ResilientClientBuilder {
    config: ClientConfig,
    reqwest_client: Option<reqwest::Client>,
    sink: Option<Arc<dyn ErrorSink>>,
    identity: Option<Arc<SessionIdentity>>,
    initial_connectivity: ConnectivityState,
    worker_config: ReplayWorkerConfig,
}

impl ResilientClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            reqwest_client: None,
            sink: None,
            identity: None,
            initial_connectivity: ConnectivityState::Online,
            worker_config: ReplayWorkerConfig::default(),
        }
    }

    /// Share an existing reqwest client (connection pool and cookie jar).
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Replace the [`ErrorLogger`] built from `config.logging`.
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn identity(mut self, identity: Arc<SessionIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn initial_connectivity(mut self, state: ConnectivityState) -> Self {
        self.initial_connectivity = state;
        self
    }

    pub fn worker_config(mut self, config: ReplayWorkerConfig) -> Self {
        self.worker_config = config;
        self
    }

    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] when the configuration is invalid
    /// or an HTTP client cannot be constructed.
    pub fn build(self) -> Result<ResilientClient> {
        let config = self.config;
        config.validate()?;

        let mut http = HttpClient::builder()
            .base_url(config.base_url.as_str())
            .timeout(config.timeout())
            .user_agent(config.logging.user_agent.as_str());
        if let Some(client) = self.reqwest_client {
            http = http.client(client);
        }
        let http = http.build()?;

        let refresher = Arc::new(HttpSessionRefresher::new(
            http.clone(),
            config.session.refresh_token_endpoint.as_str(),
        ));
        let sink: Arc<dyn ErrorSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(ErrorLogger::with_client(
                config.logging.clone(),
                http.reqwest_client().clone(),
            )?),
        };

        let events = EventBus::with_capacity(EVENT_CHANNEL_CAPACITY);
        let connectivity =
            Arc::new(ConnectivityMonitor::with_initial(self.initial_connectivity, events.clone()));
        let queue = Arc::new(OfflineQueue::new(config.offline.max_queue_age(), events.clone()));

        let pipeline = RequestPipeline::builder()
            .transport(Arc::new(http.clone()))
            .refresher(refresher)
            .error_sink(sink)
            .classifier(ErrorClassifier::with_base_url(config.base_url.as_str()))
            .retry_config(config.retry.clone())
            .events(events)
            .offline_queue(Arc::clone(&queue))
            .connectivity(Arc::clone(&connectivity))
            .identity(self.identity.unwrap_or_default())
            .identity_header(config.identity_header.as_str())
            .build()?;

        let worker = ReplayWorker::new(queue, connectivity.subscribe(), self.worker_config);

        let probe = match config.probe.health_path.as_deref() {
            Some(health_path) => {
                let url = http
                    .resolve(health_path)
                    .map_err(|err| BackstopError::from(InfraError::from(err)))?;
                Some(ConnectivityProbe::new(
                    http.reqwest_client().clone(),
                    url,
                    &config.probe,
                    Arc::clone(&connectivity),
                ))
            }
            None => None,
        };

        Ok(ResilientClient {
            config,
            http,
            pipeline: Arc::new(pipeline),
            worker,
            probe,
        })
    }
}
