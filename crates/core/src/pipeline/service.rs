//! Request pipeline - orchestrates every outgoing request
//!
//! Each call runs a strictly sequential attempt loop. On failure the error
//! is classified and routed, in this order:
//!
//! 1. network error while offline → queued for replay, caller gets the error
//! 2. unauthorized → session refresh, then one verbatim replay
//! 3. retryable → backoff sleep, retry count incremented, reissued
//! 4. anything else → logged once, `RequestFailed` emitted, returned
//!
//! The offline check runs before the retry check, so a request that runs
//! out of retries while the device is offline is queued rather than failed.

use std::sync::Arc;
use std::time::Duration;

use backstop_domain::constants::{
    CONTEXT_QUEUED_OFFLINE, CONTEXT_REQUEST_ID, CONTEXT_RETRY_COUNT, CONTEXT_SESSION_REPLAY,
    DEFAULT_IDENTITY_HEADER, DEFAULT_MAX_QUEUE_AGE_MS,
};
use backstop_domain::{
    is_valid_header_name, AppError, BackstopError, ClientEvent, ErrorKind, RefreshOutcome,
    RequestSpec, ResponseData, Result as BackstopResult, RetryConfig, RetryableRequest,
    TransportFailure,
};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::{ErrorSink, HttpTransport};
use crate::classification::ErrorClassifier;
use crate::connectivity::ConnectivityMonitor;
use crate::events::EventBus;
use crate::offline::{OfflineQueue, ReplayFn};
use crate::retry::{duration_millis, RetryPolicy};
use crate::session::{SessionIdentity, SessionRefreshCoordinator, SessionRefresher};

/// Cancellation sources for one call: the caller's token and the
/// pipeline-wide shutdown token.
struct CallCancellation<'a> {
    caller: &'a CancellationToken,
    shutdown: CancellationToken,
}

impl CallCancellation<'_> {
    fn is_cancelled(&self) -> bool {
        self.caller.is_cancelled() || self.shutdown.is_cancelled()
    }

    async fn cancelled(&self) {
        tokio::select! {
            () = self.caller.cancelled() => {}
            () = self.shutdown.cancelled() => {}
        }
    }
}

/// Resilient request pipeline.
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    classifier: ErrorClassifier,
    retry: RetryPolicy,
    session: Arc<SessionRefreshCoordinator>,
    offline: Arc<OfflineQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    identity: Arc<SessionIdentity>,
    sink: Arc<dyn ErrorSink>,
    events: EventBus,
    identity_header: String,
    shutdown: CancellationToken,
}

impl RequestPipeline {
    /// Start building a pipeline.
    pub fn builder() -> RequestPipelineBuilder {
        RequestPipelineBuilder::default()
    }

    /// Execute `request` through the full resilience flow.
    ///
    /// # Errors
    ///
    /// Returns the classified [`AppError`] when the request ultimately fails,
    /// including when it was queued for offline replay.
    pub async fn execute(&self, request: RequestSpec) -> Result<ResponseData, AppError> {
        self.execute_with_cancel(request, &CancellationToken::new()).await
    }

    /// Like [`Self::execute`], stopping early when `cancel` fires.
    ///
    /// Cancellation interrupts the in-flight attempt or backoff sleep and
    /// yields an `Unknown` error flagged as cancelled; it is neither logged
    /// nor reported as a `RequestFailed` event.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    #[instrument(
        skip(self, request, cancel),
        fields(method = %request.method, path = %request.path)
    )]
    pub async fn execute_with_cancel(
        &self,
        request: RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<ResponseData, AppError> {
        let cancel = CallCancellation { caller: cancel, shutdown: self.shutdown.child_token() };
        let mut request = RetryableRequest::new(self.prepare(request));
        let mut previous_delay: Option<Duration> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled());
            }

            debug!(
                request_id = %request.id,
                attempt = request.retry_count + 1,
                "Sending request"
            );

            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AppError::cancelled()),
                attempt = self.transport.send(&request.request) => attempt,
            };

            let failure = match attempt {
                Ok(response) => {
                    debug!(request_id = %request.id, status = response.status, "Request succeeded");
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            let error = self.classify(&failure, &request);

            if error.kind == ErrorKind::NetworkError && self.connectivity.is_offline() {
                self.enqueue_offline(&request);
                return Err(error.with_context(CONTEXT_QUEUED_OFFLINE, true));
            }

            if error.kind == ErrorKind::Unauthorized {
                return self.refresh_and_replay(&request, error, &cancel).await;
            }

            if self.retry.should_retry(&error, request.retry_count) {
                let delay = self.retry.backoff_delay(request.retry_count, previous_delay);
                warn!(
                    request_id = %request.id,
                    kind = %error.kind,
                    retry = request.retry_count + 1,
                    delay_ms = duration_millis(delay),
                    "Retrying request after backoff"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AppError::cancelled()),
                    () = tokio::time::sleep(delay) => {}
                }

                previous_delay = Some(delay);
                request.retry_count += 1;
                continue;
            }

            return Err(self.report_failure(error));
        }
    }

    /// Cancel every in-flight call and background replay started by this
    /// pipeline.
    pub fn shutdown(&self) {
        info!("Shutting down request pipeline");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Drain the offline queue now.
    pub async fn process_offline_queue(&self) -> backstop_domain::DrainReport {
        self.offline.process_queue(&self.shutdown.child_token()).await
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn identity(&self) -> &Arc<SessionIdentity> {
        &self.identity
    }

    pub fn offline_queue(&self) -> &Arc<OfflineQueue> {
        &self.offline
    }

    pub fn session(&self) -> &Arc<SessionRefreshCoordinator> {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Adds the identity header unless the caller already set one.
    fn prepare(&self, mut request: RequestSpec) -> RequestSpec {
        if request.header(&self.identity_header).is_none() {
            if let Some(member_id) = self.identity.member_id() {
                request.headers.insert(self.identity_header.clone(), member_id);
            }
        }
        request
    }

    fn classify(&self, failure: &TransportFailure, request: &RetryableRequest) -> AppError {
        self.classifier
            .classify(failure, &request.request)
            .with_context(CONTEXT_REQUEST_ID, request.id.to_string())
            .with_context(CONTEXT_RETRY_COUNT, request.retry_count)
    }

    async fn refresh_and_replay(
        &self,
        request: &RetryableRequest,
        error: AppError,
        cancel: &CallCancellation<'_>,
    ) -> Result<ResponseData, AppError> {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AppError::cancelled()),
            outcome = self.session.refresh(&error) => outcome,
        };

        match outcome {
            RefreshOutcome::Expired => Err(self.report_failure(error)),
            RefreshOutcome::Refreshed => {
                debug!(request_id = %request.id, "Replaying request after session refresh");
                let replay = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AppError::cancelled()),
                    replay = self.transport.send(&request.request) => replay,
                };

                replay.map_err(|failure| {
                    let error =
                        self.classify(&failure, request).with_context(CONTEXT_SESSION_REPLAY, true);
                    self.report_failure(error)
                })
            }
        }
    }

    /// Parks a replay closure that reissues the prepared request verbatim.
    fn enqueue_offline(&self, request: &RetryableRequest) {
        let transport = Arc::clone(&self.transport);
        let classifier = self.classifier.clone();
        let spec = request.request.clone();

        let replay: ReplayFn = Arc::new(move |cancel: CancellationToken| {
            let transport = Arc::clone(&transport);
            let classifier = classifier.clone();
            let spec = spec.clone();
            async move {
                let attempt = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(AppError::cancelled()),
                    attempt = transport.send(&spec) => attempt,
                };
                attempt.map(|_| ()).map_err(|failure| classifier.classify(&failure, &spec))
            }
            .boxed()
        });

        info!(request_id = %request.id, "Offline; request queued for replay");
        self.offline.enqueue(request.id, replay);
    }

    /// Terminal path: log once and notify once.
    ///
    /// Callers layering on the pipeline (e.g. response decoding) use this for
    /// their own terminal errors. Cancelled errors pass through silently.
    pub fn report_failure(&self, error: AppError) -> AppError {
        if error.is_cancelled() {
            return error;
        }
        self.sink.log_error(&error);
        self.events.emit(ClientEvent::RequestFailed { error: error.clone() });
        error
    }
}

impl Drop for RequestPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builder for [`RequestPipeline`].
///
/// Transport, refresher and error sink are required; every other component
/// defaults to a fresh instance.
pub struct RequestPipelineBuilder {
    transport: Option<Arc<dyn HttpTransport>>,
    refresher: Option<Arc<dyn SessionRefresher>>,
    sink: Option<Arc<dyn ErrorSink>>,
    classifier: ErrorClassifier,
    retry: RetryConfig,
    events: Option<EventBus>,
    offline: Option<Arc<OfflineQueue>>,
    connectivity: Option<Arc<ConnectivityMonitor>>,
    identity: Option<Arc<SessionIdentity>>,
    identity_header: String,
    max_queue_age: Duration,
}

impl Default for RequestPipelineBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            refresher: None,
            sink: None,
            classifier: ErrorClassifier::default(),
            retry: RetryConfig::default(),
            events: None,
            offline: None,
            connectivity: None,
            identity: None,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            max_queue_age: Duration::from_millis(DEFAULT_MAX_QUEUE_AGE_MS),
        }
    }
}

impl RequestPipelineBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn SessionRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Share an event bus with other components (monitor, queue).
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn offline_queue(mut self, queue: Arc<OfflineQueue>) -> Self {
        self.offline = Some(queue);
        self
    }

    /// Age after which queued requests are dropped; ignored when an
    /// explicit queue is supplied.
    pub fn max_queue_age(mut self, max_age: Duration) -> Self {
        self.max_queue_age = max_age;
        self
    }

    pub fn connectivity(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    pub fn identity(mut self, identity: Arc<SessionIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity_header(mut self, header: impl Into<String>) -> Self {
        self.identity_header = header.into();
        self
    }

    /// # Errors
    ///
    /// Returns [`BackstopError::Config`] when a required component is
    /// missing or the retry configuration is invalid.
    pub fn build(self) -> BackstopResult<RequestPipeline> {
        let transport = self
            .transport
            .ok_or_else(|| BackstopError::Config("request pipeline requires a transport".into()))?;
        let refresher = self.refresher.ok_or_else(|| {
            BackstopError::Config("request pipeline requires a session refresher".into())
        })?;
        let sink = self
            .sink
            .ok_or_else(|| BackstopError::Config("request pipeline requires an error sink".into()))?;
        self.retry.validate()?;
        if !is_valid_header_name(&self.identity_header) {
            return Err(BackstopError::Config(format!(
                "identity header {:?} is not a valid HTTP header name",
                self.identity_header
            )));
        }

        let events = self.events.unwrap_or_default();
        let session = Arc::new(SessionRefreshCoordinator::new(refresher, events.clone()));
        let offline = self
            .offline
            .unwrap_or_else(|| Arc::new(OfflineQueue::new(self.max_queue_age, events.clone())));
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(ConnectivityMonitor::new(events.clone())));

        Ok(RequestPipeline {
            transport,
            classifier: self.classifier,
            retry: RetryPolicy::new(self.retry),
            session,
            offline,
            connectivity,
            identity: self.identity.unwrap_or_default(),
            sink,
            events,
            identity_header: self.identity_header,
            shutdown: CancellationToken::new(),
        })
    }
}
