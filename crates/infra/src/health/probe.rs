//! Periodic health check driving the connectivity monitor
//!
//! Any HTTP response, whatever its status, means the network is reachable.
//! Only a missing response (connect error, DNS failure, timeout) marks the
//! client offline.

use std::sync::Arc;
use std::time::Duration;

use backstop_core::ConnectivityMonitor;
use backstop_domain::{BackstopError, ConnectivityState, ProbeConfig, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Background connectivity probe with explicit lifecycle management.
pub struct ConnectivityProbe {
    client: reqwest::Client,
    url: Url,
    interval: Duration,
    timeout: Duration,
    monitor: Arc<ConnectivityMonitor>,
    join_timeout: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ConnectivityProbe {
    pub fn new(
        client: reqwest::Client,
        url: Url,
        config: &ProbeConfig,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            client,
            url,
            interval: config.interval(),
            timeout: config.timeout(),
            monitor,
            join_timeout: Duration::from_secs(5),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Probe once and update the monitor.
    pub async fn check_once(&self) -> ConnectivityState {
        let state = probe(&self.client, &self.url, self.timeout).await;
        self.monitor.set(state);
        state
    }

    /// Start probing on a fixed interval; the first probe runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Internal`] if the probe is already running.
    #[instrument(skip(self), fields(url = %self.url))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(BackstopError::Internal("connectivity probe already running".into()));
        }

        info!(interval = ?self.interval, "Starting connectivity probe");
        self.cancellation = CancellationToken::new();

        let client = self.client.clone();
        let url = self.url.clone();
        let interval = self.interval;
        let timeout = self.timeout;
        let monitor = Arc::clone(&self.monitor);
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Connectivity probe cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let state = tokio::select! {
                            _ = cancel.cancelled() => break,
                            state = probe(&client, &url, timeout) => state,
                        };
                        monitor.set(state);
                    }
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop probing and wait for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Internal`] if the probe is not running, the
    /// task panicked, or it did not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(BackstopError::Internal("connectivity probe not running".into()));
        };

        info!("Stopping connectivity probe");
        self.cancellation.cancel();

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Connectivity probe task panicked");
                Err(BackstopError::Internal("connectivity probe task panicked".into()))
            }
            Err(_) => {
                warn!("Connectivity probe did not complete within timeout");
                Err(BackstopError::Internal("connectivity probe stop timed out".into()))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn probe(client: &reqwest::Client, url: &Url, timeout: Duration) -> ConnectivityState {
    match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => {
            debug!(status = response.status().as_u16(), "Health probe answered");
            ConnectivityState::Online
        }
        Err(e) => {
            debug!(error = %e, "Health probe got no response");
            ConnectivityState::Offline
        }
    }
}
