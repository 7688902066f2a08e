//! Background replay worker
//!
//! Watches connectivity and drains the offline queue whenever the client
//! comes back online. Lifecycle is explicit: `start` spawns the task,
//! `stop` cancels it and awaits the join handle with a timeout.

use std::sync::Arc;
use std::time::Duration;

use backstop_domain::{BackstopError, ConnectivityState, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::queue::OfflineQueue;

/// Configuration for the replay worker.
#[derive(Debug, Clone)]
pub struct ReplayWorkerConfig {
    /// How long `stop` waits for the task (and any drain in progress).
    pub join_timeout: Duration,
    /// Drain immediately on start when already online.
    pub drain_on_start: bool,
}

impl Default for ReplayWorkerConfig {
    fn default() -> Self {
        Self { join_timeout: Duration::from_secs(5), drain_on_start: true }
    }
}

/// Replay worker with explicit lifecycle management.
pub struct ReplayWorker {
    queue: Arc<OfflineQueue>,
    connectivity: watch::Receiver<ConnectivityState>,
    config: ReplayWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ReplayWorker {
    pub fn new(
        queue: Arc<OfflineQueue>,
        connectivity: watch::Receiver<ConnectivityState>,
        config: ReplayWorkerConfig,
    ) -> Self {
        Self {
            queue,
            connectivity,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background task.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Internal`] if the worker is already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(BackstopError::Internal("replay worker already running".into()));
        }

        info!("Starting offline replay worker");
        self.cancellation = CancellationToken::new();

        let queue = Arc::clone(&self.queue);
        let connectivity = self.connectivity.clone();
        let cancel = self.cancellation.clone();
        let drain_on_start = self.config.drain_on_start;

        let handle = tokio::spawn(async move {
            Self::run_loop(queue, connectivity, cancel, drain_on_start).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the worker and wait for the background task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::Internal`] if the worker is not running, the
    /// task panicked, or it did not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(BackstopError::Internal("replay worker not running".into()));
        };

        info!("Stopping offline replay worker");
        self.cancellation.cancel();

        let outcome = match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Replay worker task panicked");
                Err(BackstopError::Internal("replay worker task panicked".into()))
            }
            Err(_) => {
                warn!("Replay worker did not complete within timeout");
                Err(BackstopError::Internal("replay worker stop timed out".into()))
            }
        };

        self.cancellation = CancellationToken::new();
        outcome
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn run_loop(
        queue: Arc<OfflineQueue>,
        mut connectivity: watch::Receiver<ConnectivityState>,
        cancel: CancellationToken,
        drain_on_start: bool,
    ) {
        let initial = *connectivity.borrow_and_update();
        if drain_on_start && initial.is_online() && !queue.is_empty() {
            queue.process_queue(&cancel).await;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Replay worker loop cancelled");
                    break;
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        debug!("Connectivity channel closed; replay worker exiting");
                        break;
                    }
                    // Transitions can coalesce in the watch channel, so any
                    // observed online state with queued work triggers a drain.
                    let state = *connectivity.borrow_and_update();
                    if state.is_online() && !queue.is_empty() {
                        debug!(queued = queue.len(), "Back online; draining offline queue");
                        queue.process_queue(&cancel).await;
                    }
                }
            }
        }
    }
}

impl Drop for ReplayWorker {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
