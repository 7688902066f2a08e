//! Single-flight session refresh
//!
//! State machine `Idle → Refreshing → {Refreshed, Expired}`. The first
//! request to hit a 401 starts a refresh; every 401 that arrives while it is
//! in flight awaits the same shared future instead of issuing its own call.
//!
//! The refresh runs as its own task and settles the slot when it finishes,
//! whether or not anyone is still waiting on it, so the next 401 after that
//! starts a new refresh.

use std::sync::Arc;

use backstop_domain::{AppError, ClientEvent, RefreshOutcome, SessionState};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::ports::SessionRefresher;
use crate::events::EventBus;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct CoordinatorState {
    session: SessionState,
    in_flight: Option<SharedRefresh>,
}

pub struct SessionRefreshCoordinator {
    refresher: Arc<dyn SessionRefresher>,
    events: EventBus,
    state: Arc<Mutex<CoordinatorState>>,
}

impl SessionRefreshCoordinator {
    pub fn new(refresher: Arc<dyn SessionRefresher>, events: EventBus) -> Self {
        Self {
            refresher,
            events,
            state: Arc::new(Mutex::new(CoordinatorState {
                session: SessionState::Idle,
                in_flight: None,
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().session
    }

    /// Refresh the session on behalf of a request that failed with
    /// `trigger`, joining an in-flight refresh when there is one.
    ///
    /// On [`RefreshOutcome::Expired`] a `SessionExpired` event is emitted
    /// exactly once per refresh attempt, however many requests waited on it.
    /// Dropping the returned future does not cancel the refresh.
    #[instrument(skip_all, fields(trigger = %trigger.kind))]
    pub async fn refresh(&self, trigger: &AppError) -> RefreshOutcome {
        self.join_or_start(trigger).await
    }

    fn join_or_start(&self, trigger: &AppError) -> SharedRefresh {
        let mut state = self.state.lock();
        if let Some(in_flight) = &state.in_flight {
            debug!("Joining in-flight session refresh");
            return in_flight.clone();
        }

        info!("Starting session refresh");
        let task = tokio::spawn(run_refresh(
            Arc::clone(&self.refresher),
            Arc::clone(&self.state),
            self.events.clone(),
            trigger.clone(),
        ));
        let refresh = async move {
            task.await.unwrap_or_else(|join_error| {
                error!(error = %join_error, "Session refresh task did not complete");
                RefreshOutcome::Expired
            })
        }
        .boxed()
        .shared();

        // The task settles under this lock, so it cannot clear the slot
        // before it is filled.
        state.session = SessionState::Refreshing;
        state.in_flight = Some(refresh.clone());
        refresh
    }
}

/// Runs one refresh attempt, records its outcome and clears the slot.
/// The request error that started it is reported when the session expired.
async fn run_refresh(
    refresher: Arc<dyn SessionRefresher>,
    state: Arc<Mutex<CoordinatorState>>,
    events: EventBus,
    trigger: AppError,
) -> RefreshOutcome {
    let mut guard = SlotGuard { state: Arc::clone(&state), armed: true };

    let outcome = match refresher.refresh().await {
        Ok(()) => RefreshOutcome::Refreshed,
        Err(failure) => {
            warn!(error = %failure, "Session refresh failed");
            RefreshOutcome::Expired
        }
    };

    {
        let mut state = state.lock();
        state.in_flight = None;
        state.session = match outcome {
            RefreshOutcome::Refreshed => {
                info!("Session refreshed");
                SessionState::Refreshed
            }
            RefreshOutcome::Expired => {
                warn!("Session expired");
                SessionState::Expired
            }
        };
        guard.armed = false;
    }

    if outcome == RefreshOutcome::Expired {
        events.emit(ClientEvent::SessionExpired { error: trigger });
    }
    outcome
}

/// Clears the slot when a refresh task panics or is aborted before settling.
struct SlotGuard {
    state: Arc<Mutex<CoordinatorState>>,
    armed: bool,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            state.in_flight = None;
            state.session = SessionState::Expired;
        }
    }
}
