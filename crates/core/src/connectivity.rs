//! Connectivity tracking
//!
//! The host application (or the infra health probe) reports online/offline
//! transitions here. The pipeline reads the current state when deciding
//! whether to queue a failed request, and the replay worker watches for the
//! offline → online edge.

use backstop_domain::{ClientEvent, ConnectivityState};
use tokio::sync::watch;
use tracing::info;

use crate::events::EventBus;

#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    events: EventBus,
}

impl ConnectivityMonitor {
    /// Monitor starting in the online state.
    pub fn new(events: EventBus) -> Self {
        Self::with_initial(ConnectivityState::Online, events)
    }

    pub fn with_initial(initial: ConnectivityState, events: EventBus) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state, events }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_offline(&self) -> bool {
        !self.state().is_online()
    }

    pub fn set_online(&self) -> bool {
        self.set(ConnectivityState::Online)
    }

    pub fn set_offline(&self) -> bool {
        self.set(ConnectivityState::Offline)
    }

    /// Records `next`; returns true and emits an event only on a change.
    pub fn set(&self, next: ConnectivityState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        if changed {
            info!(state = %next, "Connectivity changed");
            self.events.emit(ClientEvent::ConnectivityChanged { state: next });
        }
        changed
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}
