//! Events published to the application layer

use serde::{Deserialize, Serialize};

use super::session::ConnectivityState;
use crate::errors::AppError;

/// Summary of one offline queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub replayed: usize,
    pub failed: usize,
    pub expired: usize,
    /// Items still queued when the drain finished.
    pub remaining: usize,
}

impl DrainReport {
    pub fn is_noop(&self) -> bool {
        self.replayed == 0 && self.failed == 0 && self.expired == 0
    }
}

/// Notifications emitted by the client.
///
/// Subscribers receive these over a broadcast channel; a slow subscriber
/// may observe `Lagged` and miss events, requests are never blocked on them.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A request ended in a terminal error the user should hear about.
    RequestFailed { error: AppError },
    /// The session could not be refreshed; the user must sign in again.
    SessionExpired { error: AppError },
    /// Queued offline work was discarded for exceeding the queue age.
    WorkExpired { count: usize },
    QueueDrained { report: DrainReport },
    ConnectivityChanged { state: ConnectivityState },
}

impl ClientEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RequestFailed { .. } => "request_failed",
            Self::SessionExpired { .. } => "session_expired",
            Self::WorkExpired { .. } => "work_expired",
            Self::QueueDrained { .. } => "queue_drained",
            Self::ConnectivityChanged { .. } => "connectivity_changed",
        }
    }
}
