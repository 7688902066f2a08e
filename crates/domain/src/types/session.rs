//! Session and connectivity state

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Lifecycle of the most recent session refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Refreshing,
    Refreshed,
    Expired,
}

impl_domain_enum_conversions!(SessionState {
    Idle => "idle",
    Refreshing => "refreshing",
    Refreshed => "refreshed",
    Expired => "expired",
});

/// Result of a refresh attempt as seen by a waiting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Expired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    #[default]
    Online,
    Offline,
}

impl_domain_enum_conversions!(ConnectivityState {
    Online => "online",
    Offline => "offline",
});

impl ConnectivityState {
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}
