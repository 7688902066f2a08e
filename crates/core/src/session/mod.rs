//! Session refresh and identity

pub mod coordinator;
pub mod identity;
pub mod ports;

pub use coordinator::SessionRefreshCoordinator;
pub use identity::SessionIdentity;
pub use ports::SessionRefresher;
