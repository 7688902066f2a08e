//! Domain types and models

pub mod events;
pub mod http;
pub mod session;

pub use events::{ClientEvent, DrainReport};
pub use http::{
    is_valid_header_name, is_valid_header_value, HttpMethod, RequestSpec, ResponseData,
    RetryableRequest, TransportFailure,
};
pub use session::{ConnectivityState, RefreshOutcome, SessionState};
