//! # Backstop Core
//!
//! Request resilience logic - no HTTP client code.
//!
//! This crate contains:
//! - Failure classification and retry policy
//! - Single-flight session refresh and member identity
//! - The offline replay queue and its background worker
//! - The request pipeline that ties them together
//! - Port interfaces (traits) implemented by infrastructure adapters
//!
//! ## Architecture Principles
//! - Only depends on `backstop-domain`
//! - No reqwest, sockets or file I/O
//! - All external effects via traits (`HttpTransport`, `SessionRefresher`,
//!   `ErrorSink`, `Clock`)

pub mod classification;
pub mod clock;
pub mod connectivity;
pub mod events;
pub mod offline;
pub mod pipeline;
pub mod retry;
pub mod session;

pub use classification::ErrorClassifier;
pub use clock::{Clock, MockClock, SystemClock};
pub use connectivity::ConnectivityMonitor;
pub use events::EventBus;
pub use offline::{
    OfflineQueue, OfflineQueueItem, ReplayFn, ReplayFuture, ReplayWorker, ReplayWorkerConfig,
};
pub use pipeline::{ErrorSink, HttpTransport, RequestPipeline, RequestPipelineBuilder};
pub use retry::RetryPolicy;
pub use session::{SessionIdentity, SessionRefreshCoordinator, SessionRefresher};
