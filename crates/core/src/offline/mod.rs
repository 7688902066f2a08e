//! Offline replay

pub mod queue;
pub mod worker;

pub use queue::{OfflineQueue, OfflineQueueItem, ReplayFn, ReplayFuture};
pub use worker::{ReplayWorker, ReplayWorkerConfig};
