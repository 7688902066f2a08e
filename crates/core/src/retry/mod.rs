//! Retry policy

pub mod policy;

pub use policy::{duration_millis, RetryPolicy};
