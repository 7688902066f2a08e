//! Logging and error reporting
//!
//! - [`logging`]: global `tracing` subscriber setup
//! - [`error_logger`]: the [`ErrorSink`](backstop_core::ErrorSink) used by
//!   the client for terminal request failures

pub mod error_logger;
pub mod logging;

pub use error_logger::{ErrorLogger, ErrorReport};
pub use logging::{env_filter, init_tracing};
