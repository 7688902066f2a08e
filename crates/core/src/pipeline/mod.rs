//! Request pipeline

pub mod ports;
pub mod service;

pub use ports::{ErrorSink, HttpTransport};
pub use service::{RequestPipeline, RequestPipelineBuilder};
