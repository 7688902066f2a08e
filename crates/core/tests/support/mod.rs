//! Shared test helpers for `backstop-core` integration tests.
//!
//! Lightweight port mocks so pipeline tests can script transport outcomes
//! and count refreshes and logged errors.

#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use backstop_core::{ConnectivityMonitor, EventBus, RequestPipeline};
use backstop_domain::RetryConfig;

pub use mocks::{RecordingSink, ScriptedRefresher, ScriptedTransport};

/// Pipeline wired to fresh mocks.
pub struct Harness {
    pub pipeline: RequestPipeline,
    pub transport: Arc<ScriptedTransport>,
    pub refresher: Arc<ScriptedRefresher>,
    pub sink: Arc<RecordingSink>,
    pub events: EventBus,
    pub connectivity: Arc<ConnectivityMonitor>,
}

pub fn harness(retry: RetryConfig, refresh_succeeds: bool) -> Harness {
    let transport = Arc::new(ScriptedTransport::default());
    let refresher = Arc::new(ScriptedRefresher::new(refresh_succeeds));
    let sink = Arc::new(RecordingSink::default());
    let events = EventBus::new();
    let connectivity = Arc::new(ConnectivityMonitor::new(events.clone()));

    let pipeline = RequestPipeline::builder()
        .transport(transport.clone())
        .refresher(refresher.clone())
        .error_sink(sink.clone())
        .retry_config(retry)
        .events(events.clone())
        .connectivity(connectivity.clone())
        .build()
        .expect("pipeline should build");

    Harness { pipeline, transport, refresher, sink, events, connectivity }
}

pub fn retry_config(max_retries: u32, base_delay_ms: u64) -> RetryConfig {
    RetryConfig { max_retries, base_delay_ms, ..RetryConfig::default() }
}
