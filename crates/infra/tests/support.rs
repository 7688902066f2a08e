#![allow(dead_code)]

use std::sync::Arc;

use backstop_core::ErrorSink;
use backstop_domain::{AppError, ClientConfig};
use backstop_infra::ResilientClient;
use parking_lot::Mutex;
use wiremock::MockServer;

/// Error sink recording every terminal failure.
#[derive(Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<AppError>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn errors(&self) -> Vec<AppError> {
        self.errors.lock().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn log_error(&self, error: &AppError) {
        self.errors.lock().push(error.clone());
    }
}

/// Config pointing at the mock server with fast retries.
pub fn config_for(server: &MockServer, max_retries: u32, base_delay_ms: u64) -> ClientConfig {
    let mut config = ClientConfig::new(server.uri());
    config.retry.max_retries = max_retries;
    config.retry.base_delay_ms = base_delay_ms;
    config
}

pub fn client_with_sink(config: ClientConfig) -> (ResilientClient, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let client = ResilientClient::builder(config)
        .error_sink(sink.clone())
        .build()
        .expect("client should build");
    (client, sink)
}
