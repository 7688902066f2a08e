//! Port mocks

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use backstop_core::{ErrorSink, HttpTransport, SessionRefresher};
use backstop_domain::{AppError, RequestSpec, ResponseData, TransportFailure};
use parking_lot::Mutex;

/// Transport replaying a script of outcomes; answers 200 once exhausted.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<ResponseData, TransportFailure>>>,
    requests: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    pub fn push_status(&self, status: u16) {
        self.script.lock().push_back(Err(TransportFailure::status(status, None)));
    }

    pub fn push_statuses(&self, status: u16, times: usize) {
        for _ in 0..times {
            self.push_status(status);
        }
    }

    pub fn push_failure(&self, failure: TransportFailure) {
        self.script.lock().push_back(Err(failure));
    }

    pub fn push_ok(&self, status: u16, body: serde_json::Value) {
        self.script.lock().push_back(Ok(ResponseData::new(status, Some(body))));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<ResponseData, TransportFailure> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(ResponseData::new(200, None)))
    }
}

pub struct ScriptedRefresher {
    succeed: bool,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn new(succeed: bool) -> Self {
        Self { succeed, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefresher for ScriptedRefresher {
    async fn refresh(&self) -> Result<(), TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(())
        } else {
            Err(TransportFailure::status(401, None))
        }
    }
}

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
