//! Client constants
//!
//! Centralized location for defaults and well-known keys shared by the
//! pipeline, the classifier and the infrastructure adapters.

// Transport defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_IDENTITY_HEADER: &str = "X-Member-Id";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const DEFAULT_USER_AGENT: &str = concat!("backstop/", env!("CARGO_PKG_VERSION"));

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

// Session refresh
pub const DEFAULT_REFRESH_TOKEN_ENDPOINT: &str = "/auth/refresh";

// Offline queue
pub const DEFAULT_MAX_QUEUE_AGE_MS: u64 = 60 * 60 * 1_000;

// Connectivity probe
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

// Event bus
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

// Classification
pub const NETWORK_ERROR_MESSAGE: &str = "network connection failed";
pub const BODY_FIELD_ERRORS_KEY: &str = "fieldErrors";
pub const BODY_MESSAGE_KEY: &str = "message";

// AppError context keys
pub const CONTEXT_TIMED_OUT: &str = "timed_out";
pub const CONTEXT_CANCELLED: &str = "cancelled";
pub const CONTEXT_REQUEST_URL: &str = "request_url";
pub const CONTEXT_REQUEST_METHOD: &str = "request_method";
pub const CONTEXT_REQUEST_ID: &str = "request_id";
pub const CONTEXT_RETRY_COUNT: &str = "retry_count";
pub const CONTEXT_RESPONSE_BODY: &str = "response_body";
pub const CONTEXT_QUEUED_OFFLINE: &str = "queued_offline";
pub const CONTEXT_SESSION_REPLAY: &str = "session_replay";
