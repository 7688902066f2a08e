//! Request and response descriptions
//!
//! These are transport-agnostic: the core pipeline builds and replays
//! [`RequestSpec`] values, and infrastructure adapters turn them into real
//! HTTP calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::impl_domain_enum_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl_domain_enum_conversions!(HttpMethod {
    Get => "GET",
    Post => "POST",
    Put => "PUT",
    Patch => "PATCH",
    Delete => "DELETE",
    Head => "HEAD",
});

/// Description of an outgoing request.
///
/// `path` is either relative to the configured base URL or absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: BTreeMap::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A request together with its retry bookkeeping.
///
/// Owned by exactly one pipeline call; never shared across requests.
#[derive(Debug, Clone)]
pub struct RetryableRequest {
    pub id: Uuid,
    pub request: RequestSpec,
    pub retry_count: u32,
}

impl RetryableRequest {
    pub fn new(request: RequestSpec) -> Self {
        Self { id: Uuid::now_v7(), request, retry_count: 0 }
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body; non-JSON payloads are carried as a JSON string.
    #[serde(default)]
    pub body: Option<Value>,
}

impl ResponseData {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, headers: BTreeMap::new(), body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body or JSON `null` for empty responses (204/205).
    pub fn body_or_null(&self) -> Value {
        self.body.clone().unwrap_or(Value::Null)
    }
}

/// Raw failure reported by a transport, before classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportFailure {
    /// No response was received (connection failure, DNS, timeout).
    #[error("no response received: {message}")]
    NoResponse { message: String, timed_out: bool },

    /// The server answered with a non-2xx status.
    #[error("server responded with status {status}")]
    Status { status: u16, body: Option<Value> },

    /// The request could not be built (bad URL, header name or value) and
    /// was never sent. Repeating it cannot succeed.
    #[error("request could not be sent: {message}")]
    InvalidRequest { message: String },
}

impl TransportFailure {
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse { message: message.into(), timed_out: false }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::NoResponse { message: message.into(), timed_out: true }
    }

    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self::Status { status, body }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }
}

/// True for an RFC 9110 field name (a non-empty token).
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// True for a header value without control characters (tab allowed).
pub fn is_valid_header_value(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}
