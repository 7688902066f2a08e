//! Transport failure classification
//!
//! Maps a raw [`TransportFailure`] to a typed [`AppError`]. Rules are applied
//! in order and the first match wins:
//!
//! 1. no response (connection failure or timeout) → `NetworkError`
//! 2. 400 with a `fieldErrors` object in the body → validation error
//! 3. 400 otherwise → `BadRequest`
//! 4. 401 → `Unauthorized`
//! 5. 403 → `Forbidden`
//! 6. 404 → `NotFound`
//! 7. anything else → `InternalServer`

use std::collections::BTreeMap;

use backstop_domain::constants::{
    BODY_FIELD_ERRORS_KEY, BODY_MESSAGE_KEY, CONTEXT_REQUEST_METHOD, CONTEXT_REQUEST_URL,
    CONTEXT_RESPONSE_BODY, CONTEXT_TIMED_OUT,
};
use backstop_domain::{AppError, ErrorKind, RequestSpec, TransportFailure};
use serde_json::Value;

/// Stateless classifier for transport failures.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    base_url: Option<String>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative request paths against `base_url` when recording the
    /// request URL on an error.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: Some(base_url.into()) }
    }

    /// Classify a failure of `request`.
    ///
    /// Every call stamps a fresh timestamp, so repeated failures of the same
    /// request produce distinct errors.
    pub fn classify(&self, failure: &TransportFailure, request: &RequestSpec) -> AppError {
        let request_url = self.resolve_url(&request.path);
        let request_method = request.method.as_str();

        match failure {
            TransportFailure::NoResponse { timed_out, .. } => {
                AppError::network(request_url.clone(), request_method)
                    .with_context(CONTEXT_TIMED_OUT, *timed_out)
                    .with_context(CONTEXT_REQUEST_URL, request_url)
                    .with_context(CONTEXT_REQUEST_METHOD, request_method)
                    .with_source(failure.clone())
            }
            TransportFailure::Status { status, body } => {
                let status = *status;
                let body = body.as_ref();
                let kind = kind_for_status(status);
                let message = body_message(body)
                    .unwrap_or_else(|| kind.default_message().to_string());

                let error = match (status, body.and_then(field_errors)) {
                    (400, Some(fields)) => AppError::validation(message, fields),
                    _ => AppError::new(kind, message),
                };

                let mut error = error
                    .with_status(status)
                    .with_context(CONTEXT_REQUEST_URL, request_url)
                    .with_context(CONTEXT_REQUEST_METHOD, request_method)
                    .with_source(failure.clone());
                if let Some(body) = body {
                    error = error.with_context(CONTEXT_RESPONSE_BODY, body.clone());
                }
                error
            }
            TransportFailure::InvalidRequest { message } => {
                AppError::new(ErrorKind::BadRequest, message.clone())
                    .with_context(CONTEXT_REQUEST_URL, request_url)
                    .with_context(CONTEXT_REQUEST_METHOD, request_method)
                    .with_source(failure.clone())
            }
        }
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match &self.base_url {
            Some(base) => {
                format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
            }
            None => path.to_string(),
        }
    }
}

/// Kind for a non-2xx status. 400 maps to `BadRequest` here; the validation
/// case depends on the body and is decided by the caller.
fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::InternalServer,
    }
}

fn body_message(body: Option<&Value>) -> Option<String> {
    body?
        .get(BODY_MESSAGE_KEY)
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}

/// Extracts `fieldErrors` as field → messages. A bare string is treated as a
/// single message; other non-list values are ignored.
fn field_errors(body: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let raw = body.get(BODY_FIELD_ERRORS_KEY)?.as_object()?;

    let fields = raw
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => {
                    items.iter().filter_map(Value::as_str).map(str::to_string).collect()
                }
                _ => Vec::new(),
            };
            (field.clone(), messages)
        })
        .collect();

    Some(fields)
}

#[cfg(test)]
mod tests {
    use backstop_domain::constants::NETWORK_ERROR_MESSAGE;
    use backstop_domain::HttpMethod;
    use serde_json::json;

    use super::*;

    fn classify(failure: TransportFailure) -> AppError {
        ErrorClassifier::with_base_url("https://api.test/")
            .classify(&failure, &RequestSpec::new(HttpMethod::Post, "/widgets"))
    }

    #[test]
    fn no_response_is_network_error_with_request_details() {
        let error = classify(TransportFailure::no_response("connection refused"));

        assert_eq!(error.kind, ErrorKind::NetworkError);
        assert_eq!(error.message, NETWORK_ERROR_MESSAGE);
        assert_eq!(error.request_url(), Some("https://api.test/widgets"));
        assert_eq!(error.request_method(), Some("POST"));
        assert_eq!(error.status_code, None);
        assert!(!error.timed_out());
    }

    #[test]
    fn timeout_is_network_error_flagged_as_timed_out() {
        let error = classify(TransportFailure::timeout("deadline elapsed"));

        assert_eq!(error.kind, ErrorKind::NetworkError);
        assert!(error.timed_out());
    }

    #[test]
    fn unsendable_request_is_bad_request_not_network() {
        let error = classify(TransportFailure::invalid_request("invalid header value"));

        assert_eq!(error.kind, ErrorKind::BadRequest);
        assert_eq!(error.message, "invalid header value");
        assert_eq!(error.status_code, None);
        assert_eq!(error.context[CONTEXT_REQUEST_URL], json!("https://api.test/widgets"));
        assert!(error.request_url().is_none());
    }

    #[test]
    fn bad_request_with_field_errors_is_validation() {
        let error = classify(TransportFailure::status(
            400,
            Some(json!({
                "message": "validation failed",
                "fieldErrors": {"email": ["required", "must be an email"], "name": "too short"}
            })),
        ));

        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.message, "validation failed");
        assert_eq!(error.status_code, Some(400));
        let fields = error.field_errors().unwrap();
        assert_eq!(fields["email"], vec!["required", "must be an email"]);
        assert_eq!(fields["name"], vec!["too short"]);
    }

    #[test]
    fn bad_request_without_field_errors() {
        let error = classify(TransportFailure::status(400, Some(json!({"error": "nope"}))));

        assert_eq!(error.kind, ErrorKind::BadRequest);
        assert_eq!(error.message, ErrorKind::BadRequest.default_message());
        assert!(error.field_errors().is_none());
    }

    #[test]
    fn field_errors_on_other_statuses_are_ignored() {
        let error = classify(TransportFailure::status(
            403,
            Some(json!({"fieldErrors": {"role": ["admin only"]}})),
        ));

        assert_eq!(error.kind, ErrorKind::Forbidden);
        assert!(error.field_errors().is_none());
    }

    #[test]
    fn maps_auth_and_lookup_statuses() {
        assert_eq!(classify(TransportFailure::status(401, None)).kind, ErrorKind::Unauthorized);
        assert_eq!(classify(TransportFailure::status(403, None)).kind, ErrorKind::Forbidden);
        assert_eq!(classify(TransportFailure::status(404, None)).kind, ErrorKind::NotFound);
    }

    #[test]
    fn other_statuses_are_internal_server() {
        for status in [409, 418, 429, 500, 502, 503] {
            let error = classify(TransportFailure::status(status, None));
            assert_eq!(error.kind, ErrorKind::InternalServer, "status {status}");
            assert_eq!(error.status_code, Some(status));
        }
    }

    #[test]
    fn server_message_wins_over_default() {
        let error =
            classify(TransportFailure::status(404, Some(json!({"message": "widget 9 is gone"}))));
        assert_eq!(error.message, "widget 9 is gone");
        assert_eq!(error.context[CONTEXT_RESPONSE_BODY], json!({"message": "widget 9 is gone"}));
    }

    #[test]
    fn each_classification_gets_a_fresh_timestamp() {
        let first = classify(TransportFailure::status(500, None));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = classify(TransportFailure::status(500, None));
        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let error = ErrorClassifier::with_base_url("https://api.test").classify(
            &TransportFailure::no_response("dns"),
            &RequestSpec::get("https://other.test/ping"),
        );
        assert_eq!(error.request_url(), Some("https://other.test/ping"));
    }
}
