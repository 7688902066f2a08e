//! Conversions from external infrastructure errors into domain errors.
//!
//! Two directions matter:
//! - request-time `reqwest` failures become [`TransportFailure`] so the
//!   pipeline can classify them;
//! - construction-time failures (client builder, URL parsing, I/O) become
//!   [`BackstopError`].

use backstop_domain::{BackstopError, TransportFailure};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BackstopError);

impl From<InfraError> for BackstopError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BackstopError> for InfraError {
    fn from(value: BackstopError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoBackstopError {
    fn into_backstop(self) -> BackstopError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportFailure */
/* -------------------------------------------------------------------------- */

/// Maps a failed attempt to the failure the classifier expects.
///
/// Errors that carry a status are reported as such. Builder errors (bad
/// URL, header name or value) mean the request was never sent. Everything
/// else (connect, DNS, timeout, body read) means no usable response arrived.
pub fn transport_failure(err: &HttpError) -> TransportFailure {
    if let Some(status) = err.status() {
        return TransportFailure::status(status.as_u16(), None);
    }

    let message = error_chain(err);
    if err.is_builder() {
        return TransportFailure::invalid_request(message);
    }
    if err.is_timeout() {
        return TransportFailure::timeout(message);
    }
    TransportFailure::no_response(message)
}

/// Flattens an error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error / url::ParseError / io::Error → BackstopError */
/* -------------------------------------------------------------------------- */

impl IntoBackstopError for HttpError {
    fn into_backstop(self) -> BackstopError {
        if self.is_builder() {
            return BackstopError::Config(format!("invalid HTTP client configuration: {self}"));
        }
        BackstopError::Transport(error_chain(&self))
    }
}

impl IntoBackstopError for url::ParseError {
    fn into_backstop(self) -> BackstopError {
        BackstopError::Config(format!("invalid URL: {self}"))
    }
}

impl IntoBackstopError for std::io::Error {
    fn into_backstop(self) -> BackstopError {
        BackstopError::Internal(format!("I/O error: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_backstop())
    }
}

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        InfraError(value.into_backstop())
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_backstop())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn connection_refused_maps_to_no_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Client::new().get(format!("http://{addr}")).send().await.unwrap_err();

        match transport_failure(&err) {
            TransportFailure::NoResponse { timed_out, message } => {
                assert!(!timed_out);
                assert!(!message.is_empty());
            }
            other => panic!("expected no response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_maps_to_timed_out_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = Client::new()
            .get(server.uri())
            .timeout(Duration::from_millis(50))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(transport_failure(&err), TransportFailure::NoResponse { timed_out: true, .. }));
    }

    #[tokio::test]
    async fn error_for_status_keeps_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();

        assert_eq!(transport_failure(&err), TransportFailure::status(503, None));
    }

    #[tokio::test]
    async fn invalid_header_value_maps_to_invalid_request() {
        let err = Client::new()
            .get("http://127.0.0.1:9/")
            .header("x-member-id", "m-1\nInjected: x")
            .send()
            .await
            .unwrap_err();

        assert!(matches!(transport_failure(&err), TransportFailure::InvalidRequest { .. }));
    }

    #[test]
    fn url_errors_become_config_errors() {
        let err = url::Url::parse("not a url").unwrap_err();
        let backstop: BackstopError = InfraError::from(err).into();
        assert!(matches!(backstop, BackstopError::Config(msg) if msg.contains("invalid URL")));
    }

    #[test]
    fn io_errors_become_internal_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let backstop: BackstopError = InfraError::from(err).into();
        assert!(matches!(backstop, BackstopError::Internal(_)));
    }
}
