//! Error types
//!
//! - [`DurationError`]: a duration expression could not be parsed
//! - [`ConfigError`]: invalid configuration or subscriber setup
//! - [`TransportError`]: failures reported by a [`Transport`](crate::Transport)
//! - [`FetchError`]: the error that triggered an [`ApiError`](crate::ApiError) envelope

use std::time::Duration;
use thiserror::Error;

/// Errors produced by [`parse_duration`](crate::parse_duration).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("Error parsing duration \"{0}\"")]
    Malformed(String),

    #[error("Unknown duration unit in \"{0}\"")]
    UnknownUnit(String),

    #[error("Duration must be greater than zero \"{0}\"")]
    NonPositive(String),

    #[error("Duration is too large \"{0}\"")]
    TooLarge(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration for {field}: {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Telemetry initialization error: {0}")]
    TelemetryInit(String),
}

/// Errors reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be built (e.g. a relative URL without a base).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, DNS, TLS or body transfer failures.
    #[error("{0}")]
    Network(String),

    /// The transport's own timeout fired.
    #[error("Transport timed out")]
    TimedOut,
}

/// The error that caused a request to be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("The request was aborted")]
    Aborted,

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Request failed with status code {status}")]
    HttpStatus { status: u16, status_text: String },

    #[error("{0}")]
    Transport(String),

    /// The request was rejected before it was sent.
    #[error("{0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Name of the error kind, used as the prefix of non-HTTP error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FetchError::Aborted => "AbortedError",
            FetchError::Timeout(_) => "TimeoutError",
            FetchError::HttpStatus { .. } => "HttpStatusError",
            FetchError::Transport(_) => "TransportError",
            FetchError::InvalidRequest(_) => "InvalidRequestError",
        }
    }

    pub fn is_http_status(&self) -> bool {
        matches!(self, FetchError::HttpStatus { .. })
    }
}

impl From<TransportError> for FetchError {
    fn from(error: TransportError) -> Self {
        FetchError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_taxonomy() {
        assert_eq!(FetchError::Aborted.kind_name(), "AbortedError");
        assert_eq!(
            FetchError::Timeout(Duration::from_millis(5)).kind_name(),
            "TimeoutError"
        );
        assert_eq!(
            FetchError::Transport("dns".into()).kind_name(),
            "TransportError"
        );
    }

    #[test]
    fn timeout_message_reports_milliseconds() {
        let err = FetchError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Request timed out after 1500ms");
    }

    #[test]
    fn transport_error_converts_with_message() {
        let err: FetchError = TransportError::Network("connection refused".into()).into();
        assert_eq!(err, FetchError::Transport("connection refused".into()));
    }
}
