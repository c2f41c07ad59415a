//! HTTP transport abstraction
//!
//! The service never talks to the network directly. It hands a
//! [`TransportRequest`] snapshot to an injectable [`Transport`] and gets back
//! a [`TransportResponse`]. [`ReqwestTransport`] is the production
//! implementation; tests plug in scripted transports.

mod http_client;

pub use http_client::ReqwestTransport;

use crate::error::TransportError;
use crate::headers::Headers;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;

/// Transport-level request data, captured when the request is sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
}

/// Transport-level response data.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub headers: Headers,
    /// `None` when the body could not be read.
    pub body: Option<Vec<u8>>,
}

impl TransportResponse {
    /// Convenience constructor for JSON bodies.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: Headers::new().with("content-type", "application/json"),
            body: Some(body.to_string().into_bytes()),
            ..Default::default()
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: Headers::new().with("content-type", "text/plain"),
            body: Some(body.into().into_bytes()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub(crate) fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// Injectable fetch primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_response_helper() {
        let resp = TransportResponse::json(201, &serde_json::json!({"id": 1}));
        assert!(resp.ok());
        assert_eq!(resp.status_text, "Created");
        assert_eq!(resp.headers.get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn unknown_status_has_empty_text() {
        assert_eq!(status_text(599), "");
        assert!(!TransportResponse::text(404, "nope").ok());
    }
}
