//! reqwest-backed transport.

use super::{Transport, TransportRequest, TransportResponse};
use crate::config::ServiceConfig;
use crate::defaults;
use crate::error::{ConfigError, TransportError};
use crate::headers::Headers;
use async_trait::async_trait;
use reqwest::Method;

/// [`Transport`] implementation over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client from the connection settings in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| defaults::http::USER_AGENT.to_string());
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

fn absolute_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("http:{url}")
    } else if url.starts_with("://") {
        format!("http{url}")
    } else {
        url.to_string()
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::TimedOut
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = absolute_url(&request.url);
        let headers = request
            .headers
            .to_header_map()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(request.method.clone(), &url).headers(headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let carries_body = request.method != Method::GET && request.method != Method::HEAD;
        if let (Some(body), true) = (&request.body, carries_body) {
            builder = builder.json(body);
        }

        tracing::trace!(target: "api_service::http", method=%request.method, url=%url, "transport fetch");
        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = Headers::from(response.headers());
        let body = response.bytes().await.ok().map(|b| b.to_vec());

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url: final_url,
            headers,
            body,
        })
    }
}
