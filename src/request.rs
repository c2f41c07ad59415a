//! Request descriptor
//!
//! An [`ApiRequest`] describes one logical call: verb, endpoint, params,
//! headers, body and per-request options. Its URL is derived on demand:
//!
//! - absolute endpoints (`https://`, `http://`, `://`, `//`) are used as-is
//! - relative endpoints get an `/api/{version}` prefix, where the version is
//!   taken from a leading `/vN/` or `/api/vN/` segment and defaults to `v2`
//! - fragments are dropped
//! - an embedded `?query` is merged with the explicit params, which win

use crate::cancel::CancelHandle;
use crate::defaults;
use crate::duration::DurationInput;
use crate::error::{DurationError, FetchError, TransportError};
use crate::headers::{HeaderInput, Headers};
use crate::params::{self, Params};
use crate::transport::{Transport, TransportRequest, TransportResponse};
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:/?api)?/(v\d+)/").expect("valid version regex"));

static ABSOLUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://|://|//)").expect("valid absolute url regex"));

/// An endpoint path or a full URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Path(String),
    Url(reqwest::Url),
}

impl Endpoint {
    pub fn into_string(self) -> String {
        match self {
            Endpoint::Path(path) => path,
            Endpoint::Url(url) => url.to_string(),
        }
    }
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Endpoint::Path(path.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(path: String) -> Self {
        Endpoint::Path(path)
    }
}

impl From<&String> for Endpoint {
    fn from(path: &String) -> Self {
        Endpoint::Path(path.clone())
    }
}

impl From<reqwest::Url> for Endpoint {
    fn from(url: reqwest::Url) -> Self {
        Endpoint::Url(url)
    }
}

impl<T: Into<Endpoint>> From<Option<T>> for Endpoint {
    fn from(endpoint: Option<T>) -> Self {
        endpoint
            .map(Into::into)
            .unwrap_or_else(|| Endpoint::Path(String::new()))
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// `None` uses the 5 minute default; `Some(Duration::ZERO)` disables it.
    pub timeout: Option<Duration>,
    /// Cache successful responses for this long.
    pub cache_for: Option<DurationInput>,
    pub headers: Headers,
    pub base_url: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout = Some(Duration::ZERO);
        self
    }

    pub fn cache_for(mut self, cache_for: impl Into<DurationInput>) -> Self {
        self.cache_for = Some(cache_for.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: impl Into<HeaderInput>) -> Self {
        self.headers.merge(&headers.into().resolve());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Layer `overrides` on top of `self`. Set fields win; headers are merged.
    pub fn merge(&self, overrides: &RequestOptions) -> RequestOptions {
        let mut headers = self.headers.clone();
        headers.merge(&overrides.headers);
        RequestOptions {
            timeout: overrides.timeout.or(self.timeout),
            cache_for: overrides.cache_for.clone().or_else(|| self.cache_for.clone()),
            headers,
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
        }
    }

    /// Timeout actually applied when sending, `None` meaning unbounded.
    pub fn effective_timeout(&self) -> Option<Duration> {
        match self.timeout {
            None => Some(defaults::http::REQUEST_TIMEOUT),
            Some(Duration::ZERO) => None,
            Some(timeout) => Some(timeout),
        }
    }

    /// Resolved cache lifetime; a zero lifetime disables caching.
    pub fn cache_duration(&self) -> Result<Option<Duration>, DurationError> {
        match &self.cache_for {
            Some(input) => Ok(Some(input.to_duration()?).filter(|d| !d.is_zero())),
            None => Ok(None),
        }
    }
}

/// Why [`ApiRequest::send`] did not produce a successful response.
#[derive(Debug, Clone)]
pub enum SendError {
    Aborted,
    TimedOut(Duration),
    /// The server answered with a non-2xx status.
    Status(TransportResponse),
    Transport(TransportError),
}

/// A single HTTP call description.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    id: Uuid,
    pub method: Method,
    pub endpoint: String,
    pub params: Params,
    pub headers: Headers,
    pub body: Option<Value>,
    pub options: RequestOptions,
    cancel: CancelHandle,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        endpoint: impl Into<Endpoint>,
        params: Params,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            endpoint: endpoint.into().into_string(),
            params,
            headers: options.headers.clone(),
            body,
            options,
            cancel: CancelHandle::new(),
        }
    }

    /// Unique id of this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Full URL including the query string.
    pub fn url(&self) -> String {
        resolve_url(&self.endpoint, self.options.base_url.as_deref(), &self.params)
    }

    /// Serialized params, without the leading `?`.
    pub fn query_string(&self) -> String {
        params::stringify(&self.params)
    }

    pub fn set_method(&mut self, method: &str) -> Result<(), FetchError> {
        self.method = parse_method(method)?;
        Ok(())
    }

    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Replace params by parsing a query string.
    pub fn set_query_string(&mut self, query: &str) {
        self.params = params::parse(query);
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<Endpoint>) {
        self.endpoint = endpoint.into().into_string();
    }

    pub fn set_headers(&mut self, headers: impl Into<HeaderInput>) {
        self.headers = headers.into().resolve();
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn is_pending(&self) -> bool {
        self.cancel.is_pending()
    }

    pub fn is_completed(&self) -> bool {
        self.cancel.is_completed()
    }

    /// Cancel if in flight; otherwise a no-op. Returns whether a signal was sent.
    pub fn abort(&self) -> bool {
        self.cancel.abort()
    }

    fn transport_request(&self) -> TransportRequest {
        let carries_body = self.method != Method::GET && self.method != Method::HEAD;
        TransportRequest {
            method: self.method.clone(),
            url: self.url(),
            headers: self.headers.clone(),
            body: if carries_body { self.body.clone() } else { None },
            timeout: self.options.effective_timeout(),
        }
    }

    /// Send through `transport`.
    ///
    /// The request is marked pending before this returns and the transport
    /// request is captured immediately, so later changes to `self` do not
    /// affect the call.
    pub fn send(&self, transport: Arc<dyn Transport>) -> BoxFuture<'static, Result<TransportResponse, SendError>> {
        let snapshot = self.transport_request();
        let timeout = snapshot.timeout;
        let cancel = self.cancel.clone();
        cancel.mark_pending();

        async move {
            let fetch = transport.fetch(snapshot);
            let timed = async {
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, fetch).await {
                        Ok(result) => result.map_err(|e| classify_transport(e, limit)),
                        Err(_) => {
                            cancel.cancel();
                            Err(SendError::TimedOut(limit))
                        }
                    },
                    None => fetch
                        .await
                        .map_err(|e| classify_transport(e, Duration::ZERO)),
                }
            };
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SendError::Aborted),
                result = timed => result,
            };
            cancel.mark_complete();
            match outcome {
                Ok(response) if !response.ok() => Err(SendError::Status(response)),
                other => other,
            }
        }
        .boxed()
    }
}

fn classify_transport(error: TransportError, limit: Duration) -> SendError {
    match error {
        TransportError::TimedOut => SendError::TimedOut(limit),
        other => SendError::Transport(other),
    }
}

/// Parse an HTTP verb, upper-casing it first.
pub fn parse_method(method: &str) -> Result<Method, FetchError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| FetchError::InvalidRequest(format!("Invalid HTTP method \"{method}\"")))
}

/// Compute the final URL for an endpoint.
pub fn resolve_url(endpoint: &str, base_url: Option<&str>, params: &Params) -> String {
    let endpoint = endpoint.split('#').next().unwrap_or_default();
    let (path, embedded_query) = match endpoint.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (endpoint, None),
    };

    let mut url = if ABSOLUTE_RE.is_match(path) {
        path.to_string()
    } else {
        let (version, rest) = match VERSION_RE.captures(path) {
            Some(caps) => {
                let end = caps.get(0).map_or(0, |m| m.end());
                (caps[1].to_string(), &path[end - 1..])
            }
            None => (defaults::url::API_VERSION.to_string(), path),
        };
        let base = base_url.unwrap_or_default().trim_end_matches('/');
        format!("{base}/api/{version}{rest}")
    };

    match embedded_query {
        Some(query) if !query.is_empty() => {
            let mut merged = params::parse(query);
            merged.merge(params.clone());
            url.push('?');
            url.push_str(&params::stringify(&merged));
        }
        _ => {
            let query = params::stringify(params);
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            } else if embedded_query.is_some() {
                url.push('?');
            }
        }
    }
    url
}
