//! API service
//!
//! [`ApiService`] ties the pieces together. For each call it:
//!
//! 1. merges default and per-call options and builds an [`ApiRequest`]
//! 2. returns the cached [`ResponseHandle`] when one exists for the URL
//! 3. runs request interceptors
//! 4. sends the request on a spawned task, tracking it for abort lookups
//! 5. builds the envelope and runs the matching interceptor stage
//!
//! Cacheable requests are registered as soon as they are sent, so
//! concurrent duplicates share one in-flight call.

mod diff;
mod handle;
mod job;

pub use diff::PatchDifference;
pub use handle::{ResponseHandle, ResponseResult};
pub use job::{JobOutcome, JobSubmission, JobWaiter, WaitOptions};

use crate::cache::ApiCache;
use crate::cancel::CancelHandle;
use crate::config::ServiceConfig;
use crate::envelope::{ApiError, ApiResponse};
use crate::error::{ConfigError, FetchError};
use crate::interceptor::{ChunksInterceptor, DateInterceptor, Interceptor, InterceptorPipeline};
use crate::matcher::{Matcher, equals_or_matches};
use crate::params::Params;
use crate::request::{ApiRequest, Endpoint, RequestOptions, SendError};
use crate::transport::{ReqwestTransport, Transport};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use uuid::Uuid;

/// Params or payload for [`ApiService::request`].
///
/// GET and HEAD send the data as query params, every other verb as a JSON
/// body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestData {
    #[default]
    Empty,
    Params(Params),
    Json(Value),
}

impl From<Params> for RequestData {
    fn from(params: Params) -> Self {
        RequestData::Params(params)
    }
}

impl From<Value> for RequestData {
    fn from(value: Value) -> Self {
        RequestData::Json(value)
    }
}

impl From<()> for RequestData {
    fn from(_: ()) -> Self {
        RequestData::Empty
    }
}

impl<T: Into<RequestData>> From<Option<T>> for RequestData {
    fn from(data: Option<T>) -> Self {
        data.map(Into::into).unwrap_or_default()
    }
}

#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    method: Method,
    endpoint: String,
    url: String,
    cancel: CancelHandle,
}

struct Inner {
    transport: Arc<dyn Transport>,
    defaults: RwLock<RequestOptions>,
    pipeline: RwLock<InterceptorPipeline>,
    cache: ApiCache,
    pending: Mutex<Vec<PendingRequest>>,
}

/// HTTP API client.
///
/// Cheap to clone; clones share configuration, interceptors, cache and the
/// set of outstanding requests. Request methods must be called from within a
/// Tokio runtime.
#[derive(Clone)]
pub struct ApiService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("defaults", &self.default_options())
            .field("interceptors", &self.pipeline().len())
            .field("cached", &self.inner.cache.len())
            .field("pending", &self.pending().len())
            .finish()
    }
}

impl ApiService {
    /// Service over `transport` starting from the defaults in `config`.
    pub fn new(transport: Arc<dyn Transport>, config: &ServiceConfig) -> Result<Self, ConfigError> {
        let defaults = config.default_options()?;
        Ok(Self::with_defaults(transport, defaults))
    }

    /// Service over `transport` with the given default options.
    pub fn with_defaults(transport: Arc<dyn Transport>, defaults: RequestOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                defaults: RwLock::new(defaults),
                pipeline: RwLock::new(InterceptorPipeline::new()),
                cache: ApiCache::new(),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Service over a [`ReqwestTransport`] built from `config`.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Self::new(Arc::new(transport), &config)
    }

    /// [`from_config`](Self::from_config) plus the header chunking and date
    /// conversion interceptors.
    pub fn standard(config: ServiceConfig) -> Result<Self, ConfigError> {
        let service = Self::from_config(config)?;
        service
            .add_interceptor(ChunksInterceptor::new())
            .add_interceptor(DateInterceptor::new());
        Ok(service)
    }

    /// Append an interceptor; it runs after those already registered.
    pub fn add_interceptor(&self, interceptor: impl Interceptor + 'static) -> &Self {
        self.add_shared_interceptor(Arc::new(interceptor))
    }

    pub fn add_shared_interceptor(&self, interceptor: Arc<dyn Interceptor>) -> &Self {
        self.inner
            .pipeline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
        self
    }

    fn pipeline(&self) -> InterceptorPipeline {
        self.inner
            .pipeline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the options used for every request.
    pub fn set_default_options(&self, options: RequestOptions) -> &Self {
        *self.inner.defaults.write().unwrap_or_else(PoisonError::into_inner) = options;
        self
    }

    /// Layer `options` on top of the current defaults.
    pub fn add_default_options(&self, options: RequestOptions) -> &Self {
        let mut defaults = self.inner.defaults.write().unwrap_or_else(PoisonError::into_inner);
        *defaults = defaults.merge(&options);
        self
    }

    pub fn default_options(&self) -> RequestOptions {
        self.inner
            .defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) -> &Self {
        self.inner
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url = Some(base_url.into());
        self
    }

    pub fn cache(&self) -> &ApiCache {
        &self.inner.cache
    }

    fn pending(&self) -> MutexGuard<'_, Vec<PendingRequest>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests currently in flight.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Make a request.
    ///
    /// Never fails synchronously: problems found before sending, such as an
    /// invalid `cache_for`, come back as an already rejected handle.
    pub fn request(
        &self,
        method: Method,
        endpoint: impl Into<Endpoint>,
        data: impl Into<RequestData>,
        options: RequestOptions,
    ) -> ResponseHandle {
        let options = self.default_options().merge(&options);
        let takes_params = method == Method::GET || method == Method::HEAD;
        let (params, body) = match data.into() {
            RequestData::Empty => (Params::new(), None),
            RequestData::Params(params) if takes_params => (params, None),
            RequestData::Json(value) if takes_params => (Params::from_json(&value), None),
            RequestData::Params(params) => match serde_json::to_value(&params) {
                Ok(body) => (Params::new(), Some(body)),
                Err(e) => return self.reject(method, endpoint, options, e.to_string()),
            },
            RequestData::Json(value) => (Params::new(), Some(value)),
        };
        let mut request = ApiRequest::new(method, endpoint, params, body, options);

        let cache_for = match request.options.cache_duration() {
            Ok(cache_for) => cache_for,
            Err(e) => {
                let err = ApiError::new(
                    FetchError::InvalidRequest(e.to_string()),
                    ApiResponse::without_response(Arc::new(request.clone())),
                );
                return ResponseHandle::ready(&request, Err(err));
            }
        };

        let cache_key = request.url();
        if let Some(cached) = self.inner.cache.find(&request.method, &cache_key) {
            tracing::trace!(target: "api_service::http", method=%request.method, url=%cache_key, "cache hit");
            return cached;
        }

        let pipeline = self.pipeline();
        pipeline.run_request(&mut request, self);

        let send = request.send(self.inner.transport.clone());
        let request = Arc::new(request);
        tracing::debug!(target: "api_service::http", method=%request.method, url=%request.url(), "request sent");
        self.pending().push(PendingRequest {
            id: request.id(),
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            url: request.url(),
            cancel: request.cancel_handle().clone(),
        });

        let service = self.clone();
        let task_request = request.clone();
        let handle = ResponseHandle::spawn(request.clone(), async move {
            let outcome = send.await;
            service.untrack(task_request.id());
            service.settle(task_request, outcome, &pipeline)
        });

        if let Some(ttl) = cache_for {
            self.inner.cache.add(&request, cache_key, handle.clone(), ttl);
        }
        handle
    }

    /// Error envelope for a call rejected before anything was sent.
    pub(crate) fn invalid_request(
        method: Method,
        endpoint: impl Into<Endpoint>,
        options: RequestOptions,
        reason: String,
    ) -> ApiError {
        let request = ApiRequest::new(method, endpoint, Params::new(), None, options);
        ApiError::new(
            FetchError::InvalidRequest(reason),
            ApiResponse::without_response(Arc::new(request)),
        )
    }

    fn reject(
        &self,
        method: Method,
        endpoint: impl Into<Endpoint>,
        options: RequestOptions,
        reason: String,
    ) -> ResponseHandle {
        let err = Self::invalid_request(method, endpoint, options, reason);
        let request = err.response().request_arc();
        ResponseHandle::ready(&request, Err(err))
    }

    fn untrack(&self, id: Uuid) {
        self.pending().retain(|item| item.id != id);
    }

    fn settle(
        &self,
        request: Arc<ApiRequest>,
        outcome: Result<crate::transport::TransportResponse, SendError>,
        pipeline: &InterceptorPipeline,
    ) -> ResponseResult {
        match outcome {
            Ok(raw) => {
                let mut response = ApiResponse::new(request, raw);
                tracing::debug!(target: "api_service::http", url=%response.url(), status=response.status(), "request settled");
                pipeline.run_response(&mut response, self);
                Ok(response)
            }
            Err(SendError::Status(raw)) => {
                let error = FetchError::HttpStatus {
                    status: raw.status,
                    status_text: raw.status_text.clone(),
                };
                let mut err = ApiError::new(error, ApiResponse::new(request, raw));
                tracing::debug!(target: "api_service::http", status=err.status(), "request failed");
                pipeline.run_error(&mut err, self);
                Err(err)
            }
            Err(SendError::Aborted) => {
                let mut err = ApiError::new(FetchError::Aborted, ApiResponse::without_response(request));
                tracing::debug!(target: "api_service::http", "request aborted");
                pipeline.run_abort(&mut err, self);
                Err(err)
            }
            Err(SendError::TimedOut(limit)) => {
                let mut err =
                    ApiError::new(FetchError::Timeout(limit), ApiResponse::without_response(request));
                tracing::debug!(target: "api_service::http", timeout_ms = (limit.as_millis() as u64), "request timed out");
                pipeline.run_timeout(&mut err, self);
                Err(err)
            }
            Err(SendError::Transport(error)) => {
                let mut err = ApiError::new(error.into(), ApiResponse::without_response(request));
                tracing::debug!(target: "api_service::http", err=%err, "transport error");
                pipeline.run_error(&mut err, self);
                Err(err)
            }
        }
    }

    /// GET with query params.
    pub fn get(
        &self,
        endpoint: impl Into<Endpoint>,
        params: impl Into<RequestData>,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.request(Method::GET, endpoint, params, options)
    }

    /// HEAD with query params.
    pub fn head(
        &self,
        endpoint: impl Into<Endpoint>,
        params: impl Into<RequestData>,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.request(Method::HEAD, endpoint, params, options)
    }

    pub fn post(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.send_payload(Method::POST, endpoint, payload, options)
    }

    pub fn put(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.send_payload(Method::PUT, endpoint, payload, options)
    }

    pub fn patch(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.send_payload(Method::PATCH, endpoint, payload, options)
    }

    pub fn delete(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> ResponseHandle {
        self.send_payload(Method::DELETE, endpoint, payload, options)
    }

    fn send_payload(
        &self,
        method: Method,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> ResponseHandle {
        match serde_json::to_value(payload) {
            Ok(Value::Null) => self.request(method, endpoint, RequestData::Empty, options),
            Ok(body) => self.request(method, endpoint, RequestData::Json(body), options),
            Err(e) => {
                let options = self.default_options().merge(&options);
                self.reject(method, endpoint, options, e.to_string())
            }
        }
    }

    /// Abort the request behind `handle` if it is still outstanding.
    /// Returns 1 if it was, 0 otherwise.
    pub fn abort_handle(&self, handle: &ResponseHandle) -> usize {
        let cancel = self
            .pending()
            .iter()
            .find(|item| item.id == handle.id())
            .map(|item| item.cancel.clone());
        match cancel {
            Some(cancel) => usize::from(cancel.abort()),
            None => 0,
        }
    }

    /// Abort outstanding requests matching both filters. The endpoint filter
    /// is tested against the endpoint and the final URL. Returns how many
    /// were signalled.
    pub fn abort_matching(&self, method: Option<Matcher>, endpoint: Option<Matcher>) -> usize {
        let method = method.map(Matcher::upper_cased);
        let matching: Vec<CancelHandle> = self
            .pending()
            .iter()
            .filter(|item| {
                equals_or_matches(item.method.as_str(), method.as_ref())
                    && (equals_or_matches(&item.endpoint, endpoint.as_ref())
                        || equals_or_matches(&item.url, endpoint.as_ref()))
            })
            .map(|item| item.cancel.clone())
            .collect();
        let aborted = matching.iter().filter(|cancel| cancel.abort()).count();
        tracing::debug!(target: "api_service::http", aborted, "aborted outstanding requests");
        aborted
    }

    /// Abort every outstanding request.
    pub fn abort_all(&self) -> usize {
        self.abort_matching(None, None)
    }
}

#[cfg(test)]
impl ApiService {
    /// Service whose transport always fails, for unit tests that only need
    /// a `&ApiService`.
    pub(crate) fn offline() -> Self {
        use crate::error::TransportError;
        use crate::transport::{TransportRequest, TransportResponse};

        struct Offline;

        #[async_trait::async_trait]
        impl Transport for Offline {
            async fn fetch(
                &self,
                _request: TransportRequest,
            ) -> Result<TransportResponse, TransportError> {
                Err(TransportError::Network("offline".into()))
            }
        }

        Self::with_defaults(Arc::new(Offline), RequestOptions::new())
    }
}
