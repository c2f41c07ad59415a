//! Interceptor pipeline
//!
//! Interceptors observe and modify requests before they are sent and
//! envelopes before they are handed back. Each hook runs synchronously, in
//! registration order, and sees the changes made by earlier interceptors.
//! Every hook has a no-op default, so an interceptor only implements the
//! stages it cares about.

mod chunks;
mod dates;

pub use chunks::ChunksInterceptor;
pub use dates::DateInterceptor;

use crate::envelope::{ApiError, ApiResponse};
use crate::request::ApiRequest;
use crate::service::ApiService;
use std::fmt;
use std::sync::Arc;

/// Request lifecycle hooks.
pub trait Interceptor: Send + Sync {
    /// Called before the request is sent.
    fn on_request(&self, _request: &mut ApiRequest, _service: &ApiService) {}

    /// Called with a successful response.
    fn on_response(&self, _request: &ApiRequest, _response: &mut ApiResponse, _service: &ApiService) {
    }

    /// Called for non-2xx statuses and transport failures.
    fn on_error(&self, _request: &ApiRequest, _error: &mut ApiError, _service: &ApiService) {}

    /// Called when the request was aborted.
    fn on_abort(&self, _request: &ApiRequest, _error: &mut ApiError, _service: &ApiService) {}

    /// Called when the request timed out.
    fn on_timeout(&self, _request: &ApiRequest, _error: &mut ApiError, _service: &ApiService) {}
}

/// Ordered, append-only list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn run_request(&self, request: &mut ApiRequest, service: &ApiService) {
        for interceptor in &self.interceptors {
            interceptor.on_request(request, service);
        }
    }

    pub fn run_response(&self, response: &mut ApiResponse, service: &ApiService) {
        let request = response.request_arc();
        for interceptor in &self.interceptors {
            interceptor.on_response(&request, response, service);
        }
    }

    pub fn run_error(&self, error: &mut ApiError, service: &ApiService) {
        let request = error.response().request_arc();
        for interceptor in &self.interceptors {
            interceptor.on_error(&request, error, service);
        }
    }

    pub fn run_abort(&self, error: &mut ApiError, service: &ApiService) {
        let request = error.response().request_arc();
        for interceptor in &self.interceptors {
            interceptor.on_abort(&request, error, service);
        }
    }

    pub fn run_timeout(&self, error: &mut ApiError, service: &ApiService) {
        let request = error.response().request_arc();
        for interceptor in &self.interceptors {
            interceptor.on_timeout(&request, error, service);
        }
    }
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

type RequestFn = Arc<dyn Fn(&mut ApiRequest, &ApiService) + Send + Sync>;
type ResponseFn = Arc<dyn Fn(&ApiRequest, &mut ApiResponse, &ApiService) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&ApiRequest, &mut ApiError, &ApiService) + Send + Sync>;

/// Interceptor assembled from closures, one per stage.
///
/// ```rust,ignore
/// service.add_interceptor(FnInterceptor::new().request(|req, _| {
///     req.headers.insert("X-Client", "reports");
/// }));
/// ```
#[derive(Clone, Default)]
pub struct FnInterceptor {
    request: Option<RequestFn>,
    response: Option<ResponseFn>,
    error: Option<ErrorFn>,
    abort: Option<ErrorFn>,
    timeout: Option<ErrorFn>,
}

impl FnInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, f: impl Fn(&mut ApiRequest, &ApiService) + Send + Sync + 'static) -> Self {
        self.request = Some(Arc::new(f));
        self
    }

    pub fn response(
        mut self,
        f: impl Fn(&ApiRequest, &mut ApiResponse, &ApiService) + Send + Sync + 'static,
    ) -> Self {
        self.response = Some(Arc::new(f));
        self
    }

    pub fn error(
        mut self,
        f: impl Fn(&ApiRequest, &mut ApiError, &ApiService) + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn abort(
        mut self,
        f: impl Fn(&ApiRequest, &mut ApiError, &ApiService) + Send + Sync + 'static,
    ) -> Self {
        self.abort = Some(Arc::new(f));
        self
    }

    pub fn timeout(
        mut self,
        f: impl Fn(&ApiRequest, &mut ApiError, &ApiService) + Send + Sync + 'static,
    ) -> Self {
        self.timeout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for FnInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .field("error", &self.error.is_some())
            .field("abort", &self.abort.is_some())
            .field("timeout", &self.timeout.is_some())
            .finish()
    }
}

impl Interceptor for FnInterceptor {
    fn on_request(&self, request: &mut ApiRequest, service: &ApiService) {
        if let Some(f) = &self.request {
            f(request, service);
        }
    }

    fn on_response(&self, request: &ApiRequest, response: &mut ApiResponse, service: &ApiService) {
        if let Some(f) = &self.response {
            f(request, response, service);
        }
    }

    fn on_error(&self, request: &ApiRequest, error: &mut ApiError, service: &ApiService) {
        if let Some(f) = &self.error {
            f(request, error, service);
        }
    }

    fn on_abort(&self, request: &ApiRequest, error: &mut ApiError, service: &ApiService) {
        if let Some(f) = &self.abort {
            f(request, error, service);
        }
    }

    fn on_timeout(&self, request: &ApiRequest, error: &mut ApiError, service: &ApiService) {
        if let Some(f) = &self.timeout {
            f(request, error, service);
        }
    }
}

/// A simple logging interceptor backed by `tracing` (no payloads logged).
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn on_request(&self, request: &mut ApiRequest, _service: &ApiService) {
        tracing::debug!(target: "api_service::http", method=%request.method, url=%request.url(), "sending request");
    }

    fn on_response(&self, request: &ApiRequest, response: &mut ApiResponse, _service: &ApiService) {
        tracing::debug!(target: "api_service::http", method=%request.method, url=%response.url(), status=%response.status(), "response received");
    }

    fn on_error(&self, request: &ApiRequest, error: &mut ApiError, _service: &ApiService) {
        tracing::debug!(target: "api_service::http", method=%request.method, url=%request.url(), err=%error, "request error");
    }

    fn on_abort(&self, request: &ApiRequest, _error: &mut ApiError, _service: &ApiService) {
        tracing::debug!(target: "api_service::http", method=%request.method, url=%request.url(), "request aborted");
    }

    fn on_timeout(&self, request: &ApiRequest, error: &mut ApiError, _service: &ApiService) {
        tracing::debug!(target: "api_service::http", method=%request.method, url=%request.url(), err=%error, "request timed out");
    }
}
