//! api-service
//!
//! An HTTP API client layer: request construction with version-prefix
//! inference, normalized response envelopes, an ordered interceptor pipeline,
//! a time-bounded response cache with request coalescing, and job-polling
//! helpers, all on top of an injectable [`Transport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use api_service::{ApiService, Params, RequestOptions, ServiceConfig};
//!
//! let service = ApiService::standard(ServiceConfig::builder()
//!     .base_url("https://example.com")
//!     .build())?;
//!
//! let response = service
//!     .get("/posts", Params::new().with("limit", 25), RequestOptions::new().cache_for("30s"))
//!     .await?;
//! println!("{} of {:?} pages", response.page().unwrap_or(1), response.num_pages());
//! ```
#![deny(unsafe_code)]

pub mod cache;
pub mod cancel;
pub mod config;
pub mod dates;
pub mod defaults;
pub mod duration;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod interceptor;
pub mod matcher;
pub mod params;
pub mod request;
pub mod service;
pub mod telemetry;
pub mod transport;

pub use cache::ApiCache;
pub use cancel::CancelHandle;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use duration::{DurationInput, parse_duration};
pub use envelope::{
    ApiError, ApiResponse, BodyKind, DebugSnapshot, Envelope, RecordId, ResponseBody,
};
pub use error::{ConfigError, DurationError, FetchError, TransportError};
pub use headers::{HeaderInput, Headers};
pub use interceptor::{
    ChunksInterceptor, DateInterceptor, FnInterceptor, Interceptor, InterceptorPipeline,
    LoggingInterceptor,
};
pub use matcher::Matcher;
pub use params::{ParamValue, Params};
pub use request::{ApiRequest, Endpoint, RequestOptions};
pub use service::{
    ApiService, JobOutcome, JobSubmission, JobWaiter, PatchDifference, RequestData,
    ResponseHandle, WaitOptions,
};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
