//! Response and error envelopes
//!
//! [`ApiResponse`] is a read view over a completed transport response.
//! [`ApiError`] embeds an `ApiResponse` together with the [`FetchError`] that
//! caused the rejection. Both implement [`Envelope`].
//!
//! [`FetchError`]: crate::FetchError

mod error;
mod response;

pub use error::ApiError;
pub use response::{ApiResponse, BodyKind, RecordId, ResponseBody};

use crate::duration::DurationInput;
use crate::headers::Headers;
use crate::params::Params;
use crate::request::ApiRequest;
use serde::Serialize;
use serde_json::Value;

/// Capabilities shared by both envelopes.
pub trait Envelope {
    fn request(&self) -> &ApiRequest;
    fn status(&self) -> u16;
    fn status_text(&self) -> &str;
    fn headers(&self) -> &Headers;
    fn body(&self) -> &ResponseBody;

    /// True if the status is 2xx.
    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// Serializable snapshot for logging.
    fn debug(&self) -> DebugSnapshot;
}

/// Plain snapshot of a request/response pair.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub endpoint: String,
    pub url: String,
    pub params: Params,
    pub body: Option<Value>,
    pub headers: Headers,
    pub options: OptionsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionsSnapshot {
    pub timeout_ms: Option<u64>,
    pub cache_for: Option<DurationInput>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub data_type: Option<BodyKind>,
    pub data: Option<Value>,
    pub text: Option<String>,
}

impl RequestSnapshot {
    pub(crate) fn of(request: &ApiRequest) -> Self {
        Self {
            method: request.method.as_str().to_string(),
            endpoint: request.endpoint.clone(),
            url: request.url(),
            params: request.params.clone(),
            body: request.body.clone(),
            headers: request.headers.clone(),
            options: OptionsSnapshot {
                timeout_ms: request.options.timeout.map(|t| t.as_millis() as u64),
                cache_for: request.options.cache_for.clone(),
                base_url: request.options.base_url.clone(),
            },
        }
    }
}
