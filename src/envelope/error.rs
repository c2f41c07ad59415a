use super::{ApiResponse, DebugSnapshot, Envelope, ResponseBody};
use crate::error::FetchError;
use crate::headers::Headers;
use crate::request::ApiRequest;
use std::fmt;

/// A rejected request: the triggering error plus whatever response exists.
#[derive(Debug, Clone)]
pub struct ApiError {
    error: FetchError,
    response: ApiResponse,
    was_aborted: bool,
}

impl ApiError {
    pub fn new(error: FetchError, response: ApiResponse) -> Self {
        let was_aborted = matches!(error, FetchError::Aborted);
        Self {
            error,
            response,
            was_aborted,
        }
    }

    pub fn error(&self) -> &FetchError {
        &self.error
    }

    pub fn response(&self) -> &ApiResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ApiResponse {
        &mut self.response
    }

    pub fn into_response(self) -> ApiResponse {
        self.response
    }

    pub fn was_aborted(&self) -> bool {
        self.was_aborted
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, FetchError::Timeout(_))
    }

    pub fn status(&self) -> u16 {
        self.response.status()
    }

    /// `HTTP 404 Not Found` for status errors, `TimeoutError: ...` and so on
    /// for everything else.
    pub fn message(&self) -> String {
        if self.error.is_http_status() {
            let status_text = match self.response.status_text() {
                "" => self.error.to_string(),
                text => text.to_string(),
            };
            format!("HTTP {} {}", self.response.status(), status_text)
        } else {
            format!("{}: {}", self.error.kind_name(), self.error)
        }
    }

    pub fn debug(&self) -> DebugSnapshot {
        DebugSnapshot {
            error_message: Some(self.message()),
            ..self.response.debug()
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl Envelope for ApiError {
    fn request(&self) -> &ApiRequest {
        self.response.request()
    }

    fn status(&self) -> u16 {
        self.response.status()
    }

    fn status_text(&self) -> &str {
        self.response.status_text()
    }

    fn headers(&self) -> &Headers {
        self.response.headers()
    }

    fn body(&self) -> &ResponseBody {
        self.response.body()
    }

    fn debug(&self) -> DebugSnapshot {
        ApiError::debug(self)
    }
}
