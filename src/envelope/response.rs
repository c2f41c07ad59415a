use super::{DebugSnapshot, Envelope, RequestSnapshot, ResponseSnapshot};
use crate::headers::Headers;
use crate::request::ApiRequest;
use crate::transport::TransportResponse;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Kind of body that was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Json,
    Text,
}

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    /// The body could not be read at all.
    Unreadable,
}

impl ResponseBody {
    /// JSON when the content type says so and it parses, text otherwise.
    pub fn read(headers: &Headers, bytes: Option<&[u8]>) -> Self {
        let Some(bytes) = bytes else {
            return ResponseBody::Unreadable;
        };
        let is_json = headers
            .get("content-type")
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"));
        if is_json {
            if let Ok(value) = serde_json::from_slice(bytes) {
                return ResponseBody::Json(value);
            }
        }
        ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn kind(&self) -> Option<BodyKind> {
        match self {
            ResponseBody::Json(_) => Some(BodyKind::Json),
            ResponseBody::Text(_) => Some(BodyKind::Text),
            ResponseBody::Unreadable => None,
        }
    }
}

/// Id of a newly created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(u64),
    /// Non-numeric ids such as UUIDs.
    Str(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{id}"),
            RecordId::Str(id) => f.write_str(id),
        }
    }
}

/// A completed API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    request: Arc<ApiRequest>,
    status: u16,
    status_text: String,
    url: String,
    headers: Headers,
    body: ResponseBody,
    raw_text: Option<String>,
}

impl ApiResponse {
    pub fn new(request: Arc<ApiRequest>, response: TransportResponse) -> Self {
        let headers = response.headers.lowercased();
        let body = ResponseBody::read(&headers, response.body.as_deref());
        let raw_text = response
            .body
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        let url = if response.url.is_empty() {
            request.url()
        } else {
            response.url
        };
        Self {
            request,
            status: response.status,
            status_text: response.status_text,
            url,
            headers,
            body,
            raw_text,
        }
    }

    /// Envelope for a call that never produced a response (status 0).
    pub fn without_response(request: Arc<ApiRequest>) -> Self {
        let url = request.url();
        Self {
            request,
            status: 0,
            status_text: String::new(),
            url,
            headers: Headers::new(),
            body: ResponseBody::Unreadable,
            raw_text: None,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub(crate) fn request_arc(&self) -> Arc<ApiRequest> {
        self.request.clone()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers, names lower-cased.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The final URL of this response.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn body_kind(&self) -> Option<BodyKind> {
        self.body.kind()
    }

    /// Parsed JSON data, if the body was JSON.
    pub fn data(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut Value> {
        match &mut self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text body, if the body was not JSON.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Body as received, whatever its kind.
    pub fn raw_text(&self) -> Option<&str> {
        self.raw_text.as_deref()
    }

    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            ResponseBody::Json(value) => T::deserialize(value),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Unreadable => T::deserialize(Value::Null),
        }
    }

    /// `2xx`, `4xx` and so on.
    pub fn status_class(&self) -> String {
        let first = self.status.to_string().chars().next().unwrap_or('0');
        format!("{first}xx")
    }

    /// Total matching records before `limit` was applied.
    pub fn total(&self) -> Option<f64> {
        self.header("api-total-records")
            .and_then(parse_float)
            .filter(|total| *total > 0.0)
    }

    /// Number of records returned.
    pub fn size(&self) -> usize {
        match &self.body {
            ResponseBody::Json(Value::Array(items)) => items.len(),
            ResponseBody::Json(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.int_param("limit")
    }

    pub fn page(&self) -> Option<u64> {
        self.int_param("page")
    }

    /// `ceil(total / limit)`, or `None` if either is missing.
    pub fn num_pages(&self) -> Option<u64> {
        match (self.total(), self.limit()) {
            (Some(total), Some(limit)) if limit > 0 => {
                let pages = (total / limit as f64).ceil();
                (pages.is_finite() && pages > 0.0).then_some(pages as u64)
            }
            _ => None,
        }
    }

    /// True for an empty array, empty object, empty text or unreadable body.
    pub fn is_empty(&self) -> bool {
        match &self.body {
            ResponseBody::Json(Value::Array(items)) => items.is_empty(),
            ResponseBody::Json(Value::Object(map)) => map.is_empty(),
            ResponseBody::Json(Value::Null) => true,
            ResponseBody::Json(_) => false,
            ResponseBody::Text(text) => text.is_empty(),
            ResponseBody::Unreadable => true,
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|len| len.trim().parse().ok())
    }

    /// The API's response id UUID.
    pub fn response_id(&self) -> Option<&str> {
        self.header("api-response-id")
    }

    /// Id of the newly created record.
    pub fn new_id(&self) -> Option<RecordId> {
        let id = self
            .header("api-new-record-id")
            .filter(|id| !id.is_empty())
            .or_else(|| self.header("api-record-id").filter(|id| !id.is_empty()))
            .map(str::to_string)
            .or_else(|| {
                let location = self.location()?;
                let digits: String = location
                    .chars()
                    .rev()
                    .take_while(char::is_ascii_digit)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                let prefix = &location[..location.len() - digits.len()];
                (!digits.is_empty() && prefix.ends_with('/')).then_some(digits)
            })?;
        if is_positive_integer(&id) {
            if let Ok(n) = id.parse() {
                return Some(RecordId::Int(n));
            }
        }
        Some(RecordId::Str(id))
    }

    /// Notices reported by the API.
    pub fn notices(&self) -> Vec<Value> {
        self.json_list_header("api-response-notices")
    }

    /// Errors reported by the API.
    pub fn errors(&self) -> Vec<Value> {
        self.json_list_header("api-response-errors")
    }

    /// Processing time reported by the API.
    pub fn time(&self) -> f64 {
        self.header("api-response-time")
            .and_then(parse_float)
            .filter(|t| t.is_finite())
            .unwrap_or(0.0)
    }

    pub fn debug(&self) -> DebugSnapshot {
        DebugSnapshot {
            error_message: None,
            request: RequestSnapshot::of(&self.request),
            response: ResponseSnapshot {
                status: self.status,
                status_text: self.status_text.clone(),
                headers: self.headers.clone(),
                data_type: self.body.kind(),
                data: self.data().cloned(),
                text: self.raw_text.clone(),
            },
        }
    }

    fn json_list_header(&self, name: &str) -> Vec<Value> {
        match self.header(name).map(serde_json::from_str::<Value>) {
            Some(Ok(Value::Array(items))) => items,
            _ => Vec::new(),
        }
    }

    fn int_param(&self, name: &str) -> Option<u64> {
        if let Some(value) = self.request.params.get(name) {
            return value.as_u64();
        }
        let pattern = format!(r"(?:\?|&){}=(\d+)(&|$)", regex::escape(name));
        let re = Regex::new(&pattern).ok()?;
        let url = self.request.url();
        re.captures(&url)?[1].parse().ok().filter(|n| *n > 0)
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

fn is_positive_integer(value: &str) -> bool {
    let bytes = value.as_bytes();
    !bytes.is_empty() && bytes[0] != b'0' && bytes.iter().all(u8::is_ascii_digit)
}

impl Envelope for ApiResponse {
    fn request(&self) -> &ApiRequest {
        ApiResponse::request(self)
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn body(&self) -> &ResponseBody {
        &self.body
    }

    fn debug(&self) -> DebugSnapshot {
        ApiResponse::debug(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::request::RequestOptions;
    use reqwest::Method;
    use serde_json::json;

    fn request(endpoint: &str, params: Params) -> Arc<ApiRequest> {
        Arc::new(ApiRequest::new(
            Method::GET,
            endpoint,
            params,
            None,
            RequestOptions::new(),
        ))
    }

    fn response_with(headers: &[(&str, &str)], body: Value) -> ApiResponse {
        let mut raw = TransportResponse::json(200, &body);
        for (name, value) in headers {
            raw.headers.insert(*name, *value);
        }
        ApiResponse::new(request("/posts", Params::new().with("limit", "25")), raw)
    }

    #[test]
    fn computes_pages_from_total_and_limit() {
        let resp = response_with(&[("API-Total-Records", "57")], json!([]));
        assert_eq!(resp.total(), Some(57.0));
        assert_eq!(resp.limit(), Some(25));
        assert_eq!(resp.num_pages(), Some(3));
        assert_eq!(resp.status_class(), "2xx");
    }

    #[test]
    fn fractional_total_rounds_pages_up() {
        let mut raw = TransportResponse::json(200, &json!([]));
        raw.headers.insert("api-total-records", "2.5");
        let resp = ApiResponse::new(request("/posts", Params::new().with("limit", 1)), raw);
        assert_eq!(resp.total(), Some(2.5));
        assert_eq!(resp.num_pages(), Some(3));
    }

    #[test]
    fn num_pages_missing_without_total() {
        let resp = ApiResponse::new(request("/posts", Params::new()), TransportResponse::json(200, &json!({})));
        assert_eq!(resp.num_pages(), None);
        assert_eq!(resp.limit(), None);
    }

    #[test]
    fn limit_and_page_from_url() {
        let resp = ApiResponse::new(
            request("/posts?limit=10&page=3", Params::new()),
            TransportResponse::json(200, &json!([])),
        );
        assert_eq!(resp.limit(), Some(10));
        assert_eq!(resp.page(), Some(3));
    }

    #[test]
    fn new_id_sources() {
        let resp = response_with(&[("api-new-record-id", "123")], json!({}));
        assert_eq!(resp.new_id(), Some(RecordId::Int(123)));

        let resp = response_with(&[("api-record-id", "abc-def")], json!({}));
        assert_eq!(resp.new_id(), Some(RecordId::Str("abc-def".into())));

        let resp = response_with(&[("location", "/api/v2/posts/42")], json!({}));
        assert_eq!(resp.new_id(), Some(RecordId::Int(42)));

        let resp = response_with(&[("location", "/api/v2/posts/abc")], json!({}));
        assert_eq!(resp.new_id(), None);
    }

    #[test]
    fn notices_errors_and_time() {
        let resp = response_with(
            &[
                ("api-response-notices", r#"["a","b"]"#),
                ("api-response-errors", "not json"),
                ("api-response-time", "0.25"),
            ],
            json!([]),
        );
        assert_eq!(resp.notices(), vec![json!("a"), json!("b")]);
        assert!(resp.errors().is_empty());
        assert_eq!(resp.time(), 0.25);
        assert_eq!(response_with(&[], json!([])).time(), 0.0);
    }

    #[test]
    fn emptiness_and_size() {
        assert!(response_with(&[], json!([])).is_empty());
        assert!(response_with(&[], json!({})).is_empty());
        let resp = response_with(&[], json!([1, 2, 3]));
        assert!(!resp.is_empty());
        assert_eq!(resp.size(), 3);
        let text = ApiResponse::new(request("/a", Params::new()), TransportResponse::text(200, ""));
        assert!(text.is_empty());
    }

    #[test]
    fn invalid_json_falls_back_to_text() {
        let mut raw = TransportResponse::text(200, "{oops");
        raw.headers.insert("Content-Type", "application/json; charset=utf-8");
        let resp = ApiResponse::new(request("/a", Params::new()), raw);
        assert_eq!(resp.body_kind(), Some(BodyKind::Text));
        assert_eq!(resp.text(), Some("{oops"));
    }

    #[test]
    fn raw_text_is_kept_for_json() {
        let resp = response_with(&[], json!({"a": 1}));
        assert_eq!(resp.raw_text(), Some(r#"{"a":1}"#));
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn missing_body_is_unreadable() {
        let mut raw = TransportResponse::json(204, &json!(null));
        raw.body = None;
        let resp = ApiResponse::new(request("/a", Params::new()), raw);
        assert_eq!(resp.body(), &ResponseBody::Unreadable);
        assert!(resp.json::<Vec<u8>>().is_err());
    }

    #[test]
    fn debug_snapshot_serializes() {
        let resp = response_with(&[("X-Thing", "1")], json!({"id": 5}));
        let snapshot = serde_json::to_value(resp.debug()).unwrap();
        assert_eq!(snapshot["request"]["method"], "GET");
        assert_eq!(snapshot["request"]["params"]["limit"], "25");
        assert_eq!(snapshot["response"]["data"]["id"], 5);
        assert_eq!(snapshot["response"]["headers"]["x-thing"], "1");
        assert!(snapshot.get("error_message").is_none());
    }

    #[test]
    fn header_lookups() {
        let resp = response_with(
            &[("Content-Length", "12"), ("API-Response-Id", "abc")],
            json!({}),
        );
        assert_eq!(resp.content_length(), Some(12));
        assert_eq!(resp.response_id(), Some("abc"));
        assert_eq!(resp.content_type(), Some("application/json"));
    }
}
