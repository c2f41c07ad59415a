use super::Interceptor;
use crate::dates;
use crate::envelope::ApiResponse;
use crate::params::ParamValue;
use crate::request::ApiRequest;
use crate::service::ApiService;
use chrono::FixedOffset;
use serde_json::Value;

/// Converts date fields to offset timestamps on the way out and back to
/// local naive timestamps on the way in.
///
/// Only values under date-like keys (`*_at`, `*_date`, `created` ...) that
/// look like timestamps are touched.
#[derive(Debug, Clone, Default)]
pub struct DateInterceptor {
    /// Zone to convert into; `None` means the system local zone.
    offset: Option<FixedOffset>,
}

impl DateInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }

    fn to_utc(&self, value: &str) -> String {
        match &self.offset {
            Some(offset) => dates::to_utc_in(value, offset),
            None => dates::to_utc(value),
        }
    }

    fn from_utc(&self, value: &str) -> String {
        match &self.offset {
            Some(offset) => dates::from_utc_in(value, offset),
            None => dates::from_utc(value),
        }
    }

    /// Rewrite date fields in a request payload.
    pub fn map_to_utc(&self, value: &mut Value) {
        self.map_values(value, &|s| self.to_utc(s));
    }

    /// Rewrite date fields in a response payload.
    pub fn map_from_utc(&self, value: &mut Value) {
        self.map_values(value, &|s| self.from_utc(s));
    }

    fn map_values(&self, value: &mut Value, convert: &dyn Fn(&str) -> String) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.map_values(item, convert);
                }
            }
            Value::Object(map) => {
                for (key, item) in map.iter_mut() {
                    match item {
                        Value::Array(_) | Value::Object(_) => self.map_values(item, convert),
                        Value::String(s) if dates::is_date_field(key) && dates::is_date_format(s) => {
                            *s = convert(s);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

impl Interceptor for DateInterceptor {
    fn on_request(&self, request: &mut ApiRequest, _service: &ApiService) {
        for (key, value) in request.params.iter_mut() {
            if let ParamValue::Str(s) = value {
                if dates::is_date_field(key) && dates::is_date_format(s) {
                    *s = self.to_utc(s);
                }
            }
        }
        if let Some(body) = request.body.as_mut() {
            self.map_to_utc(body);
        }
    }

    fn on_response(&self, _request: &ApiRequest, response: &mut ApiResponse, _service: &ApiService) {
        if let Some(data) = response.data_mut() {
            self.map_from_utc(data);
        }
    }
}
