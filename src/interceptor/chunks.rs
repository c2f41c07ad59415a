use super::Interceptor;
use crate::defaults;
use crate::request::ApiRequest;
use crate::service::ApiService;

/// Splits request headers longer than 8000 characters into
/// `{name}-Chunk-{i}` headers. Apache rejects header values above 8192 bytes.
#[derive(Debug, Clone)]
pub struct ChunksInterceptor {
    max_length: usize,
}

impl ChunksInterceptor {
    pub fn new() -> Self {
        Self {
            max_length: defaults::chunks::HEADER_MAX_LENGTH,
        }
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
        }
    }
}

impl Default for ChunksInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for ChunksInterceptor {
    fn on_request(&self, request: &mut ApiRequest, _service: &ApiService) {
        let long: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(_, value)| value.chars().count() > self.max_length)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        for (name, value) in long {
            request.headers.remove(&name);
            let chars: Vec<char> = value.chars().collect();
            for (i, chunk) in chars.chunks(self.max_length).enumerate() {
                request
                    .headers
                    .insert(format!("{name}-Chunk-{i}"), chunk.iter().collect::<String>());
            }
        }
    }
}
