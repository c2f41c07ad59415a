//! Service configuration
//!
//! [`ServiceConfig`] carries the defaults applied to every request made by an
//! [`ApiService`](crate::ApiService) plus the connection settings used by
//! [`ReqwestTransport`](crate::ReqwestTransport).

use crate::defaults;
use crate::duration::DurationInput;
use crate::error::ConfigError;
use crate::headers::Headers;
use crate::request::RequestOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for an [`ApiService`](crate::ApiService).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Prefix for relative endpoints, e.g. `https://example.com`.
    pub base_url: Option<String>,
    /// Request timeout; `Some(Duration::ZERO)` disables it.
    #[serde(with = "duration_millis_option")]
    pub timeout: Option<Duration>,
    /// Default cache lifetime for every request.
    pub cache_for: Option<DurationInput>,
    /// Headers sent with every request.
    pub headers: HashMap<String, String>,
    /// User agent
    pub user_agent: Option<String>,
    /// Connection timeout
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: None,
            cache_for: None,
            headers: HashMap::new(),
            user_agent: None,
            connect_timeout: defaults::http::CONNECT_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `API_SERVICE_BASE_URL`
    /// - `API_SERVICE_TIMEOUT`: milliseconds or an expression such as `30s`
    /// - `API_SERVICE_CACHE_FOR`: milliseconds or an expression such as `5m`
    /// - `API_SERVICE_USER_AGENT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(base_url) = lookup("API_SERVICE_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(timeout) = lookup("API_SERVICE_TIMEOUT") {
            let timeout = duration_from_env(&timeout)
                .to_duration()
                .map_err(|source| ConfigError::Duration {
                    field: "timeout",
                    source,
                })?;
            builder = builder.timeout(timeout);
        }
        if let Some(cache_for) = lookup("API_SERVICE_CACHE_FOR") {
            builder = builder.cache_for(duration_from_env(&cache_for));
        }
        if let Some(user_agent) = lookup("API_SERVICE_USER_AGENT") {
            builder = builder.user_agent(user_agent);
        }
        let config = builder.build();
        config.default_options()?;
        Ok(config)
    }

    /// Request options every call starts from.
    pub fn default_options(&self) -> Result<RequestOptions, ConfigError> {
        if let Some(cache_for) = &self.cache_for {
            cache_for
                .to_duration()
                .map_err(|source| ConfigError::Duration {
                    field: "cache_for",
                    source,
                })?;
        }
        let mut headers: Vec<_> = self.headers.iter().collect();
        headers.sort();
        Ok(RequestOptions {
            timeout: self.timeout,
            cache_for: self.cache_for.clone(),
            headers: headers.into_iter().collect::<Headers>(),
            base_url: self.base_url.clone(),
        })
    }
}

fn duration_from_env(value: &str) -> DurationInput {
    match value.trim().parse::<u64>() {
        Ok(ms) => DurationInput::Millis(ms),
        Err(_) => DurationInput::Text(value.trim().to_string()),
    }
}

/// Builder for [`ServiceConfig`]
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn cache_for(mut self, cache_for: impl Into<DurationInput>) -> Self {
        self.config.cache_for = Some(cache_for.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.config.headers.extend(headers);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod duration_millis_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms: Option<u64> = Option::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = ServiceConfig::builder()
            .base_url("https://example.com")
            .timeout(Duration::from_secs(3))
            .cache_for("30s")
            .header("X-App", "demo")
            .build();
        let options = config.default_options().unwrap();
        assert_eq!(options.base_url.as_deref(), Some("https://example.com"));
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.headers.get("x-app"), Some("demo"));
        assert_eq!(options.cache_duration().unwrap(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_cache_for_is_a_config_error() {
        let config = ServiceConfig::builder().cache_for("later").build();
        assert!(matches!(
            config.default_options(),
            Err(ConfigError::Duration { field: "cache_for", .. })
        ));
    }

    #[test]
    fn loads_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("API_SERVICE_BASE_URL", "https://api.example.com"),
            ("API_SERVICE_TIMEOUT", "1500"),
            ("API_SERVICE_CACHE_FOR", "2m"),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.cache_for, Some(DurationInput::Text("2m".into())));
    }

    #[test]
    fn bad_env_timeout_is_reported() {
        let err = ServiceConfig::from_lookup(|k| {
            (k == "API_SERVICE_TIMEOUT").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn serde_uses_milliseconds() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"timeout": 2000, "cache_for": "1h"}"#).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.connect_timeout, defaults::http::CONNECT_TIMEOUT);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["connect_timeout"], 10_000);
    }
}
