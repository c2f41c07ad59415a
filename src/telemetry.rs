//! Tracing subscriber setup
//!
//! The crate only emits `tracing` events; applications decide where they go.
//! These helpers install a `tracing-subscriber` fmt subscriber filtered to
//! this crate's targets.
//!
//! ```rust,ignore
//! use api_service::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! let config = SubscriberConfig::builder()
//!     .log_level(tracing::Level::DEBUG)
//!     .output_format(OutputFormat::Json)
//!     .build();
//! init_subscriber(config)?;
//! ```

use crate::error::ConfigError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonCompact,
}

impl OutputFormat {
    fn parse(format: &str) -> Result<Self, ConfigError> {
        match format.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-compact" => Ok(OutputFormat::JsonCompact),
            _ => Err(ConfigError::TelemetryInit(format!(
                "Invalid log format: {format}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
        }
    }
}

impl SubscriberConfig {
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Debug level, text output.
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            output_format: OutputFormat::Text,
        }
    }

    fn filter(&self) -> String {
        let level = self.log_level.as_str().to_lowercase();
        format!("api_service={level}")
    }
}

#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the level from `trace`, `debug`, `info`, `warn` or `error`.
    pub fn log_level_str(mut self, level: &str) -> Result<Self, ConfigError> {
        let parsed = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(ConfigError::TelemetryInit(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(parsed);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
        }
    }
}

/// Install a global subscriber.
///
/// An already installed global subscriber is not an error.
pub fn init_subscriber(config: SubscriberConfig) -> Result<(), ConfigError> {
    let filter = config.filter();
    let result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .compact()
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if already_installed(&e.to_string()) => Ok(()),
        Err(e) => Err(ConfigError::TelemetryInit(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

// Either the tracing dispatcher or the `log` bridge may report it first.
fn already_installed(message: &str) -> bool {
    message.contains("has already been set") || message.contains("already initialized")
}

pub fn init_default() -> Result<(), ConfigError> {
    init_subscriber(SubscriberConfig::default())
}

/// Initialize from `API_SERVICE_LOG_LEVEL` and `API_SERVICE_LOG_FORMAT`.
pub fn init_from_env() -> Result<(), ConfigError> {
    init_subscriber(config_from_lookup(|key| std::env::var(key).ok())?)
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SubscriberConfig, ConfigError> {
    let mut builder = SubscriberConfig::builder();
    if let Some(level) = lookup("API_SERVICE_LOG_LEVEL") {
        builder = builder.log_level_str(&level)?;
    }
    if let Some(format) = lookup("API_SERVICE_LOG_FORMAT") {
        builder = builder.output_format(OutputFormat::parse(&format)?);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_level_and_format() {
        let config = config_from_lookup(|key| match key {
            "API_SERVICE_LOG_LEVEL" => Some("DEBUG".into()),
            "API_SERVICE_LOG_FORMAT" => Some("json-compact".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(config.output_format, OutputFormat::JsonCompact);
        assert_eq!(config.filter(), "api_service=debug");
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(config_from_lookup(|_| Some("loud".into())).is_err());
        assert!(SubscriberConfig::builder().log_level_str("verbose").is_err());
    }

    #[test]
    fn init_installs_once() {
        assert!(init_default().is_ok());
        let _ = init_subscriber(SubscriberConfig::debug());
    }

    #[test]
    fn recognizes_already_installed_messages() {
        assert!(already_installed("a global default trace dispatcher has already been set"));
        assert!(!already_installed("invalid filter directive"));
    }
}
