//! Duration expressions
//!
//! Converts human-readable strings such as `"30s"`, `"2.5 min"` or `"14 days"`
//! into a [`Duration`]. Numeric inputs are taken as milliseconds unchanged.

use crate::error::DurationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MS: f64 = 1.0;
const SEC: f64 = 1000.0 * MS;
const MIN: f64 = 60.0 * SEC;
const HOUR: f64 = 60.0 * MIN;
const DAY: f64 = 24.0 * HOUR;
const WEEK: f64 = 7.0 * DAY;
const MONTH: f64 = 30.0 * DAY;
const YEAR: f64 = 365.0 * DAY;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([\d.]+)\s*([a-z]+)$").expect("valid duration regex"));

fn unit_millis(unit: &str) -> Option<f64> {
    let ms = match unit {
        "milliseconds" | "millisecond" | "ms" => MS,
        "seconds" | "second" | "sec" | "s" => SEC,
        "minutes" | "minute" | "min" | "m" => MIN,
        "hours" | "hour" | "hr" | "h" => HOUR,
        "days" | "day" | "d" => DAY,
        "weeks" | "week" | "wk" | "w" => WEEK,
        "months" | "month" | "b" => MONTH,
        "years" | "year" | "yr" | "y" => YEAR,
        _ => return None,
    };
    Some(ms)
}

/// Parse a duration expression into milliseconds.
pub fn parse_millis(input: &str) -> Result<f64, DurationError> {
    let caps = DURATION_RE
        .captures(input)
        .ok_or_else(|| DurationError::Malformed(input.to_string()))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| DurationError::Malformed(input.to_string()))?;
    let unit = unit_millis(&caps[2].to_ascii_lowercase());
    match unit {
        Some(unit) if value > 0.0 => Ok(value * unit),
        Some(_) => Err(DurationError::NonPositive(input.to_string())),
        None => Err(DurationError::UnknownUnit(input.to_string())),
    }
}

/// Parse a duration expression such as `"45s"`, `"5 minutes"` or `"1d"`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let ms = parse_millis(input)?;
    Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| DurationError::TooLarge(input.to_string()))
}

/// A duration given either as milliseconds or as an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Millis(u64),
    Text(String),
}

impl DurationInput {
    /// Resolve to a [`Duration`]; numeric inputs are returned unchanged.
    pub fn to_duration(&self) -> Result<Duration, DurationError> {
        match self {
            DurationInput::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationInput::Text(text) => parse_duration(text),
        }
    }
}

impl From<u64> for DurationInput {
    fn from(ms: u64) -> Self {
        DurationInput::Millis(ms)
    }
}

impl From<Duration> for DurationInput {
    fn from(duration: Duration) -> Self {
        DurationInput::Millis(duration.as_millis() as u64)
    }
}

impl From<&str> for DurationInput {
    fn from(text: &str) -> Self {
        DurationInput::Text(text.to_string())
    }
}

impl From<String> for DurationInput {
    fn from(text: String) -> Self {
        DurationInput::Text(text)
    }
}
