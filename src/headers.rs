//! HTTP header helpers
//!
//! [`Headers`] keeps header names as given while comparing them
//! case-insensitively. [`HeaderInput`] covers the shapes callers hand us:
//! a raw `Name: value` block, a plain map, or a native [`HeaderMap`].

use crate::error::ConfigError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Ordered, case-insensitive header collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a header value, ignoring name case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a header. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => *entry = (name, value),
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index).1)
    }

    /// Merge `other` into `self`; values from `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with all names lower-cased.
    pub fn lowercased(&self) -> Headers {
        Headers(
            self.0
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
        )
    }

    /// Parse a raw header block (`Name: value` per line). Lines without a
    /// colon are ignored.
    pub fn parse_raw(raw: &str) -> Headers {
        let mut headers = Headers::new();
        for line in raw.lines() {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    headers.insert(name, value.trim());
                }
            }
        }
        headers
    }

    /// Convert into a reqwest [`HeaderMap`].
    pub fn to_header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::new();
        for (name, value) in self.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::InvalidHeader(format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::InvalidHeader(format!("{name}: {e}")))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.0.iter_mut().find(|(k, _)| k == name.as_str()) {
                Some((_, existing)) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                None => headers.0.push((name.as_str().to_string(), value)),
            }
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Header sources accepted by request options.
#[derive(Debug, Clone)]
pub enum HeaderInput {
    /// `Name: value` lines.
    Raw(String),
    Map(HashMap<String, String>),
    Native(HeaderMap),
}

impl HeaderInput {
    pub fn resolve(self) -> Headers {
        match self {
            HeaderInput::Raw(raw) => Headers::parse_raw(&raw),
            HeaderInput::Map(map) => {
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort();
                entries.into_iter().collect()
            }
            HeaderInput::Native(map) => Headers::from(&map),
        }
    }
}

impl From<&str> for HeaderInput {
    fn from(raw: &str) -> Self {
        HeaderInput::Raw(raw.to_string())
    }
}

impl From<String> for HeaderInput {
    fn from(raw: String) -> Self {
        HeaderInput::Raw(raw)
    }
}

impl From<HashMap<String, String>> for HeaderInput {
    fn from(map: HashMap<String, String>) -> Self {
        HeaderInput::Map(map)
    }
}

impl From<HeaderMap> for HeaderInput {
    fn from(map: HeaderMap) -> Self {
        HeaderInput::Native(map)
    }
}

impl From<Headers> for HeaderInput {
    fn from(headers: Headers) -> Self {
        HeaderInput::Map(
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
