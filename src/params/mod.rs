//! Query parameters
//!
//! [`Params`] is an ordered mapping of query parameter names to
//! [`ParamValue`]s, serialized with [`stringify`] and read back with
//! [`parse`].
//!
//! Serialization rules:
//! - keys are emitted in alphabetical order
//! - null values are dropped
//! - booleans become `1` / `0`
//! - lists are joined with literal commas
//! - dates are written as `YYYY-MM-DDTHH:MM:SS±HH:MM`
//! - spaces are encoded as `%20`, never `+`

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Date(DateTime<FixedOffset>),
}

impl ParamValue {
    /// The string form used on the wire, or `None` for null values.
    pub fn to_query_value(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Float(f) => Some(format_float(*f)),
            ParamValue::Str(s) => Some(s.clone()),
            ParamValue::List(items) => Some(
                items
                    .iter()
                    .map(|item| item.to_query_value().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ParamValue::Date(date) => Some(crate::dates::format(date)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Numeric view used by pagination getters (`"25"` and `25` both work).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Int(i) => u64::try_from(*i).ok(),
            ParamValue::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_value().unwrap_or_default())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(value: $t) -> Self {
                ParamValue::Int(value as i64)
            }
        })*
    };
}

int_param!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => ParamValue::Int(i),
            Err(_) => ParamValue::Str(value.to_string()),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value as f64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

impl From<DateTime<FixedOffset>> for ParamValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        ParamValue::Date(value)
    }
}

impl From<DateTime<chrono::Utc>> for ParamValue {
    fn from(value: DateTime<chrono::Utc>) -> Self {
        ParamValue::Date(value.fixed_offset())
    }
}

impl From<&Value> for ParamValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ParamValue::Str(s.clone()),
            Value::Array(items) => ParamValue::List(items.iter().map(Into::into).collect()),
            Value::Object(_) => ParamValue::Str(value.to_string()),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_query_value() {
            Some(s) => serializer.serialize_str(&s),
            None => serializer.serialize_none(),
        }
    }
}

/// Ordered query parameter mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ParamValue> {
        self.0.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ParamValue)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; values from `other` win.
    pub fn merge(&mut self, other: Params) {
        self.0.extend(other.0);
    }

    /// Build from a JSON object. Non-object values yield empty params.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(
                map.iter()
                    .map(|(k, v)| (k.clone(), ParamValue::from(v)))
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Serialize into a query string without the leading `?`.
    pub fn stringify(&self) -> String {
        stringify(self)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ParamValue>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, ParamValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for Params {
    fn from(query: &str) -> Self {
        parse(query)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::from_json(&value)
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.0 {
            if let Some(value) = value.to_query_value() {
                map.serialize_entry(key, &value)?;
            }
        }
        map.end()
    }
}

fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw)
        .replace("%2C", ",")
        .replace('~', "%7E")
        .replace("%2A", "*")
}

/// Serialize params into a query string (no leading `?`).
pub fn stringify(params: &Params) -> String {
    params
        .iter()
        .filter_map(|(key, value)| {
            value
                .to_query_value()
                .map(|v| format!("{}={}", encode_component(key), encode_component(&v)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes()))
            .into_owned(),
    }
}

/// Parse a query string into params. A leading `?` is ignored and the last
/// occurrence of a repeated key wins.
pub fn parse(query: &str) -> Params {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = Params::new();
    for piece in query.split('&').filter(|piece| !piece.is_empty()) {
        let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
        params.insert(decode_component(key), decode_component(value));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sorts_keys_and_drops_nulls() {
        let params = Params::new()
            .with("b", 2)
            .with("a", "one")
            .with("c", ParamValue::Null);
        assert_eq!(stringify(&params), "a=one&b=2");
    }

    #[test]
    fn booleans_become_digits() {
        let params = Params::new().with("yes", true).with("no", false);
        assert_eq!(stringify(&params), "no=0&yes=1");
    }

    #[test]
    fn lists_are_comma_joined() {
        let params = Params::new().with("a", vec![1.1, 1.2]);
        assert_eq!(stringify(&params), "a=1.1,1.2");
    }

    #[test]
    fn encodes_reserved_characters_and_spaces() {
        let params = Params::new().with("a", "= ");
        assert_eq!(stringify(&params), "a=%3D%20");
    }

    #[test]
    fn spaces_are_percent_encoded() {
        let params = Params::new().with("greeting", "hello world");
        assert_eq!(stringify(&params), "greeting=hello%20world");
    }

    #[test]
    fn stringify_survives_parse() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let params = Params::new()
            .with("tags", vec!["a b", "c+d", "e,f"])
            .with("sym", "~*%+")
            .with("name", "Zoë 日本")
            .with("active", true)
            .with("hidden", false)
            .with("since", offset.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap())
            .with("ratio", 0.5)
            .with("gone", ParamValue::Null);
        let once = stringify(&params);
        assert_eq!(stringify(&parse(&once)), once);
        assert!(!once.contains("gone"));
    }

    #[test]
    fn encodes_unicode_as_utf8() {
        let params = Params::new().with("name", "café");
        assert_eq!(stringify(&params), "name=caf%C3%A9");
    }

    #[test]
    fn integral_floats_have_no_fraction() {
        assert_eq!(ParamValue::Float(3.0).to_query_value().unwrap(), "3");
    }

    #[test]
    fn dates_use_offset_format() {
        let offset = FixedOffset::west_opt(7 * 3600).unwrap();
        let date = offset.with_ymd_and_hms(2016, 1, 5, 10, 38, 33).unwrap();
        let params = Params::new().with("since", date);
        assert_eq!(stringify(&params), "since=2016-01-05T10%3A38%3A33-07%3A00");
    }

    #[test]
    fn empty_strings_are_kept() {
        let params = Params::new().with("q", "");
        assert_eq!(stringify(&params), "q=");
    }

    #[test]
    fn parse_handles_leading_question_mark_and_plus() {
        let params = parse("?a=hello+world&b=%2C");
        assert_eq!(params.get("a").and_then(ParamValue::as_str), Some("hello world"));
        assert_eq!(params.get("b").and_then(ParamValue::as_str), Some(","));
    }

    #[test]
    fn parse_last_duplicate_wins() {
        let params = parse("a=1&a=2");
        assert_eq!(params.get("a").and_then(ParamValue::as_str), Some("2"));
    }

    #[test]
    fn parse_keys_without_values() {
        let params = parse("flag&&x=1");
        assert_eq!(params.get("flag").and_then(ParamValue::as_str), Some(""));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn merge_prefers_incoming_values() {
        let mut base = parse("a=one&b=2");
        base.merge(Params::new().with("a", "1"));
        assert_eq!(stringify(&base), "a=1&b=2");
    }

    #[test]
    fn from_json_object() {
        let params = Params::from_json(&serde_json::json!({
            "limit": 25, "archived": false, "ids": [1, 2], "skip": null
        }));
        assert_eq!(stringify(&params), "archived=0&ids=1,2&limit=25");
    }
}
