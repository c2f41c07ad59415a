//! Date helpers for API payloads.
//!
//! The API exchanges timestamps as `2016-01-05T10:38:33-07:00` on the way in
//! and returns UTC values that clients usually show in local time.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

static DATE_FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d{3})?([+-]\d{2}:\d{2}|Z)?$")
        .expect("valid date format regex")
});

static DATE_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(_date$|_at$|^created$|^last_login|^send_on$|^start$|^end$|^date_)")
        .expect("valid date field regex")
});

const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// True for strings such as:
/// - `2016-01-05T10:38:33.000+00:00`
/// - `2016-01-05T10:38:33Z`
/// - `2016-01-05 10:38:33`
pub fn is_date_format(value: &str) -> bool {
    DATE_FORMAT_RE.is_match(value)
}

/// True for field names the API uses for dates: `*_date`, `*_at`, `date_*`,
/// `created`, `last_login`, `send_on`, `start` and `end`.
pub fn is_date_field(name: &str) -> bool {
    DATE_FIELD_RE.is_match(name)
}

/// Format with an explicit offset, e.g. `2016-01-05T10:38:33-07:00`.
pub fn format<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    date.format(OFFSET_FORMAT).to_string()
}

enum Timestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

fn parse_timestamp(value: &str) -> Option<Timestamp> {
    if !is_date_format(value) {
        return None;
    }
    let mut normalized = value.replacen(' ', "T", 1);
    if normalized.ends_with('Z') {
        normalized.pop();
        normalized.push_str("+00:00");
    }
    if let Ok(date) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(Timestamp::Aware(date));
    }
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(Timestamp::Naive)
}

/// Convert a client timestamp into the offset form the server expects.
///
/// Naive values are interpreted in `tz`. Values that are not timestamps, or
/// are invalid dates, are returned unchanged.
pub fn to_utc_in<Tz: TimeZone>(value: &str, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    match parse_timestamp(value) {
        Some(Timestamp::Aware(date)) => format(&date.with_timezone(tz)),
        Some(Timestamp::Naive(naive)) => match tz.from_local_datetime(&naive).earliest() {
            Some(date) => format(&date),
            None => value.to_string(),
        },
        None => value.to_string(),
    }
}

/// Convert a server timestamp into a naive timestamp in `tz`.
///
/// Values without an offset are taken to be UTC.
pub fn from_utc_in<Tz: TimeZone>(value: &str, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    match parse_timestamp(value) {
        Some(Timestamp::Aware(date)) => date.with_timezone(tz).format(LOCAL_FORMAT).to_string(),
        Some(Timestamp::Naive(naive)) => tz
            .from_utc_datetime(&naive)
            .format(LOCAL_FORMAT)
            .to_string(),
        None => value.to_string(),
    }
}

/// [`to_utc_in`] the system local zone.
pub fn to_utc(value: &str) -> String {
    to_utc_in(value, &Local)
}

/// [`from_utc_in`] the system local zone.
pub fn from_utc(value: &str) -> String {
    from_utc_in(value, &Local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mst() -> FixedOffset {
        FixedOffset::west_opt(7 * 3600).unwrap()
    }

    #[test]
    fn recognizes_date_formats() {
        assert!(is_date_format("2016-01-05T10:38:33.000+00:00"));
        assert!(is_date_format("2016-01-05T10:38:33+00:00"));
        assert!(is_date_format("2016-01-05T10:38:33.000Z"));
        assert!(is_date_format("2016-01-05T10:38:33Z"));
        assert!(is_date_format("2016-01-05 10:38:33"));
        assert!(!is_date_format("2016-01-05"));
    }

    #[test]
    fn recognizes_date_fields() {
        for name in [
            "created_at",
            "hello_at",
            "happy_date",
            "date_created",
            "created",
            "last_login",
            "send_on",
            "start",
            "end",
        ] {
            assert!(is_date_field(name), "{name}");
        }
        assert!(!is_date_field("moo"));
        assert!(!is_date_field("at"));
    }

    #[test]
    fn to_utc_adds_offset_to_naive_values() {
        assert_eq!(
            to_utc_in("2016-06-01 12:00:00", &mst()),
            "2016-06-01T12:00:00-07:00"
        );
    }

    #[test]
    fn to_utc_converts_aware_values() {
        assert_eq!(
            to_utc_in("2016-06-01T19:00:00Z", &mst()),
            "2016-06-01T12:00:00-07:00"
        );
    }

    #[test]
    fn from_utc_shifts_into_zone() {
        assert_eq!(
            from_utc_in("2016-06-01T18:00:00+00:00", &mst()),
            "2016-06-01T11:00:00"
        );
        assert_eq!(
            from_utc_in("2016-06-01 18:00:00", &mst()),
            "2016-06-01T11:00:00"
        );
    }

    #[test]
    fn local_zone_round_trip() {
        let local = to_utc("2020-03-04 05:06:07");
        assert!(is_date_format(&local));
        assert_eq!(from_utc(&local), "2020-03-04T05:06:07");
    }

    #[test]
    fn leaves_invalid_dates_alone() {
        assert_eq!(to_utc_in("9999-99-99 99:99:99", &mst()), "9999-99-99 99:99:99");
        assert_eq!(from_utc_in("2016-06-01", &mst()), "2016-06-01");
    }
}
