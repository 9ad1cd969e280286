//! Lenient date parsing for the heterogeneous date strings found in source records.
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// `git log` default format, e.g. `Tue Aug 14 14:30:13 2012 -0300`.
const GIT_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

/// Bugzilla XML export format, e.g. `2016-06-24 13:02:01 +0200`.
const BUGZILLA_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Fallback used by mailing-list messages without a usable `Date` header.
pub const EPOCH_NAIVE: &str = "1970-01-01T00:00:00";

pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .or_else(|_| DateTime::parse_from_str(text, GIT_DATE_FORMAT))
        .or_else(|_| DateTime::parse_from_str(text, BUGZILLA_DATE_FORMAT))
        .ok()
        .or_else(|| {
            dateparser::parse_with_timezone(text, &Utc)
                .ok()
                .map(|d| d.fixed_offset())
        })
}

/// Parse and render as RFC 3339, keeping the source offset.
pub fn normalize(text: &str) -> Option<String> {
    parse_datetime(text).map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Parse a cell holding a date string, null and non-strings give `None`.
pub fn parse_cell(value: &Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(parse_datetime)
}

/// Parse and drop the offset, keeping the wall-clock time of the source.
pub fn normalize_naive(text: &str) -> Option<String> {
    parse_datetime(text).map(|d| format_naive(d.naive_local()))
}

pub fn format_naive(date: NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Epoch seconds, either as a JSON number or a numeric string, rendered in UTC.
pub fn from_epoch(value: &Value) -> Option<String> {
    let seconds = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
