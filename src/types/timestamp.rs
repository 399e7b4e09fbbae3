//! Lenient parsing of the date and timestamp strings found in raw weather and
//! AQI exports.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%:z",
];

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses a sub-daily timestamp into a timezone-naive wall-clock time.
///
/// A trailing zone name (`UTC`) and fractional seconds are ignored. When an
/// offset is present it is dropped and the local wall-clock time kept, so a
/// `+0000 UTC` export and a `-0700` export both resolve to the clock reading
/// that was recorded.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let mut trimmed = raw.trim();
    for zone in [" UTC", " GMT", "Z"] {
        if let Some(stripped) = trimmed.strip_suffix(zone) {
            trimmed = stripped.trim_end();
            break;
        }
    }
    let trimmed = strip_fraction(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&trimmed, fmt).ok())
        .map(|dt| dt.naive_local())
        .or_else(|| {
            NAIVE_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&trimmed, fmt).ok())
        })
        .or_else(|| parse_date_only(&trimmed).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Parses a day-granularity date, accepting the timestamp forms as well.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_date_only(trimmed).or_else(|| parse_timestamp(trimmed).map(|dt| dt.date()))
}

fn parse_date_only(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// "2014-01-01 00:00:00.000 +0000" -> "2014-01-01 00:00:00 +0000"
fn strip_fraction(raw: &str) -> String {
    match raw.find('.') {
        Some(dot) if raw[..dot].contains(':') => {
            let rest = &raw[dot + 1..];
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            format!("{}{}", &raw[..dot], &rest[digits..])
        }
        _ => raw.to_string(),
    }
}
