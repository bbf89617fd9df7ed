//! Date helpers for the form dialect
//!
//! Dates travel as `DateTime<FixedOffset>` in the local time zone. Numbers
//! convert to and from dates as (fractional) days since the Unix epoch.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// String form of an unparseable date
pub const INVALID_DATE: &str = "Invalid Date";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Current local date-time
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Local midnight of the current day
pub fn today() -> Option<DateTime<FixedOffset>> {
    local_midnight(Local::now().date_naive())
}

/// Local midnight of a calendar date
pub fn local_midnight(date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    from_local(date.and_hms_opt(0, 0, 0)?)
}

fn from_local(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Date for a number of days since the epoch
pub fn from_days(days: f64) -> Option<DateTime<FixedOffset>> {
    if !days.is_finite() {
        return None;
    }
    let millis = (days * MILLIS_PER_DAY).round() as i64;
    DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&Local).fixed_offset())
}

/// Days since the epoch, with the time of day as a fraction
pub fn days_since_epoch(dt: &DateTime<FixedOffset>) -> f64 {
    dt.timestamp_millis() as f64 / MILLIS_PER_DAY
}

/// Parse a date, date-time or day number.
///
/// Accepts RFC 3339 date-times, offset-less date-times (local time),
/// `YYYY-MM-DD` and `YYYY/MM/DD` dates (local midnight) and plain numbers
/// (days since the epoch).
pub fn parse_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return from_local(naive);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return local_midnight(date);
        }
    }
    let days = super::value::parse_number(s);
    if days.is_nan() {
        None
    } else {
        from_days(days)
    }
}

/// Whether a string starts like a calendar date (`YYYY-M-D` or `YYYY/M/D`)
pub fn is_date_like(s: &str) -> bool {
    let b = s.trim().as_bytes();
    let digits = |from: usize, min: usize, max: usize| -> Option<usize> {
        let n = b[from.min(b.len())..]
            .iter()
            .take(max)
            .take_while(|c| c.is_ascii_digit())
            .count();
        (n >= min).then_some(from + n)
    };
    let separator = |at: usize| b.get(at).is_some_and(|&c| c == b'-' || c == b'/');

    let Some(year_end) = digits(0, 4, 4) else {
        return false;
    };
    if !separator(year_end) {
        return false;
    }
    let Some(month_end) = digits(year_end + 1, 1, 2) else {
        return false;
    };
    if !separator(month_end) {
        return false;
    }
    digits(month_end + 1, 1, 2).is_some()
}

/// ISO 8601 with milliseconds and the local offset, e.g.
/// `2024-03-05T14:07:09.120+01:00`
pub fn format_iso_local(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// Left-pad `s` with `pad` up to `width` characters
pub fn pad_left(s: &str, width: usize, pad: char) -> String {
    let len = s.chars().count();
    let mut out = String::with_capacity(width.max(len));
    for _ in len..width {
        out.push(pad);
    }
    out.push_str(s);
    out
}

/// Apply a `format-date` pattern. Unknown `%` tokens are copied through.
pub fn format_date(dt: Option<&DateTime<FixedOffset>>, pattern: &str) -> String {
    let Some(dt) = dt else {
        return INVALID_DATE.to_string();
    };
    // fields are read in local time, whatever offset the date was written with
    let dt = dt.with_timezone(&Local);
    let two = |n: u32| pad_left(&n.to_string(), 2, '0');

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&pad_left(&dt.year().to_string(), 4, '0')),
            Some('y') => out.push_str(&two(dt.year().rem_euclid(100) as u32)),
            Some('m') => out.push_str(&two(dt.month())),
            Some('n') => out.push_str(&dt.month().to_string()),
            Some('b') => out.push_str(MONTHS[dt.month0() as usize]),
            Some('d') => out.push_str(&two(dt.day())),
            Some('e') => out.push_str(&dt.day().to_string()),
            Some('H') => out.push_str(&two(dt.hour())),
            Some('h') => out.push_str(&dt.hour().to_string()),
            Some('M') => out.push_str(&two(dt.minute())),
            Some('S') => out.push_str(&two(dt.second())),
            Some('3') => out.push_str(&pad_left(
                &(dt.timestamp_subsec_millis() % 1000).to_string(),
                3,
                '0',
            )),
            Some('a') => out.push_str(WEEKDAYS[dt.weekday().num_days_from_monday() as usize]),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}
