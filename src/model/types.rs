//! Datatype converters and validators for value writes

use crate::xpath::date;
use crate::xpath::geo;
use crate::xpath::value::{number_to_string, parse_number};
use chrono::{DateTime, FixedOffset, Local, NaiveTime, Offset, Timelike};
use fancy_regex::Regex;
use std::sync::LazyLock;

/// Datatype of a bound node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    #[default]
    String,
    Int,
    Decimal,
    Date,
    DateTime,
    Time,
    Barcode,
    Geopoint,
    Geotrace,
    Geoshape,
    Binary,
    Select,
    Select1,
}

impl DataType {
    /// Datatype from a bind `type` such as `int` or `xsd:dateTime`; unknown
    /// names are strings
    pub fn from_name(name: &str) -> Self {
        let local = name.rsplit(':').next().unwrap_or(name);
        match local.to_ascii_lowercase().as_str() {
            "int" | "integer" => DataType::Int,
            "decimal" => DataType::Decimal,
            "date" => DataType::Date,
            "datetime" => DataType::DateTime,
            "time" => DataType::Time,
            "barcode" => DataType::Barcode,
            "geopoint" => DataType::Geopoint,
            "geotrace" => DataType::Geotrace,
            "geoshape" => DataType::Geoshape,
            "binary" => DataType::Binary,
            "select" => DataType::Select,
            "select1" => DataType::Select1,
            _ => DataType::String,
        }
    }

    /// Canonical stored form of a value. Unconvertible numbers and dates
    /// become the empty string.
    pub fn convert(self, value: &str) -> String {
        match self {
            DataType::Int => {
                let n = parse_number(value);
                if n.is_finite() {
                    number_to_string(n.round())
                } else {
                    String::new()
                }
            }
            DataType::Decimal => {
                let n = parse_number(value);
                if n.is_finite() {
                    number_to_string(n)
                } else {
                    String::new()
                }
            }
            DataType::Date => convert_date(value)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            DataType::DateTime => convert_date(value)
                .map(|dt| date::format_iso_local(&dt))
                .unwrap_or_default(),
            DataType::Time => convert_time(value).unwrap_or_default(),
            DataType::Geopoint | DataType::Geotrace | DataType::Geoshape => {
                value.trim().to_string()
            }
            _ => value.to_string(),
        }
    }

    /// Whether a non-empty stored value is valid for the type
    pub fn validate(self, value: &str) -> bool {
        match self {
            DataType::Int => matches(&INT, value),
            DataType::Decimal => matches(&DECIMAL, value),
            DataType::Date => matches(&DATE, value) && date::parse_date(value).is_some(),
            DataType::DateTime => {
                matches(&DATE_TIME, value) && date::parse_date(value).is_some()
            }
            DataType::Time => convert_time(value).is_some(),
            DataType::Geopoint => geo::parse_point(value.trim()).is_some(),
            DataType::Geotrace => geo::is_valid_points(value, 2),
            DataType::Geoshape => is_valid_shape(value),
            _ => true,
        }
    }
}

static INT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\s*-?\d+\s*$").ok());
static DECIMAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*-?(\d+\.?\d*|\.\d+)\s*$").ok());
static DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d{4}-\d{1,2}-\d{1,2}\s*$").ok());
static DATE_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d{4}-\d{1,2}-\d{1,2}(T\d{2}:\d{2}.*)?\s*$").ok());
static TIME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\.(\d{1,3}))?(Z|[+-]\d{2}:?\d{2})?$").ok()
});

fn matches(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    re.as_ref()
        .is_some_and(|re| re.is_match(value).unwrap_or(false))
}

fn convert_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    date::parse_date(value)
}

/// `HH:MM:SS.mmm+hh:mm`; a missing offset is the local one
fn convert_time(value: &str) -> Option<String> {
    let value = value.trim();
    let caps = TIME.as_ref()?.captures(value).ok()??;
    let field = |i: usize| caps.get(i).map(|m| m.as_str());
    let hour: u32 = field(1)?.parse().ok()?;
    let minute: u32 = field(2)?.parse().ok()?;
    let second: u32 = field(3).map_or(Some(0), |s| s.parse().ok())?;
    let millis: u32 = match field(4) {
        Some(ms) => format!("{:0<3}", ms).parse().ok()?,
        None => 0,
    };
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    let offset = match field(5) {
        Some("Z") => "+00:00".to_string(),
        Some(offset) if offset.len() == 5 => format!("{}:{}", &offset[..3], &offset[3..]),
        Some(offset) => offset.to_string(),
        None => Local::now().offset().fix().to_string(),
    };
    Some(format!(
        "{:02}:{:02}:{:02}.{:03}{}",
        time.hour(),
        time.minute(),
        time.second(),
        millis,
        offset
    ))
}

/// At least four points and a closed ring
fn is_valid_shape(value: &str) -> bool {
    let Some(points) = geo::parse_points(&[value]) else {
        return false;
    };
    points.len() >= 4 && points.first() == points.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("int", DataType::Int)]
    #[case("xsd:int", DataType::Int)]
    #[case("dateTime", DataType::DateTime)]
    #[case("geoshape", DataType::Geoshape)]
    #[case("note", DataType::String)]
    fn test_from_name(#[case] name: &str, #[case] expected: DataType) {
        assert_eq!(DataType::from_name(name), expected);
    }

    #[rstest]
    #[case(DataType::Int, "4.6", "5")]
    #[case(DataType::Int, "abc", "")]
    #[case(DataType::Decimal, " 2.50 ", "2.5")]
    #[case(DataType::Decimal, "1e400", "")]
    #[case(DataType::Date, "2024-3-5", "2024-03-05")]
    #[case(DataType::Date, "2024-03-05T10:00:00", "2024-03-05")]
    #[case(DataType::Date, "never", "")]
    #[case(DataType::Geopoint, " 1 2 ", "1 2")]
    #[case(DataType::String, " keep ", " keep ")]
    #[case(DataType::Time, "10:05:02.1Z", "10:05:02.100+00:00")]
    #[case(DataType::Time, "23:59+0130", "23:59:00.000+01:30")]
    #[case(DataType::Time, "25:00", "")]
    fn test_convert(#[case] data_type: DataType, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(data_type.convert(input), expected);
    }

    #[rstest]
    #[case(DataType::Int, "-12", true)]
    #[case(DataType::Int, "1.5", false)]
    #[case(DataType::Decimal, "1.5", true)]
    #[case(DataType::Decimal, "1,5", false)]
    #[case(DataType::Date, "2024-02-30", false)]
    #[case(DataType::Date, "2024-02-29", true)]
    #[case(DataType::DateTime, "2024-02-29T10:00:00.000+01:00", true)]
    #[case(DataType::Time, "10:00", true)]
    #[case(DataType::Geopoint, "91 0", false)]
    #[case(DataType::Geotrace, "1 1;2 2", true)]
    #[case(DataType::Geotrace, "1 1", false)]
    #[case(DataType::Geoshape, "0 0;0 1;1 1;0 0", true)]
    #[case(DataType::Geoshape, "0 0;0 1;1 1;1 0", false)]
    #[case(DataType::Barcode, "anything", true)]
    fn test_validate(#[case] data_type: DataType, #[case] input: &str, #[case] expected: bool) {
        assert_eq!(data_type.validate(input), expected);
    }

    #[test]
    fn test_datetime_keeps_local_offset() {
        let converted = DataType::DateTime.convert("2024-03-05T10:00:00+02:00");
        let reparsed = DateTime::parse_from_rfc3339(&converted).unwrap();
        assert_eq!(reparsed.timestamp(), 1_709_625_600);
        assert!(!converted.ends_with('Z'));
    }
}
