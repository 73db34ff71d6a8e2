//! UTC time ranges used by `time-range` filter elements.
//!
//! A [`TimeRange`] is built once from the `start`/`end` attributes of a
//! `time-range` element and never changes afterwards. Overlap checks are done
//! against the *expanded* bounds (one day on each side) so that floating-time
//! values, which are read as UTC, are not lost when the real timezone would
//! have shifted them across a boundary.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::filter::{FilterError, FilterResult};

/// Exact length of a UTC date-time attribute (`YYYYMMDDTHHMMSSZ`).
const UTC_DATE_TIME_LEN: usize = 16;

/// Padding applied to each side of the range for overlap checks.
const EXPANSION_DAYS: i64 = 1;

/// An immutable UTC interval with optional open ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    floating_tz: Option<String>,
}

impl TimeRange {
    /// Creates a range from already-parsed bounds.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::BadFilter` if neither bound is given or if
    /// `start` is not strictly before `end`.
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> FilterResult<Self> {
        match (start, end) {
            (None, None) => Err(FilterError::bad_filter(
                "time-range requires a start or an end attribute",
            )),
            (Some(s), Some(e)) if s >= e => Err(FilterError::bad_filter(format!(
                "time-range start {} is not before end {}",
                format_utc(&s),
                format_utc(&e)
            ))),
            _ => Ok(Self {
                start,
                end,
                floating_tz: None,
            }),
        }
    }

    /// Parses a range from the raw `start`/`end` attribute values.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::BadFilter` if an attribute is not of the exact
    /// form `YYYYMMDDTHHMMSSZ`, names an impossible date, or if the bounds
    /// are missing or out of order.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> FilterResult<Self> {
        let start = start.map(parse_utc).transpose()?;
        let end = end.map(parse_utc).transpose()?;
        Self::new(start, end)
    }

    /// Attaches the timezone used by callers to resolve floating times.
    pub fn with_floating_tz(mut self, tzid: impl Into<String>) -> Self {
        self.floating_tz = Some(tzid.into());
        self
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn floating_tz(&self) -> Option<&str> {
        self.floating_tz.as_deref()
    }

    /// Start minus one day, if a start is set.
    pub fn start_expanded(&self) -> Option<DateTime<Utc>> {
        self.start.map(|s| s - Duration::days(EXPANSION_DAYS))
    }

    /// End plus one day, if an end is set.
    pub fn end_expanded(&self) -> Option<DateTime<Utc>> {
        self.end.map(|e| e + Duration::days(EXPANSION_DAYS))
    }

    /// Returns true if the instant lies within the expanded range
    /// (start inclusive, end exclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_expanded().map_or(true, |s| instant >= s)
            && self.end_expanded().map_or(true, |e| instant < e)
    }

    /// Returns true if the interval `[start, end)` overlaps the expanded range.
    ///
    /// An interval without an end, or with `end == start`, is treated as an
    /// instant.
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        match end {
            Some(end) if end > start => {
                self.end_expanded().map_or(true, |e| start < e)
                    && self.start_expanded().map_or(true, |s| end > s)
            }
            _ => self.contains(start),
        }
    }
}

/// Parses a `YYYYMMDDTHHMMSSZ` attribute into a UTC instant.
///
/// # Errors
///
/// Returns `FilterError::BadFilter` for any other lexical form.
pub fn parse_utc(value: &str) -> FilterResult<DateTime<Utc>> {
    let bytes = value.as_bytes();
    if bytes.len() != UTC_DATE_TIME_LEN || bytes[8] != b'T' || bytes[15] != b'Z' {
        return Err(FilterError::bad_filter(format!(
            "time-range value '{value}' is not of the form YYYYMMDDTHHMMSSZ"
        )));
    }

    NaiveDateTime::parse_from_str(&value[..15], "%Y%m%dT%H%M%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            FilterError::bad_filter(format!("time-range value '{value}' is not a valid date"))
        })
}

/// Formats an instant back into the `YYYYMMDDTHHMMSSZ` form.
pub fn format_utc(instant: &DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// A date or date-time value as found in iCalendar property values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarTime {
    /// A whole day (`VALUE=DATE`).
    Date(DateTime<Utc>),
    /// A date-time; floating values are read as UTC.
    DateTime(DateTime<Utc>),
}

impl CalendarTime {
    /// Parses `YYYYMMDD`, `YYYYMMDDTHHMMSS` or `YYYYMMDDTHHMMSSZ`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.len() {
            8 => NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .map(|d| Self::Date(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))),
            15 | 16 => {
                let stripped = value.strip_suffix('Z').unwrap_or(value);
                if stripped.len() != 15 {
                    return None;
                }
                NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| Self::DateTime(Utc.from_utc_datetime(&dt)))
            }
            _ => None,
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            Self::Date(d) | Self::DateTime(d) => *d,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// Parses an iCalendar duration such as `PT15M`, `-P1D` or `P1W`.
///
/// Returns `None` for malformed values and for durations chrono cannot
/// represent.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total = Duration::zero();
    let mut in_time = false;
    let mut digits = String::new();
    let mut seen_unit = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            unit => {
                let n: i64 = digits.parse().ok()?;
                digits.clear();
                let part = match (in_time, unit) {
                    (false, 'W') => Duration::try_weeks(n),
                    (false, 'D') => Duration::try_days(n),
                    (true, 'H') => Duration::try_hours(n),
                    (true, 'M') => Duration::try_minutes(n),
                    (true, 'S') => Duration::try_seconds(n),
                    _ => None,
                }?;
                total = total.checked_add(&part)?;
                seen_unit = true;
            }
        }
    }

    if !digits.is_empty() || !seen_unit {
        return None;
    }

    Some(if negative { -total } else { total })
}
