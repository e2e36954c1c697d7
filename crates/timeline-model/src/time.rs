//! Absolute timestamps and their derived timeline offsets.
//!
//! Every clip boundary is an [`AbsoluteTime`]: the calendar wall-clock
//! reading recorded by the camera. Offsets from the start of the timeline
//! are only ever derived from an absolute value through
//! [`TimelineOrigin::place`], and the resulting [`TimelineInstant`] keeps
//! the absolute reading alongside the offset. Nothing rebuilds an absolute
//! time from an offset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// A camera wall-clock timestamp with sub-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsoluteTime(NaiveDateTime);

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported timestamp {0:?} (expected YYYY-MM-DDTHH:MM:SS[.fff])")]
pub struct TimeParseError(pub String);

impl AbsoluteTime {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Parse an ISO 8601 style timestamp.
    ///
    /// RFC 3339 values with an offset keep their local wall-clock reading;
    /// the offset is not applied, so the calendar date a camera recorded is
    /// the date that ends up on screen.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let trimmed = input.trim();
        for format in NAIVE_FORMATS {
            if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self(value));
            }
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|value| Self(value.naive_local()))
            .map_err(|_| TimeParseError(input.to_string()))
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Signed span from `earlier` to `self`.
    pub fn since(&self, earlier: AbsoluteTime) -> Duration {
        self.0 - earlier.0
    }

    /// Shift by a signed span; `None` on calendar overflow.
    pub fn checked_add(&self, span: Duration) -> Option<Self> {
        self.0.checked_add_signed(span).map(Self)
    }

    /// Format with a chrono `strftime` pattern.
    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

impl FromStr for AbsoluteTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AbsoluteTime {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AbsoluteTime> for String {
    fn from(value: AbsoluteTime) -> Self {
        value.to_string()
    }
}

/// The earliest clip start of a timeline; offsets are measured from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOrigin(AbsoluteTime);

impl TimelineOrigin {
    pub fn new(origin: AbsoluteTime) -> Self {
        Self(origin)
    }

    pub fn absolute(&self) -> AbsoluteTime {
        self.0
    }

    /// The single conversion from absolute time to a timeline position.
    pub fn place(&self, at: AbsoluteTime) -> TimelineInstant {
        TimelineInstant {
            absolute: at,
            offset: at.since(self.0),
        }
    }
}

/// A point on the timeline carrying both its absolute reading and its
/// offset from the timeline origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimelineInstant {
    absolute: AbsoluteTime,
    #[serde(serialize_with = "serialize_offset")]
    offset: Duration,
}

impl TimelineInstant {
    pub fn absolute(&self) -> AbsoluteTime {
        self.absolute
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn offset_secs(&self) -> f64 {
        duration_secs(self.offset)
    }
}

fn serialize_offset<S: serde::Serializer>(offset: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration_secs(*offset))
}

/// Convert a chrono span to fractional seconds.
pub fn duration_secs(span: Duration) -> f64 {
    span.num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| span.num_milliseconds() as f64 / 1_000.0)
}

/// Convert fractional seconds to a chrono span with microsecond precision.
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}
