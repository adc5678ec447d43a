//! DATE, PERIOD and the typed property value (RFC 5545 §3.3).

use std::fmt;

use chrono::{Datelike, NaiveDate};

use super::{DateTime, Duration, RRule, UtcOffset};

/// DATE value (RFC 5545 §3.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    #[must_use]
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    #[must_use]
    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "chrono month/day fit in u8; year is clamped to the RFC 5545 range"
    )]
    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            year: date.year().clamp(0, 9999) as u16,
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

/// PERIOD value (RFC 5545 §3.3.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Explicit { start: DateTime, end: DateTime },
    Duration { start: DateTime, duration: Duration },
}

impl Period {
    #[must_use]
    pub fn start(&self) -> &DateTime {
        match self {
            Self::Explicit { start, .. } | Self::Duration { start, .. } => start,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit { start, end } => write!(f, "{start}/{end}"),
            Self::Duration { start, duration } => write!(f, "{start}/{duration}"),
        }
    }
}

/// Typed value of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    /// CAL-ADDRESS, kept with its URI scheme (`mailto:`).
    CalAddress(String),
    Date(Date),
    DateList(Vec<Date>),
    DateTime(DateTime),
    DateTimeList(Vec<DateTime>),
    Duration(Duration),
    Float(f64),
    Integer(i32),
    Period(Period),
    PeriodList(Vec<Period>),
    Recur(Box<RRule>),
    /// Unescaped text.
    Text(String),
    TextList(Vec<String>),
    Uri(String),
    UtcOffset(UtcOffset),
    /// Raw text of a value whose type could not be determined.
    Unknown(String),
}

impl Value {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Unknown(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<&Date> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<&Duration> {
        match self {
            Self::Duration(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_recur(&self) -> Option<&RRule> {
        match self {
            Self::Recur(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_utc_offset(&self) -> Option<UtcOffset> {
        match self {
            Self::UtcOffset(o) => Some(*o),
            _ => None,
        }
    }

    /// Address or URI payload for CAL-ADDRESS and URI values.
    #[must_use]
    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Self::CalAddress(s) | Self::Uri(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Value {
    /// Renders the wire form of non-text values. Text escaping is applied by
    /// the serializer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::CalAddress(s) | Self::Text(s) | Self::Uri(s) | Self::Unknown(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateList(list) => f.write_str(&join(list)),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::DateTimeList(list) => f.write_str(&join(list)),
            Self::Duration(d) => write!(f, "{d}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Period(p) => write!(f, "{p}"),
            Self::PeriodList(list) => f.write_str(&join(list)),
            Self::Recur(r) => write!(f, "{r}"),
            Self::TextList(list) => f.write_str(&list.join(",")),
            Self::UtcOffset(o) => write!(f, "{o}"),
        }
    }
}
