//! Date and date-time values as carried by an invite.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use kunai_rfc::rfc::ical::core::{
    Date, DateTime as ICalDateTime, DateTimeForm, Duration, Parameter, Property, Value, param, prop,
};
use kunai_rfc::rfc::ical::parse::{
    ParseError, ParseErrorKind, ParseResult, parse_date, parse_datetime,
};

use crate::metadata::Metadata;

/// A DATE or DATE-TIME value with its zone reference.
///
/// Ordering is structural; instants are compared through a
/// [`TimeZoneRegistry`](crate::tzmap::TimeZoneRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalDateTime {
    Date(NaiveDate),
    DateTime {
        local: NaiveDateTime,
        form: DateTimeForm,
    },
}

impl CalDateTime {
    #[must_use]
    pub const fn date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    #[must_use]
    pub const fn floating(local: NaiveDateTime) -> Self {
        Self::DateTime {
            local,
            form: DateTimeForm::Floating,
        }
    }

    #[must_use]
    pub const fn utc(local: NaiveDateTime) -> Self {
        Self::DateTime {
            local,
            form: DateTimeForm::Utc,
        }
    }

    #[must_use]
    pub fn zoned(local: NaiveDateTime, tzid: impl Into<String>) -> Self {
        Self::DateTime {
            local,
            form: DateTimeForm::zoned(tzid),
        }
    }

    #[must_use]
    pub const fn has_time(&self) -> bool {
        matches!(self, Self::DateTime { .. })
    }

    /// True for a date-time whose time of day is exactly midnight.
    #[must_use]
    pub fn has_zero_time(&self) -> bool {
        match self {
            Self::Date(_) => false,
            Self::DateTime { local, .. } => local.time() == NaiveTime::MIN,
        }
    }

    /// Wall-clock value; dates map to midnight.
    #[must_use]
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Self::Date(d) => d.and_time(NaiveTime::MIN),
            Self::DateTime { local, .. } => *local,
        }
    }

    #[must_use]
    pub fn date_part(&self) -> NaiveDate {
        match self {
            Self::Date(d) => *d,
            Self::DateTime { local, .. } => local.date(),
        }
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Date(_) => None,
            Self::DateTime { form, .. } => form.tzid(),
        }
    }

    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(
            self,
            Self::DateTime {
                form: DateTimeForm::Utc,
                ..
            }
        )
    }

    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            Self::DateTime {
                form: DateTimeForm::Floating,
                ..
            }
        )
    }

    /// Adds a duration on the wall clock.
    ///
    /// Dates move by whole days; any time-of-day part of the duration is
    /// truncated to days. `None` when the result leaves the supported
    /// calendar range.
    #[must_use]
    pub fn add(&self, duration: &Duration) -> Option<Self> {
        match self {
            Self::Date(d) => {
                let days = duration.as_seconds().div_euclid(86_400);
                d.checked_add_signed(TimeDelta::try_days(days)?)
                    .map(Self::Date)
            }
            Self::DateTime { local, form } => {
                let local = local
                    .checked_add_signed(TimeDelta::try_days(duration.calendar_days())?)?
                    .checked_add_signed(TimeDelta::try_seconds(duration.clock_seconds())?)?;
                Some(Self::DateTime {
                    local,
                    form: form.clone(),
                })
            }
        }
    }

    /// Wall-clock distance from `earlier` to `self`.
    #[must_use]
    pub fn wall_difference(&self, earlier: &Self) -> Duration {
        match (self, earlier) {
            (Self::Date(a), Self::Date(b)) => {
                let days = (*a - *b).num_days();
                let dur = Duration::days(u32::try_from(days.unsigned_abs()).unwrap_or(u32::MAX));
                if days < 0 { dur.negate() } else { dur }
            }
            _ => Duration::from_seconds((self.local() - earlier.local()).num_seconds()),
        }
    }

    /// ## Summary
    /// Persisted form: `[TZID:]YYYYMMDD[THHMMSS[Z]]`.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        match self {
            Self::Date(d) => Date::from_naive(*d).to_string(),
            Self::DateTime { local, form } => {
                let value = ICalDateTime::from_naive(*local, form.clone()).to_string();
                match form.tzid() {
                    Some(tzid) => format!("{tzid}:{value}"),
                    None => value,
                }
            }
        }
    }

    /// ## Summary
    /// Parses the persisted form written by [`Self::to_canonical`].
    ///
    /// ## Errors
    /// Returns a [`ParseError`] if the date or time part is malformed.
    pub fn parse_canonical(s: &str) -> ParseResult<Self> {
        let (tzid, value) = match s.rsplit_once(':') {
            Some((tzid, value)) if !tzid.is_empty() => (Some(tzid), value),
            _ => (None, s),
        };
        if value.contains('T') {
            let dt = parse_datetime(value, tzid)?;
            Self::from_ical(&dt).ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidDateTime, s))
        } else {
            let date = parse_date(value)?;
            date.to_naive()
                .map(Self::Date)
                .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidDate, s))
        }
    }

    #[must_use]
    pub fn from_ical(dt: &ICalDateTime) -> Option<Self> {
        Some(Self::DateTime {
            local: dt.to_naive()?,
            form: dt.form.clone(),
        })
    }

    /// Reads a DATE or DATE-TIME property value.
    #[must_use]
    pub fn from_property(prop: &Property) -> Option<Self> {
        match &prop.value {
            Value::Date(d) => d.to_naive().map(Self::Date),
            Value::DateTime(dt) => Self::from_ical(dt),
            Value::DateList(list) => list.first()?.to_naive().map(Self::Date),
            Value::DateTimeList(list) => Self::from_ical(list.first()?),
            _ => None,
        }
    }

    /// Renders as a property, with `VALUE=DATE` or `TZID` as needed.
    #[must_use]
    pub fn to_property(&self, name: &str) -> Property {
        match self {
            Self::Date(d) => Property::date(name, Date::from_naive(*d)),
            Self::DateTime { local, form } => {
                Property::datetime(name, ICalDateTime::from_naive(*local, form.clone()))
            }
        }
    }
}

impl fmt::Display for CalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

/// RANGE parameter of a RECURRENCE-ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RecurRange {
    #[default]
    None,
    ThisAndFuture,
    ThisAndPrior,
}

impl RecurRange {
    /// Persisted range code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::None => 1,
            Self::ThisAndFuture => 2,
            Self::ThisAndPrior => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            2 => Self::ThisAndFuture,
            3 => Self::ThisAndPrior,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn param_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ThisAndFuture => Some("THISANDFUTURE"),
            Self::ThisAndPrior => Some("THISANDPRIOR"),
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("THISANDFUTURE") {
            Self::ThisAndFuture
        } else if s.eq_ignore_ascii_case("THISANDPRIOR") {
            Self::ThisAndPrior
        } else {
            Self::None
        }
    }
}

/// Identifies one occurrence of a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecurId {
    pub dt: CalDateTime,
    pub range: RecurRange,
}

const FN_RECURRENCE_ID: &str = "recurId";
const FN_RANGE_TYPE: &str = "rgtyp";

impl RecurId {
    #[must_use]
    pub const fn new(dt: CalDateTime) -> Self {
        Self {
            dt,
            range: RecurRange::None,
        }
    }

    #[must_use]
    pub const fn with_range(dt: CalDateTime, range: RecurRange) -> Self {
        Self { dt, range }
    }

    #[must_use]
    pub fn to_property(&self) -> Property {
        let mut property = self.dt.to_property(prop::RECURRENCE_ID);
        if let Some(range) = self.range.param_value() {
            property.set_param(Parameter::new(param::RANGE, range));
        }
        property
    }

    #[must_use]
    pub fn from_property(prop: &Property) -> Option<Self> {
        let dt = CalDateTime::from_property(prop)?;
        let range = prop
            .get_param_value(param::RANGE)
            .map_or(RecurRange::None, RecurRange::parse);
        Some(Self { dt, range })
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.put(FN_RANGE_TYPE, self.range.code());
        meta.put(FN_RECURRENCE_ID, self.dt.to_canonical());
        meta
    }

    /// ## Errors
    /// Returns a [`ParseError`] if the stored date-time is missing or malformed.
    pub fn decode_metadata(meta: &Metadata) -> ParseResult<Self> {
        let raw = meta
            .get_str(FN_RECURRENCE_ID)
            .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidDateTime).with_context("missing recurId"))?;
        Ok(Self {
            dt: CalDateTime::parse_canonical(raw)?,
            range: RecurRange::from_code(meta.get_long_or(FN_RANGE_TYPE, 1)),
        })
    }
}

impl fmt::Display for RecurId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range.param_value() {
            Some(range) => write!(f, "{};RANGE={range}", self.dt),
            None => write!(f, "{}", self.dt),
        }
    }
}

/// Outcome of checking a start value against the all-day flag.
///
/// Midnight date-times leave the flag alone: some clients send all-day
/// events as `T000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllDayVerdict {
    ForceAllDay,
    ForceTimed,
    Unchanged,
}

impl AllDayVerdict {
    #[must_use]
    pub fn for_value(value: Option<&CalDateTime>) -> Self {
        match value {
            None => Self::ForceTimed,
            Some(CalDateTime::Date(_)) => Self::ForceAllDay,
            Some(dt) if dt.has_zero_time() => Self::Unchanged,
            Some(_) => Self::ForceTimed,
        }
    }

    #[must_use]
    pub const fn apply(self, current: bool) -> bool {
        match self {
            Self::ForceAllDay => true,
            Self::ForceTimed => false,
            Self::Unchanged => current,
        }
    }
}

/// Truncates to whole seconds.
#[must_use]
pub fn truncate_to_seconds(dt: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
