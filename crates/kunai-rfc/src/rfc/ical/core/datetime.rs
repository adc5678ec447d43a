//! iCalendar DATE-TIME and UTC-OFFSET value types (RFC 5545 §3.3.5, §3.3.14).

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// UTC offset representation (e.g., +0530, -0800).
///
/// Stored as total seconds from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UtcOffset {
    seconds: i32,
}

impl UtcOffset {
    /// UTC offset (zero).
    pub const UTC: Self = Self { seconds: 0 };

    #[must_use]
    pub const fn from_seconds(seconds: i32) -> Self {
        Self { seconds }
    }

    #[must_use]
    pub const fn from_hours_minutes(hours: i32, minutes: i32) -> Self {
        Self {
            seconds: hours * 3600 + minutes * 60,
        }
    }

    #[must_use]
    pub const fn as_seconds(self) -> i32 {
        self.seconds
    }

    #[must_use]
    pub fn as_duration(self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(i64::from(self.seconds))
    }

    /// Offset in milliseconds, the unit used by persisted zone definitions.
    #[must_use]
    pub fn as_millis(self) -> i64 {
        i64::from(self.seconds) * 1000
    }

    /// Builds an offset from milliseconds, dropping any sub-second part.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: i32::try_from(millis / 1000).unwrap_or(0),
        }
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds >= 0 { '+' } else { '-' };
        let total = self.seconds.abs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if seconds == 0 {
            write!(f, "{sign}{hours:02}{minutes:02}")
        } else {
            write!(f, "{sign}{hours:02}{minutes:02}{seconds:02}")
        }
    }
}

/// Form of DATE-TIME value (RFC 5545 §3.3.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DateTimeForm {
    /// Same wall-clock time in any timezone, e.g. `19980118T230000`.
    Floating,
    /// Absolute instant, e.g. `19980119T070000Z`.
    Utc,
    /// Local time with a TZID reference.
    Zoned { tzid: String },
}

impl DateTimeForm {
    #[must_use]
    pub fn zoned(tzid: impl Into<String>) -> Self {
        Self::Zoned { tzid: tzid.into() }
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid } => Some(tzid),
            Self::Floating | Self::Utc => None,
        }
    }
}

/// DATE-TIME value (RFC 5545 §3.3.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub form: DateTimeForm,
}

impl DateTime {
    #[must_use]
    pub fn floating(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            form: DateTimeForm::Floating,
        }
    }

    #[must_use]
    pub fn utc(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            form: DateTimeForm::Utc,
            ..Self::floating(year, month, day, hour, minute, second)
        }
    }

    #[must_use]
    #[expect(
        clippy::too_many_arguments,
        reason = "Constructor mirrors RFC 5545 DATE-TIME components plus TZID"
    )]
    pub fn zoned(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        tzid: impl Into<String>,
    ) -> Self {
        Self {
            form: DateTimeForm::zoned(tzid),
            ..Self::floating(year, month, day, hour, minute, second)
        }
    }

    /// Builds a DATE-TIME from a chrono wall-clock value.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "chrono guarantees calendar fields fit their RFC 5545 widths for years 0..=9999"
    )]
    pub fn from_naive(naive: NaiveDateTime, form: DateTimeForm) -> Self {
        Self {
            year: naive.year().clamp(0, 9999) as u16,
            month: naive.month() as u8,
            day: naive.day() as u8,
            hour: naive.hour() as u8,
            minute: naive.minute() as u8,
            second: naive.second() as u8,
            form,
        }
    }

    /// Returns the wall-clock value, or `None` if the fields do not form a real date.
    #[must_use]
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        // Leap second 60 collapses onto 59.
        let time = NaiveTime::from_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second.min(59)),
        )?;
        Some(NaiveDateTime::new(date, time))
    }

    #[must_use]
    pub fn is_utc(&self) -> bool {
        matches!(self.form, DateTimeForm::Utc)
    }

    #[must_use]
    pub fn is_floating(&self) -> bool {
        matches!(self.form, DateTimeForm::Floating)
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.form.tzid()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}T{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )?;
        if self.is_utc() {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_offset_display() {
        assert_eq!(UtcOffset::from_hours_minutes(5, 30).to_string(), "+0530");
        assert_eq!(UtcOffset::from_hours_minutes(-8, 0).to_string(), "-0800");
        assert_eq!(UtcOffset::from_seconds(-(4 * 3600 + 30 * 60 + 15)).to_string(), "-043015");
        assert_eq!(UtcOffset::UTC.to_string(), "+0000");
    }

    #[test]
    fn utc_offset_millis() {
        let offset = UtcOffset::from_millis(-18_000_000);
        assert_eq!(offset.as_seconds(), -5 * 3600);
        assert_eq!(offset.as_millis(), -18_000_000);
    }

    #[test]
    fn datetime_display() {
        assert_eq!(DateTime::utc(2026, 1, 23, 12, 0, 0).to_string(), "20260123T120000Z");
        assert_eq!(DateTime::floating(2026, 1, 23, 12, 0, 0).to_string(), "20260123T120000");
        assert_eq!(
            DateTime::zoned(2026, 1, 23, 12, 0, 0, "Europe/Paris").tzid(),
            Some("Europe/Paris")
        );
    }

    #[test]
    fn datetime_naive_round_trip() {
        let dt = DateTime::zoned(2024, 2, 29, 23, 59, 60, "America/New_York");
        let naive = dt.to_naive().expect("valid leap day");
        assert_eq!(naive.to_string(), "2024-02-29 23:59:59");

        let back = DateTime::from_naive(naive, dt.form.clone());
        assert_eq!(back.tzid(), Some("America/New_York"));
        assert_eq!(back.second, 59);

        assert!(DateTime::floating(2023, 2, 29, 0, 0, 0).to_naive().is_none());
    }
}
