//! iCalendar DURATION value type (RFC 5545 §3.3.6).

use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Duration value (RFC 5545 §3.3.6).
///
/// Either week-based (`P1W`) or day/time-based (`P1DT2H30M`). Year and month
/// designators do not exist in iCalendar durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Duration {
    pub negative: bool,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Duration {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            negative: false,
            weeks: 0,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    #[must_use]
    pub const fn weeks(weeks: u32) -> Self {
        Self {
            weeks,
            ..Self::zero()
        }
    }

    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::zero()
        }
    }

    #[must_use]
    pub const fn hours(hours: u32) -> Self {
        Self {
            hours,
            ..Self::zero()
        }
    }

    #[must_use]
    pub const fn minutes(minutes: u32) -> Self {
        Self {
            minutes,
            ..Self::zero()
        }
    }

    #[must_use]
    pub const fn seconds(seconds: u32) -> Self {
        Self {
            seconds,
            ..Self::zero()
        }
    }

    /// Normalizes a signed second count into days/hours/minutes/seconds.
    ///
    /// Whole-week spans are kept in days so that `P7D` and `P1W` stay
    /// distinguishable only when callers build them explicitly.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "Components are bounded by the modulo arithmetic; days saturate"
    )]
    pub fn from_seconds(total: i64) -> Self {
        let negative = total < 0;
        let abs = total.unsigned_abs();
        let days = abs / SECONDS_PER_DAY.unsigned_abs();
        let rem = abs % SECONDS_PER_DAY.unsigned_abs();
        Self {
            negative,
            weeks: 0,
            days: u32::try_from(days).unwrap_or(u32::MAX),
            hours: (rem / 3600) as u32,
            minutes: ((rem % 3600) / 60) as u32,
            seconds: (rem % 60) as u32,
        }
    }

    #[must_use]
    pub const fn negate(mut self) -> Self {
        self.negative = !self.negative;
        self
    }

    #[must_use]
    pub const fn as_seconds(&self) -> i64 {
        let total = (self.weeks as i64 * 7 * SECONDS_PER_DAY)
            + (self.days as i64 * SECONDS_PER_DAY)
            + (self.hours as i64 * 3600)
            + (self.minutes as i64 * 60)
            + (self.seconds as i64);

        if self.negative { -total } else { total }
    }

    /// Whole days in the calendar part (weeks and days), signed.
    #[must_use]
    pub const fn calendar_days(&self) -> i64 {
        let days = self.weeks as i64 * 7 + self.days as i64;
        if self.negative { -days } else { days }
    }

    /// Seconds in the time-of-day part (hours, minutes, seconds), signed.
    #[must_use]
    pub const fn clock_seconds(&self) -> i64 {
        let secs = self.hours as i64 * 3600 + self.minutes as i64 * 60 + self.seconds as i64;
        if self.negative { -secs } else { secs }
    }

    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.as_seconds() > 0
    }

    #[must_use]
    pub fn to_chrono(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(self.as_seconds())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;

        if self.weeks > 0 && self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
        {
            return write!(f, "{}W", self.weeks);
        }

        let days = self.days + self.weeks * 7;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        } else if days == 0 {
            write!(f, "0D")?;
        } else {
            // Day-only duration already written.
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Duration::weeks(2).to_string(), "P2W");
        assert_eq!(Duration::days(1).to_string(), "P1D");
        assert_eq!(Duration::seconds(1).to_string(), "PT1S");
        assert_eq!(Duration::zero().to_string(), "P0D");
        assert_eq!(Duration::hours(1).negate().to_string(), "-PT1H");
    }

    #[test]
    fn from_seconds_normalizes() {
        let d = Duration::from_seconds(93_784);
        assert_eq!((d.days, d.hours, d.minutes, d.seconds), (1, 2, 3, 4));
        assert_eq!(d.to_string(), "P1DT2H3M4S");

        let neg = Duration::from_seconds(-3600);
        assert!(neg.negative);
        assert_eq!(neg.as_seconds(), -3600);
    }

    #[test]
    fn calendar_and_clock_parts() {
        let d = Duration {
            weeks: 1,
            days: 2,
            hours: 3,
            ..Duration::zero()
        };
        assert_eq!(d.calendar_days(), 9);
        assert_eq!(d.clock_seconds(), 3 * 3600);
        assert!(d.is_positive());
        assert!(!Duration::zero().is_positive());
    }
}
