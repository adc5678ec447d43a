//! Value type parsers for iCalendar (RFC 5545 §3.3).
#![expect(
    clippy::map_err_ignore,
    reason = "Number parse errors carry no detail beyond the rejected input, which is kept as context"
)]

use std::str::FromStr;

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{
    Date, DateTime, DateTimeForm, Duration, Frequency, Period, RRule, RRuleUntil, UtcOffset,
    Weekday, WeekdayNum,
};

fn number<T: FromStr>(s: &str, kind: ParseErrorKind, input: &str) -> ParseResult<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'+') {
        return Err(ParseError::invalid(kind, input));
    }
    s.parse().map_err(|_| ParseError::invalid(kind, input))
}

/// Parses a DATE value (RFC 5545 §3.3.4).
///
/// Format: YYYYMMDD (e.g., "19970714")
///
/// ## Errors
/// Returns an error if the string is not a valid calendar date.
pub fn parse_date(s: &str) -> ParseResult<Date> {
    if s.len() != 8 || !s.is_ascii() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidDate, s));
    }
    let date = Date::new(
        number(&s[0..4], ParseErrorKind::InvalidDate, s)?,
        number(&s[4..6], ParseErrorKind::InvalidDate, s)?,
        number(&s[6..8], ParseErrorKind::InvalidDate, s)?,
    );
    if date.to_naive().is_none() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidDate, s));
    }
    Ok(date)
}

/// Parses the time part of a DATE-TIME, returning `(h, m, s, is_utc)`.
fn parse_time(s: &str) -> ParseResult<(u8, u8, u8, bool)> {
    let (digits, is_utc) = match s.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidTime, s));
    }
    let hour: u8 = number(&digits[0..2], ParseErrorKind::InvalidTime, s)?;
    let minute: u8 = number(&digits[2..4], ParseErrorKind::InvalidTime, s)?;
    let second: u8 = number(&digits[4..6], ParseErrorKind::InvalidTime, s)?;
    // 60 is a leap second
    if hour > 23 || minute > 59 || second > 60 {
        return Err(ParseError::invalid(ParseErrorKind::InvalidTime, s));
    }
    Ok((hour, minute, second, is_utc))
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5).
///
/// Format: YYYYMMDD"T"HHMMSS[Z]. A trailing `Z` wins over `tzid`.
///
/// ## Errors
/// Returns an error if the string is not a valid date-time.
pub fn parse_datetime(s: &str, tzid: Option<&str>) -> ParseResult<DateTime> {
    let (date_str, time_str) = s
        .split_once('T')
        .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidDateTime, s))?;
    let date = parse_date(date_str)
        .map_err(|e| ParseError::new(ParseErrorKind::InvalidDateTime).with_context(e.to_string()))?;
    let (hour, minute, second, is_utc) = parse_time(time_str)?;

    let form = if is_utc {
        DateTimeForm::Utc
    } else if let Some(tz) = tzid {
        DateTimeForm::zoned(tz)
    } else {
        DateTimeForm::Floating
    };

    Ok(DateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        hour,
        minute,
        second,
        form,
    })
}

/// Parses a UTC-OFFSET value (RFC 5545 §3.3.14).
///
/// Format: (+|-)HHMM[SS] (e.g., "+0530", "-0800")
///
/// ## Errors
/// Returns an error if the string is not a valid UTC offset.
pub fn parse_utc_offset(s: &str) -> ParseResult<UtcOffset> {
    if !(s.len() == 5 || s.len() == 7) || !s.is_ascii() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidUtcOffset, s));
    }
    let sign = match &s[0..1] {
        "+" => 1,
        "-" => -1,
        _ => return Err(ParseError::invalid(ParseErrorKind::InvalidUtcOffset, s)),
    };
    let hours: i32 = number(&s[1..3], ParseErrorKind::InvalidUtcOffset, s)?;
    let minutes: i32 = number(&s[3..5], ParseErrorKind::InvalidUtcOffset, s)?;
    let seconds: i32 = if s.len() == 7 {
        number(&s[5..7], ParseErrorKind::InvalidUtcOffset, s)?
    } else {
        0
    };
    if minutes > 59 || seconds > 59 {
        return Err(ParseError::invalid(ParseErrorKind::InvalidUtcOffset, s));
    }
    Ok(UtcOffset::from_seconds(
        sign * (hours * 3600 + minutes * 60 + seconds),
    ))
}

/// Parses a DURATION value (RFC 5545 §3.3.6).
///
/// Format: [+|-]P[nW] or [+|-]P[nD][T[nH][nM][nS]]
///
/// ## Errors
/// Returns an error if the string is not a valid duration.
pub fn parse_duration(s: &str) -> ParseResult<Duration> {
    let err = || ParseError::invalid(ParseErrorKind::InvalidDuration, s);
    let mut dur = Duration::zero();

    let rest = if let Some(r) = s.strip_prefix('-') {
        dur.negative = true;
        r
    } else {
        s.strip_prefix('+').unwrap_or(s)
    };
    let rest = rest.strip_prefix('P').ok_or_else(err)?;
    if rest.is_empty() {
        return Err(err());
    }

    let mut in_time = false;
    let mut saw_component = false;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' {
            if in_time || !digits.is_empty() {
                return Err(err());
            }
            in_time = true;
            continue;
        }
        let n: u32 = digits.parse().map_err(|_| err())?;
        digits.clear();
        match (c, in_time) {
            ('W', false) => dur.weeks = n,
            ('D', false) => dur.days = n,
            ('H', true) => dur.hours = n,
            ('M', true) => dur.minutes = n,
            ('S', true) => dur.seconds = n,
            _ => return Err(err()),
        }
        saw_component = true;
    }
    if !digits.is_empty() || !saw_component {
        return Err(err());
    }
    Ok(dur)
}

/// Parses a PERIOD value (RFC 5545 §3.3.9).
///
/// Format: start"/"end or start"/"duration
///
/// ## Errors
/// Returns an error if the string is not a valid period.
pub fn parse_period(s: &str, tzid: Option<&str>) -> ParseResult<Period> {
    let (start_str, end_str) = s
        .split_once('/')
        .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidPeriod, s))?;
    let start = parse_datetime(start_str, tzid)?;
    if end_str.starts_with(['P', '+', '-']) {
        Ok(Period::Duration {
            start,
            duration: parse_duration(end_str)?,
        })
    } else {
        Ok(Period::Explicit {
            start,
            end: parse_datetime(end_str, tzid)?,
        })
    }
}

/// Parses a RECUR value (RFC 5545 §3.3.10).
///
/// Unknown rule parts are ignored.
///
/// ## Errors
/// Returns an error for malformed parts, a missing FREQ, or COUNT together
/// with UNTIL.
pub fn parse_rrule(s: &str) -> ParseResult<RRule> {
    let mut rrule = RRule::default();

    for part in s.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidRRule, part))?;
        parse_rrule_part(&mut rrule, key, value)?;
    }

    if rrule.freq.is_none() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidFrequency, s));
    }
    if rrule.count.is_some() && rrule.until.is_some() {
        return Err(ParseError::invalid(ParseErrorKind::UntilCountConflict, s));
    }
    Ok(rrule)
}

fn parse_rrule_part(rrule: &mut RRule, key: &str, value: &str) -> ParseResult<()> {
    let bad = ParseErrorKind::InvalidRRule;
    match key.to_ascii_uppercase().as_str() {
        "FREQ" => {
            rrule.freq = Some(
                Frequency::parse(value)
                    .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidFrequency, value))?,
            );
        }
        "INTERVAL" => rrule.interval = Some(number(value, bad, value)?),
        "COUNT" => rrule.count = Some(number(value, bad, value)?),
        "UNTIL" => {
            rrule.until = Some(if value.contains('T') {
                RRuleUntil::DateTime(parse_datetime(value, None)?)
            } else {
                RRuleUntil::Date(parse_date(value)?)
            });
        }
        "WKST" => {
            rrule.wkst = Some(
                Weekday::parse(value)
                    .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidWeekday, value))?,
            );
        }
        "BYSECOND" => rrule.by_second = parse_list(value)?,
        "BYMINUTE" => rrule.by_minute = parse_list(value)?,
        "BYHOUR" => rrule.by_hour = parse_list(value)?,
        "BYDAY" => {
            rrule.by_day = value
                .split(',')
                .map(|v| parse_weekday_num(v.trim()))
                .collect::<ParseResult<_>>()?;
        }
        "BYMONTHDAY" => rrule.by_monthday = parse_list(value)?,
        "BYYEARDAY" => rrule.by_yearday = parse_list(value)?,
        "BYWEEKNO" => rrule.by_weekno = parse_list(value)?,
        "BYMONTH" => rrule.by_month = parse_list(value)?,
        "BYSETPOS" => rrule.by_setpos = parse_list(value)?,
        _ => tracing::trace!(part = key, "Ignoring unknown RRULE part"),
    }
    Ok(())
}

fn parse_list<T: FromStr>(s: &str) -> ParseResult<Vec<T>> {
    s.split(',')
        .map(|v| number(v.trim(), ParseErrorKind::InvalidRRule, s))
        .collect()
}

/// Parses a weekday with optional ordinal (e.g., "MO", "1MO", "-1FR").
fn parse_weekday_num(s: &str) -> ParseResult<WeekdayNum> {
    if s.len() < 2 || !s.is_ascii() {
        return Err(ParseError::invalid(ParseErrorKind::InvalidWeekday, s));
    }
    let (ordinal_str, weekday_str) = s.split_at(s.len() - 2);
    let weekday = Weekday::parse(weekday_str)
        .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidWeekday, s))?;
    let ordinal = if ordinal_str.is_empty() {
        None
    } else {
        Some(number(ordinal_str, ParseErrorKind::InvalidWeekday, s)?)
    };
    Ok(WeekdayNum { ordinal, weekday })
}

/// Unescapes TEXT values (RFC 5545 §3.3.11).
///
/// Escape sequences: \\ \, \; \n \N. Unknown escapes are kept verbatim.
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(',') => result.push(','),
            Some(';') => result.push(';'),
            Some('\\') | None => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
        }
    }

    result
}

/// Splits a multi-valued TEXT on unescaped commas, unescaping each item.
#[must_use]
pub fn split_text_list(s: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(unescape_text(&current));
    items
}

/// Parses a BOOLEAN value (RFC 5545 §3.3.2).
///
/// ## Errors
/// Returns an error if the string is not "TRUE" or "FALSE".
pub fn parse_boolean(s: &str) -> ParseResult<bool> {
    if s.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(ParseError::invalid(ParseErrorKind::InvalidBoolean, s))
    }
}

/// Parses an INTEGER value (RFC 5545 §3.3.8).
///
/// ## Errors
/// Returns an error if the string is not a valid integer.
pub fn parse_integer(s: &str) -> ParseResult<i32> {
    s.trim()
        .parse()
        .map_err(|_| ParseError::invalid(ParseErrorKind::InvalidInteger, s))
}

/// Parses a FLOAT value (RFC 5545 §3.3.7).
///
/// ## Errors
/// Returns an error if the string is not a valid floating-point number.
pub fn parse_float(s: &str) -> ParseResult<f64> {
    s.trim()
        .parse()
        .map_err(|_| ParseError::invalid(ParseErrorKind::InvalidFloat, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_basic() {
        let date = parse_date("20260123").unwrap();
        assert_eq!((date.year, date.month, date.day), (2026, 1, 23));
    }

    #[test]
    fn parse_date_invalid() {
        assert!(parse_date("2026012").is_err());
        assert!(parse_date("20261301").is_err());
        assert!(parse_date("20260230").is_err());
    }

    #[test]
    fn parse_datetime_forms() {
        assert!(parse_datetime("20260123T120000Z", None).unwrap().is_utc());
        assert!(
            parse_datetime("20260123T120000", None)
                .unwrap()
                .is_floating()
        );
        let zoned = parse_datetime("20260123T120000", Some("America/New_York")).unwrap();
        assert_eq!(zoned.tzid(), Some("America/New_York"));
        assert_eq!(zoned.hour, 12);
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        let err = parse_datetime("2026-01-23 12:00", None).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidDateTime);
        assert!(parse_datetime("20260123T250000", None).is_err());
    }

    #[test]
    fn parse_duration_forms() {
        assert_eq!(parse_duration("P2W").unwrap().weeks, 2);
        let dur = parse_duration("P1DT2H30M").unwrap();
        assert_eq!((dur.days, dur.hours, dur.minutes), (1, 2, 30));
        let neg = parse_duration("-PT15M").unwrap();
        assert!(neg.negative);
        assert_eq!(neg.minutes, 15);
        assert_eq!(parse_duration("PT1S").unwrap().as_seconds(), 1);
    }

    #[test]
    fn parse_duration_rejects_malformed() {
        for bad in ["", "P", "PT", "1H", "PT1D", "P1H", "PX", "P5"] {
            assert!(parse_duration(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn parse_utc_offset_signs() {
        assert_eq!(parse_utc_offset("+0530").unwrap().as_seconds(), 19_800);
        assert_eq!(parse_utc_offset("-0800").unwrap().as_seconds(), -28_800);
        assert_eq!(parse_utc_offset("+013015").unwrap().as_seconds(), 5415);
        assert!(parse_utc_offset("0530").is_err());
    }

    #[test]
    fn parse_rrule_parts() {
        let rrule = parse_rrule("FREQ=DAILY;COUNT=10").unwrap();
        assert_eq!(rrule.freq, Some(Frequency::Daily));
        assert_eq!(rrule.count, Some(10));

        let weekly = parse_rrule("FREQ=WEEKLY;BYDAY=MO,WE,FR;X-FOO=1").unwrap();
        assert_eq!(weekly.by_day.len(), 3);

        let monthly = parse_rrule("FREQ=MONTHLY;BYDAY=-1FR").unwrap();
        assert_eq!(monthly.by_day[0].ordinal, Some(-1));
        assert_eq!(monthly.by_day[0].weekday, Weekday::Friday);
    }

    #[test]
    fn parse_rrule_conflicts() {
        let err = parse_rrule("FREQ=DAILY;COUNT=10;UNTIL=20260131").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UntilCountConflict);
        assert_eq!(
            parse_rrule("COUNT=3").unwrap_err().kind,
            ParseErrorKind::InvalidFrequency
        );
    }

    #[test]
    fn text_unescape_and_split() {
        assert_eq!(unescape_text("hello\\, world"), "hello, world");
        assert_eq!(unescape_text("line1\\nline2"), "line1\nline2");
        assert_eq!(unescape_text("back\\\\slash"), "back\\slash");
        assert_eq!(split_text_list("a,b\\,c,d"), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn parse_period_variants() {
        match parse_period("20260123T090000Z/20260123T170000Z", None).unwrap() {
            Period::Explicit { start, end } => assert_eq!((start.hour, end.hour), (9, 17)),
            Period::Duration { .. } => panic!("expected explicit period"),
        }
        match parse_period("20260123T090000Z/PT8H", None).unwrap() {
            Period::Duration { duration, .. } => assert_eq!(duration.hours, 8),
            Period::Explicit { .. } => panic!("expected duration period"),
        }
    }

    #[test]
    fn scalar_values() {
        assert!(parse_boolean("true").unwrap());
        assert!(parse_boolean("maybe").is_err());
        assert_eq!(parse_integer(" 5").unwrap(), 5);
        assert!((parse_float("37.386013").unwrap() - 37.386_013).abs() < f64::EPSILON);
    }
}
