//! Recurrence rule (RECUR) value type (RFC 5545 §3.3.10).

use std::fmt;

use super::{Date, DateTime};

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day of the week as used by BYDAY and WKST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "MO" => Self::Monday,
            "TU" => Self::Tuesday,
            "WE" => Self::Wednesday,
            "TH" => Self::Thursday,
            "FR" => Self::Friday,
            "SA" => Self::Saturday,
            "SU" => Self::Sunday,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn to_chrono(self) -> chrono::Weekday {
        match self {
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
            Self::Saturday => chrono::Weekday::Sat,
            Self::Sunday => chrono::Weekday::Sun,
        }
    }

    #[must_use]
    pub const fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BYDAY entry: a weekday with an optional ordinal (`MO`, `2SU`, `-1FR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    #[must_use]
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{n}")?;
        }
        write!(f, "{}", self.weekday)
    }
}

/// UNTIL bound of a rule, DATE or DATE-TIME.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RRuleUntil {
    Date(Date),
    DateTime(DateTime),
}

impl fmt::Display for RRuleUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

/// Recurrence rule (RFC 5545 §3.3.10).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RRule {
    pub freq: Option<Frequency>,
    /// Defaults to 1 when absent.
    pub interval: Option<u32>,
    /// Mutually exclusive with `count`.
    pub until: Option<RRuleUntil>,
    pub count: Option<u32>,
    /// Defaults to Monday when absent.
    pub wkst: Option<Weekday>,
    pub by_second: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_hour: Vec<u8>,
    pub by_day: Vec<WeekdayNum>,
    pub by_monthday: Vec<i8>,
    pub by_yearday: Vec<i16>,
    pub by_weekno: Vec<i8>,
    pub by_month: Vec<u8>,
    pub by_setpos: Vec<i16>,
}

impl RRule {
    #[must_use]
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq: Some(freq),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    #[must_use]
    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    #[must_use]
    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self.until = None;
        self
    }

    #[must_use]
    pub fn with_until(mut self, until: RRuleUntil) -> Self {
        self.until = Some(until);
        self.count = None;
        self
    }

    #[must_use]
    pub fn with_by_day(mut self, days: Vec<WeekdayNum>) -> Self {
        self.by_day = days;
        self
    }

    #[must_use]
    pub fn with_by_month(mut self, months: Vec<u8>) -> Self {
        self.by_month = months;
        self
    }

    /// Returns a copy with defaults made explicit and BY* lists sorted, so that
    /// two rules producing the same occurrences compare equal.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut rule = self.clone();
        rule.interval = Some(self.interval.unwrap_or(1));
        rule.wkst = Some(self.wkst.unwrap_or(Weekday::Monday));
        rule.by_second.sort_unstable();
        rule.by_second.dedup();
        rule.by_minute.sort_unstable();
        rule.by_minute.dedup();
        rule.by_hour.sort_unstable();
        rule.by_hour.dedup();
        rule.by_day.sort_unstable();
        rule.by_day.dedup();
        rule.by_monthday.sort_unstable();
        rule.by_monthday.dedup();
        rule.by_yearday.sort_unstable();
        rule.by_yearday.dedup();
        rule.by_weekno.sort_unstable();
        rule.by_weekno.dedup();
        rule.by_month.sort_unstable();
        rule.by_month.dedup();
        rule.by_setpos.sort_unstable();
        rule.by_setpos.dedup();
        rule
    }

    /// Whether two rules describe the same recurrence.
    #[must_use]
    pub fn same_rule(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

fn push_list<T: fmt::Display>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
    parts.push(format!("{key}={}", joined.join(",")));
}

impl fmt::Display for RRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(freq) = self.freq {
            parts.push(format!("FREQ={freq}"));
        }
        if let Some(interval) = self.interval
            && interval != 1
        {
            parts.push(format!("INTERVAL={interval}"));
        }
        if let Some(ref until) = self.until {
            parts.push(format!("UNTIL={until}"));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(wkst) = self.wkst {
            parts.push(format!("WKST={wkst}"));
        }

        push_list(&mut parts, "BYSECOND", &self.by_second);
        push_list(&mut parts, "BYMINUTE", &self.by_minute);
        push_list(&mut parts, "BYHOUR", &self.by_hour);
        push_list(&mut parts, "BYDAY", &self.by_day);
        push_list(&mut parts, "BYMONTHDAY", &self.by_monthday);
        push_list(&mut parts, "BYYEARDAY", &self.by_yearday);
        push_list(&mut parts, "BYWEEKNO", &self.by_weekno);
        push_list(&mut parts, "BYMONTH", &self.by_month);
        push_list(&mut parts, "BYSETPOS", &self.by_setpos);

        f.write_str(&parts.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_orders_parts() {
        let rule = RRule::yearly()
            .with_by_month(vec![3])
            .with_by_day(vec![WeekdayNum::nth(2, Weekday::Sunday)]);
        assert_eq!(rule.to_string(), "FREQ=YEARLY;BYDAY=2SU;BYMONTH=3");

        let rule = RRule::daily().with_count(10).with_interval(1);
        assert_eq!(rule.to_string(), "FREQ=DAILY;COUNT=10");
    }

    #[test]
    fn count_and_until_are_exclusive() {
        let rule = RRule::daily()
            .with_count(3)
            .with_until(RRuleUntil::Date(Date::new(2024, 6, 30)));
        assert!(rule.count.is_none());
        assert!(rule.until.is_some());
    }

    #[test]
    fn same_rule_ignores_defaults_and_order() {
        let a = RRule::weekly().with_by_day(vec![
            WeekdayNum::every(Weekday::Friday),
            WeekdayNum::every(Weekday::Monday),
        ]);
        let b = RRule::weekly()
            .with_interval(1)
            .with_by_day(vec![
                WeekdayNum::every(Weekday::Monday),
                WeekdayNum::every(Weekday::Friday),
            ]);
        assert!(a.same_rule(&b));
        assert!(!a.same_rule(&b.with_interval(2)));
    }
}
