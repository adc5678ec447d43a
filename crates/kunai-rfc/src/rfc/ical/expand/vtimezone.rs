//! VTIMEZONE evaluation (RFC 5545 §3.6.5).
//!
//! Custom zones carried inside calendar data are resolved against their own
//! STANDARD/DAYLIGHT observances. Well-known zones can be rendered into the
//! same shape for output.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::rfc::ical::core::{
    Component, ComponentKind, DateTime as ICalDateTime, DateTimeForm, Frequency, Property, RRule,
    RRuleUntil, UtcOffset, Value, Weekday, WeekdayNum, prop,
};

/// Error during VTIMEZONE interpretation.
#[derive(Debug, thiserror::Error)]
pub enum VTimezoneError {
    #[error("Missing required TZID property")]
    MissingTzid,

    #[error("VTIMEZONE must have at least one STANDARD or DAYLIGHT component")]
    NoObservances,

    #[error("Missing required property {0} in {1} component")]
    MissingProperty(&'static str, &'static str),

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

impl ObservanceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Daylight => "DAYLIGHT",
        }
    }

    const fn component_kind(self) -> ComponentKind {
        match self {
            Self::Standard => ComponentKind::Standard,
            Self::Daylight => ComponentKind::Daylight,
        }
    }
}

/// One STANDARD or DAYLIGHT sub-component.
#[derive(Debug, Clone, PartialEq)]
pub struct Observance {
    pub kind: ObservanceKind,
    pub offset_from: UtcOffset,
    pub offset_to: UtcOffset,
    /// First onset, local wall-clock time.
    pub dtstart: NaiveDateTime,
    /// Yearly transition rule, if any.
    pub rrule: Option<RRule>,
    pub rdates: Vec<NaiveDateTime>,
    pub tzname: Option<String>,
}

/// A timezone defined by observances.
#[derive(Debug, Clone, PartialEq)]
pub struct VTimezone {
    pub tzid: String,
    pub observances: Vec<Observance>,
}

impl VTimezone {
    /// ## Summary
    /// Interprets a VTIMEZONE component.
    ///
    /// ## Errors
    /// Returns an error if TZID, an observance, or a required observance
    /// property is missing or malformed.
    pub fn parse(component: &Component) -> Result<Self, VTimezoneError> {
        if component.kind != ComponentKind::Timezone {
            return Err(VTimezoneError::MissingTzid);
        }
        let tzid = component
            .text_of(prop::TZID)
            .ok_or(VTimezoneError::MissingTzid)?
            .to_string();

        let mut observances = Vec::new();
        for child in &component.children {
            let kind = match child.kind {
                ComponentKind::Standard => ObservanceKind::Standard,
                ComponentKind::Daylight => ObservanceKind::Daylight,
                _ => continue,
            };
            observances.push(parse_observance(child, kind)?);
        }
        if observances.is_empty() {
            return Err(VTimezoneError::NoObservances);
        }

        Ok(Self { tzid, observances })
    }

    /// ## Summary
    /// Approximates a well-known zone as one or two yearly observances.
    ///
    /// The transition rules are sampled from `year`. Zones without DST in
    /// that year produce a single STANDARD observance.
    #[must_use]
    pub fn from_tz(tz: Tz, tzid: &str, year: i32) -> Self {
        let offset_at = |utc: NaiveDateTime| {
            let off = tz.offset_from_utc_datetime(&utc);
            (
                UtcOffset::from_seconds(off.fix().local_minus_utc()),
                off.to_string(),
            )
        };
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap_or_default()
            .and_time(NaiveTime::MIN);
        let Some(year_start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return Self::fixed(tzid, UtcOffset::UTC, None);
        };

        let mut transitions = Vec::new();
        let mut previous = offset_at(year_start.and_time(NaiveTime::MIN));
        for day in 1..=366 {
            let probe = (year_start + TimeDelta::days(day)).and_time(NaiveTime::MIN);
            let current = offset_at(probe);
            if current.0 != previous.0 {
                // narrow to the hour
                let mut at = probe - TimeDelta::days(1);
                while offset_at(at).0 == previous.0 && at < probe {
                    at += TimeDelta::hours(1);
                }
                transitions.push((at + previous.0.as_duration(), previous.0, current.clone()));
            }
            previous = current;
        }

        if transitions.is_empty() {
            let (offset, name) = offset_at(year_start.and_time(NaiveTime::MIN));
            return Self::fixed(tzid, offset, Some(name));
        }

        let standard_seconds = transitions
            .iter()
            .map(|(_, from, (to, _))| from.as_seconds().min(to.as_seconds()))
            .min()
            .unwrap_or_default();
        let observances = transitions
            .into_iter()
            .map(|(onset, from, (to, name))| {
                let kind = if to.as_seconds() > standard_seconds {
                    ObservanceKind::Daylight
                } else {
                    ObservanceKind::Standard
                };
                let rule = yearly_rule_for(onset);
                let dtstart = rule
                    .as_ref()
                    .and_then(|r| onset_in_year(r, 1970, onset.time()))
                    .unwrap_or(epoch);
                Observance {
                    kind,
                    offset_from: from,
                    offset_to: to,
                    dtstart,
                    rrule: rule,
                    rdates: Vec::new(),
                    tzname: Some(name),
                }
            })
            .collect();

        Self {
            tzid: tzid.to_string(),
            observances,
        }
    }

    fn fixed(tzid: &str, offset: UtcOffset, name: Option<String>) -> Self {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap_or_default()
            .and_time(NaiveTime::MIN);
        Self {
            tzid: tzid.to_string(),
            observances: vec![Observance {
                kind: ObservanceKind::Standard,
                offset_from: offset,
                offset_to: offset,
                dtstart: epoch,
                rrule: None,
                rdates: Vec::new(),
                tzname: name,
            }],
        }
    }

    /// ## Summary
    /// Returns the UTC offset in effect at the given local time.
    ///
    /// Before every onset, the earliest observance's `offset_from` applies.
    #[must_use]
    pub fn offset_at(&self, local: NaiveDateTime) -> UtcOffset {
        self.observances
            .iter()
            .filter_map(|obs| effective_onset(obs, local).map(|at| (at, obs)))
            .max_by_key(|(at, _)| *at)
            .map_or_else(
                || {
                    self.observances
                        .iter()
                        .min_by_key(|o| o.dtstart)
                        .map_or(UtcOffset::UTC, |o| o.offset_from)
                },
                |(_, obs)| obs.offset_to,
            )
    }

    #[must_use]
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - self.offset_at(local).as_duration()
    }

    #[must_use]
    pub fn from_utc(&self, utc: NaiveDateTime) -> NaiveDateTime {
        let approx = utc + self.offset_at(utc).as_duration();
        utc + self.offset_at(approx).as_duration()
    }

    /// Renders this zone as a VTIMEZONE component.
    #[must_use]
    pub fn to_component(&self) -> Component {
        let mut vtz = Component::new(ComponentKind::Timezone);
        vtz.add_property(Property::text(prop::TZID, self.tzid.clone()));
        for obs in &self.observances {
            let mut child = Component::new(obs.kind.component_kind());
            child.add_property(Property::datetime(
                prop::DTSTART,
                ICalDateTime::from_naive(obs.dtstart, DateTimeForm::Floating),
            ));
            child.add_property(Property::new(
                prop::TZOFFSETFROM,
                Value::UtcOffset(obs.offset_from),
            ));
            child.add_property(Property::new(
                prop::TZOFFSETTO,
                Value::UtcOffset(obs.offset_to),
            ));
            if let Some(rule) = &obs.rrule {
                child.add_property(Property::recur(prop::RRULE, rule.clone()));
            }
            if !obs.rdates.is_empty() {
                child.add_property(Property::new(
                    prop::RDATE,
                    Value::DateTimeList(
                        obs.rdates
                            .iter()
                            .map(|d| ICalDateTime::from_naive(*d, DateTimeForm::Floating))
                            .collect(),
                    ),
                ));
            }
            if let Some(name) = &obs.tzname {
                child.add_property(Property::text(prop::TZNAME, name.clone()));
            }
            vtz.add_child(child);
        }
        vtz
    }
}

fn parse_observance(
    component: &Component,
    kind: ObservanceKind,
) -> Result<Observance, VTimezoneError> {
    let kind_str = kind.as_str();

    let dtstart_value = component
        .get_property(prop::DTSTART)
        .ok_or(VTimezoneError::MissingProperty("DTSTART", kind_str))?;
    let dtstart = match &dtstart_value.value {
        Value::DateTime(dt) => dt.to_naive(),
        Value::Date(d) => d.to_naive().map(|d| d.and_time(NaiveTime::MIN)),
        _ => None,
    }
    .ok_or_else(|| VTimezoneError::InvalidValue("DTSTART", dtstart_value.value.to_string()))?;

    let offset_to = offset_property(component, prop::TZOFFSETTO, kind_str)?;
    let offset_from = offset_property(component, prop::TZOFFSETFROM, kind_str)?;

    let rrule = component
        .get_property(prop::RRULE)
        .and_then(|p| p.value.as_recur())
        .cloned();

    let rdates = component
        .get_properties(prop::RDATE)
        .into_iter()
        .flat_map(|p| match &p.value {
            Value::DateTime(dt) => vec![dt.clone()],
            Value::DateTimeList(list) => list.clone(),
            _ => Vec::new(),
        })
        .filter_map(|dt| dt.to_naive())
        .collect();

    let tzname = component.text_of(prop::TZNAME).map(String::from);

    Ok(Observance {
        kind,
        offset_from,
        offset_to,
        dtstart,
        rrule,
        rdates,
        tzname,
    })
}

fn offset_property(
    component: &Component,
    name: &'static str,
    kind_str: &'static str,
) -> Result<UtcOffset, VTimezoneError> {
    let property = component
        .get_property(name)
        .ok_or(VTimezoneError::MissingProperty(name, kind_str))?;
    if let Some(offset) = property.value.as_utc_offset() {
        return Ok(offset);
    }
    property
        .as_text()
        .and_then(|s| crate::rfc::ical::parse::parse_utc_offset(s.trim()).ok())
        .ok_or_else(|| VTimezoneError::InvalidValue(name, property.value.to_string()))
}

/// Latest onset of `obs` at or before `local`.
fn effective_onset(obs: &Observance, local: NaiveDateTime) -> Option<NaiveDateTime> {
    if local < obs.dtstart {
        return None;
    }
    let mut best = obs.dtstart;
    for rdate in &obs.rdates {
        if *rdate <= local && *rdate > best {
            best = *rdate;
        }
    }
    if let Some(rule) = &obs.rrule
        && let Some(occurrence) = latest_yearly_occurrence(obs, rule, local)
        && occurrence > best
    {
        best = occurrence;
    }
    Some(best)
}

/// Handles the yearly BYMONTH + BYDAY (or BYMONTHDAY) rules zones use.
fn latest_yearly_occurrence(
    obs: &Observance,
    rule: &RRule,
    local: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if rule.freq != Some(Frequency::Yearly) {
        return None;
    }
    let until = rule.until.as_ref().and_then(|u| match u {
        RRuleUntil::Date(d) => d.to_naive().map(|d| d.and_time(NaiveTime::MIN)),
        RRuleUntil::DateTime(dt) => dt.to_naive(),
    });
    let time = obs.dtstart.time();

    (obs.dtstart.year()..=local.year())
        .rev()
        .filter_map(|year| onset_in_year(rule, year, time))
        .find(|occ| *occ <= local && *occ >= obs.dtstart && until.is_none_or(|u| *occ <= u))
}

fn onset_in_year(rule: &RRule, year: i32, time: NaiveTime) -> Option<NaiveDateTime> {
    let month = u32::from(*rule.by_month.first()?);
    if let Some(day) = rule.by_day.first() {
        return nth_weekday_of_month(year, month, day.weekday.to_chrono(), day.ordinal?)
            .map(|d| d.and_time(time));
    }
    let monthday = u32::try_from(*rule.by_monthday.first()?).ok()?;
    NaiveDate::from_ymd_opt(year, month, monthday).map(|d| d.and_time(time))
}

/// The `ordinal`-th `weekday` in a month; negative counts from the end.
fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: chrono::Weekday,
    ordinal: i8,
) -> Option<NaiveDate> {
    match ordinal {
        0 => None,
        n if n > 0 => NaiveDate::from_weekday_of_month_opt(
            year,
            month,
            weekday,
            u8::try_from(n).ok()?,
        ),
        n => {
            let (next_year, next_month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
            let back = (7 + last.weekday().num_days_from_monday()
                - weekday.num_days_from_monday())
                % 7;
            let weeks_back = (-i64::from(n) - 1) * 7;
            let date = last - TimeDelta::days(i64::from(back) + weeks_back);
            (date.month() == month).then_some(date)
        }
    }
}

/// Builds `FREQ=YEARLY;BYMONTH=m;BYDAY=nWD` matching a local onset.
fn yearly_rule_for(onset: NaiveDateTime) -> Option<RRule> {
    let date = onset.date();
    let day = date.day();
    let days_in_month = {
        let (ny, nm) = if date.month() == 12 {
            (date.year() + 1, 1)
        } else {
            (date.year(), date.month() + 1)
        };
        NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()?.day()
    };
    let ordinal = if day + 7 > days_in_month {
        -1
    } else {
        i8::try_from((day - 1) / 7 + 1).ok()?
    };
    Some(
        RRule::yearly()
            .with_by_month(vec![u8::try_from(date.month()).ok()?])
            .with_by_day(vec![WeekdayNum::nth(
                ordinal,
                Weekday::from_chrono(date.weekday()),
            )]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::Date;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn us_eastern() -> Component {
        let mut tz = Component::new(ComponentKind::Timezone);
        tz.add_property(Property::text(prop::TZID, "Custom/Eastern"));

        let mut standard = Component::new(ComponentKind::Standard);
        standard.add_property(Property::datetime(
            prop::DTSTART,
            ICalDateTime::floating(1970, 11, 1, 2, 0, 0),
        ));
        standard.add_property(Property::text(prop::TZOFFSETFROM, "-0400"));
        standard.add_property(Property::new(
            prop::TZOFFSETTO,
            Value::UtcOffset(UtcOffset::from_hours_minutes(-5, 0)),
        ));
        standard.add_property(Property::recur(
            prop::RRULE,
            RRule::yearly()
                .with_by_month(vec![11])
                .with_by_day(vec![WeekdayNum::nth(1, Weekday::Sunday)]),
        ));
        standard.add_property(Property::text(prop::TZNAME, "EST"));

        let mut daylight = Component::new(ComponentKind::Daylight);
        daylight.add_property(Property::date(prop::DTSTART, Date::new(1970, 3, 8)));
        daylight.add_property(Property::text(prop::TZOFFSETFROM, "-0500"));
        daylight.add_property(Property::text(prop::TZOFFSETTO, "-0400"));
        daylight.add_property(Property::recur(
            prop::RRULE,
            RRule::yearly()
                .with_by_month(vec![3])
                .with_by_day(vec![WeekdayNum::nth(2, Weekday::Sunday)]),
        ));

        tz.add_child(standard);
        tz.add_child(daylight);
        tz
    }

    #[test_log::test]
    fn custom_zone_offsets_follow_rules() {
        let vtz = VTimezone::parse(&us_eastern()).unwrap();
        assert_eq!(vtz.observances.len(), 2);
        assert_eq!(vtz.offset_at(at(2026, 1, 15, 10)).as_seconds(), -5 * 3600);
        assert_eq!(vtz.offset_at(at(2026, 7, 15, 10)).as_seconds(), -4 * 3600);
        assert_eq!(vtz.to_utc(at(2026, 7, 15, 10)), at(2026, 7, 15, 14));
        assert_eq!(vtz.from_utc(at(2026, 1, 15, 15)), at(2026, 1, 15, 10));
    }

    #[test]
    fn missing_pieces_are_errors() {
        let empty = Component::new(ComponentKind::Timezone);
        assert!(matches!(
            VTimezone::parse(&empty),
            Err(VTimezoneError::MissingTzid)
        ));

        let mut no_obs = Component::new(ComponentKind::Timezone);
        no_obs.add_property(Property::text(prop::TZID, "X"));
        assert!(matches!(
            VTimezone::parse(&no_obs),
            Err(VTimezoneError::NoObservances)
        ));
    }

    #[test]
    fn last_weekday_of_month() {
        let d = nth_weekday_of_month(2026, 3, chrono::Weekday::Sun, -1).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 29).unwrap());
        let second = nth_weekday_of_month(2026, 3, chrono::Weekday::Sun, 2).unwrap();
        assert_eq!(second, NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
    }

    #[test_log::test]
    fn well_known_zone_round_trips_through_observances() {
        let vtz = VTimezone::from_tz(Tz::Europe__Paris, "Europe/Paris", 2026);
        tracing::debug!(?vtz, "Derived observances");
        assert_eq!(vtz.observances.len(), 2);
        assert_eq!(vtz.offset_at(at(2026, 1, 15, 12)).as_seconds(), 3600);
        assert_eq!(vtz.offset_at(at(2026, 7, 15, 12)).as_seconds(), 7200);

        let reparsed = VTimezone::parse(&vtz.to_component()).unwrap();
        assert_eq!(reparsed.offset_at(at(2026, 7, 15, 12)).as_seconds(), 7200);

        let fixed = VTimezone::from_tz(Tz::Asia__Tokyo, "Asia/Tokyo", 2026);
        assert_eq!(fixed.observances.len(), 1);
        assert_eq!(fixed.offset_at(at(2026, 7, 15, 12)).as_seconds(), 9 * 3600);
    }
}
