//! Per-invite time zone registry.
//!
//! Holds the zone definitions an invite references, keyed by their real
//! TZID, plus an alias table for TZIDs that re-imported data used for an
//! equivalent zone. Well-known zones persist as a bare identifier; custom
//! zones persist their offsets, onsets and yearly rules.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use kunai_core::constants::UNKNOWN_TZID;
use kunai_rfc::rfc::ical::core::{Component, DateTimeForm, RRule, UtcOffset};
use kunai_rfc::rfc::ical::expand::{
    Observance, ObservanceKind, VTimezone, canonical_tzid, localize, well_known_zone,
};
use kunai_rfc::rfc::ical::parse::{ParseError, ParseErrorKind, parse_datetime, parse_rrule};

use crate::error::{InviteError, InviteResult};
use crate::metadata::{MetaValue, Metadata};
use crate::temporal::CalDateTime;

const FN_TZID: &str = "tzid";
const FN_STD_OFFSET: &str = "so";
const FN_HAS_DAYLIGHT: &str = "hd";
const FN_DAYLIGHT_OFFSET: &str = "do";
const FN_DAYTOSTD_DTSTART: &str = "d2ss";
const FN_DAYTOSTD_RULE: &str = "d2sr";
const FN_STDTODAY_DTSTART: &str = "s2ds";
const FN_STDTODAY_RULE: &str = "s2dr";
const FN_STD_NAME: &str = "sn";
const FN_DAYLIGHT_NAME: &str = "dn";

const FN_IDS: &str = "ids";
const FN_ALIASES: &str = "al";

/// One side of a custom zone: the offset in effect after `onset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneObservance {
    pub offset: UtcOffset,
    /// First onset, local wall-clock time.
    pub onset: NaiveDateTime,
    pub rule: Option<RRule>,
    pub name: Option<String>,
}

/// A zone defined inline by calendar data rather than by the IANA catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomZone {
    pub tzid: String,
    pub standard: ZoneObservance,
    pub daylight: Option<ZoneObservance>,
}

fn epoch_onset() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

fn naive_to_string(local: NaiveDateTime) -> String {
    kunai_rfc::rfc::ical::core::DateTime::from_naive(local, DateTimeForm::Floating).to_string()
}

fn naive_from_str(s: &str) -> InviteResult<NaiveDateTime> {
    parse_datetime(s, None)?
        .to_naive()
        .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidDateTime, s).into())
}

impl CustomZone {
    /// A zone with a single fixed offset.
    #[must_use]
    pub fn fixed(tzid: impl Into<String>, offset: UtcOffset) -> Self {
        Self {
            tzid: tzid.into(),
            standard: ZoneObservance {
                offset,
                onset: epoch_onset(),
                rule: None,
                name: None,
            },
            daylight: None,
        }
    }

    /// ## Summary
    /// Reduces a VTIMEZONE to its current standard and daylight observances.
    ///
    /// The latest onset of each kind wins. A zone with only DAYLIGHT
    /// observances is treated as a fixed zone at that offset.
    #[must_use]
    pub fn from_vtimezone(vtz: &VTimezone) -> Self {
        let latest = |kind: ObservanceKind| {
            vtz.observances
                .iter()
                .filter(|o| o.kind == kind)
                .max_by_key(|o| o.dtstart)
                .map(|o| ZoneObservance {
                    offset: o.offset_to,
                    onset: o.dtstart,
                    rule: o.rrule.clone(),
                    name: o.tzname.clone(),
                })
        };
        match (latest(ObservanceKind::Standard), latest(ObservanceKind::Daylight)) {
            (Some(standard), daylight) => Self {
                tzid: vtz.tzid.clone(),
                standard,
                daylight,
            },
            (None, Some(only)) => Self {
                tzid: vtz.tzid.clone(),
                standard: ZoneObservance { rule: None, ..only },
                daylight: None,
            },
            (None, None) => Self::fixed(vtz.tzid.clone(), UtcOffset::UTC),
        }
    }

    /// Expands back into STANDARD/DAYLIGHT observances.
    #[must_use]
    pub fn to_vtimezone(&self) -> VTimezone {
        let dst_offset = self
            .daylight
            .as_ref()
            .map_or(self.standard.offset, |d| d.offset);
        let mut observances = vec![Observance {
            kind: ObservanceKind::Standard,
            offset_from: dst_offset,
            offset_to: self.standard.offset,
            dtstart: self.standard.onset,
            rrule: self.standard.rule.clone(),
            rdates: Vec::new(),
            tzname: self.standard.name.clone(),
        }];
        if let Some(daylight) = &self.daylight {
            observances.push(Observance {
                kind: ObservanceKind::Daylight,
                offset_from: self.standard.offset,
                offset_to: daylight.offset,
                dtstart: daylight.onset,
                rrule: daylight.rule.clone(),
                rdates: Vec::new(),
                tzname: daylight.name.clone(),
            });
        }
        VTimezone {
            tzid: self.tzid.clone(),
            observances,
        }
    }

    /// Same offsets and transition rules, regardless of names.
    #[must_use]
    pub fn same_rules(&self, other: &Self) -> bool {
        let same_side = |a: &ZoneObservance, b: &ZoneObservance| {
            a.offset == b.offset
                && match (&a.rule, &b.rule) {
                    (Some(x), Some(y)) => x.same_rule(y),
                    (None, None) => true,
                    _ => false,
                }
        };
        same_side(&self.standard, &other.standard)
            && match (&self.daylight, &other.daylight) {
                (Some(a), Some(b)) => same_side(a, b),
                (None, None) => true,
                _ => false,
            }
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.put(FN_TZID, self.tzid.as_str());
        meta.put(FN_STD_OFFSET, self.standard.offset.as_millis());
        meta.put(FN_DAYTOSTD_DTSTART, naive_to_string(self.standard.onset));
        meta.put_opt(FN_DAYTOSTD_RULE, self.standard.rule.as_ref().map(ToString::to_string));
        meta.put_opt(FN_STD_NAME, self.standard.name.as_deref());
        meta.put(FN_HAS_DAYLIGHT, self.daylight.is_some());
        if let Some(daylight) = &self.daylight {
            meta.put(FN_DAYLIGHT_OFFSET, daylight.offset.as_millis());
            meta.put(FN_STDTODAY_DTSTART, naive_to_string(daylight.onset));
            meta.put_opt(FN_STDTODAY_RULE, daylight.rule.as_ref().map(ToString::to_string));
            meta.put_opt(FN_DAYLIGHT_NAME, daylight.name.as_deref());
        }
        meta
    }

    /// ## Summary
    /// Rebuilds a custom zone from its persisted tags.
    ///
    /// A missing TZID decodes as the unknown-zone label and missing onsets
    /// default to the epoch.
    ///
    /// ## Errors
    /// Returns [`InviteError::MalformedTemporal`] if a stored onset or rule
    /// cannot be parsed.
    pub fn decode_metadata(meta: &Metadata) -> InviteResult<Self> {
        let side = |offset_key: &str,
                    onset_key: &str,
                    rule_key: &str,
                    name_key: &str|
         -> InviteResult<ZoneObservance> {
            Ok(ZoneObservance {
                offset: UtcOffset::from_millis(meta.get_long_or(offset_key, 0)),
                onset: meta
                    .get_str(onset_key)
                    .map(naive_from_str)
                    .transpose()?
                    .unwrap_or_else(epoch_onset),
                rule: meta.get_str(rule_key).map(parse_rrule).transpose()?,
                name: meta.get_str(name_key).map(str::to_string),
            })
        };
        let standard = side(FN_STD_OFFSET, FN_DAYTOSTD_DTSTART, FN_DAYTOSTD_RULE, FN_STD_NAME)?;
        let daylight = if meta.get_bool_or(FN_HAS_DAYLIGHT, false) {
            Some(side(
                FN_DAYLIGHT_OFFSET,
                FN_STDTODAY_DTSTART,
                FN_STDTODAY_RULE,
                FN_DAYLIGHT_NAME,
            )?)
        } else {
            None
        };
        Ok(Self {
            tzid: meta.get_str(FN_TZID).unwrap_or(UNKNOWN_TZID).to_string(),
            standard,
            daylight,
        })
    }
}

/// A zone definition: catalog zone or inline custom zone.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneDef {
    WellKnown { tzid: String, tz: Tz },
    Custom(CustomZone),
}

impl ZoneDef {
    /// Looks up `tzid` in the well-known catalog, canonicalizing if needed.
    #[must_use]
    pub fn well_known(tzid: &str) -> Option<Self> {
        well_known_zone(tzid).map(|tz| Self::WellKnown {
            tzid: tzid.to_string(),
            tz,
        })
    }

    #[must_use]
    pub fn tzid(&self) -> &str {
        match self {
            Self::WellKnown { tzid, .. } => tzid,
            Self::Custom(zone) => &zone.tzid,
        }
    }

    /// Normalized identifier used to detect renamed copies of a zone.
    #[must_use]
    pub fn canonical_id(&self) -> String {
        match self {
            Self::WellKnown { tz, .. } => canonical_tzid(tz.name()),
            Self::Custom(zone) => canonical_tzid(&zone.tzid),
        }
    }

    /// Whether both definitions describe the same rule set.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::WellKnown { tz: a, .. }, Self::WellKnown { tz: b, .. }) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a.same_rules(b),
            _ => false,
        }
    }

    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] if the local time cannot
    /// be placed in a well-known zone.
    pub fn to_utc(&self, local: NaiveDateTime) -> InviteResult<DateTime<Utc>> {
        match self {
            Self::WellKnown { tz, .. } => Ok(localize(local, *tz)?),
            Self::Custom(zone) => Ok(Utc.from_utc_datetime(&zone.to_vtimezone().to_utc(local))),
        }
    }

    #[must_use]
    pub fn from_utc(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::WellKnown { tz, .. } => instant.with_timezone(tz).naive_local(),
            Self::Custom(zone) => zone.to_vtimezone().from_utc(instant.naive_utc()),
        }
    }

    /// VTIMEZONE rendering; catalog zones are sampled from `year`.
    #[must_use]
    pub fn to_vtimezone(&self, year: i32) -> VTimezone {
        match self {
            Self::WellKnown { tzid, tz } => VTimezone::from_tz(*tz, tzid, year),
            Self::Custom(zone) => zone.to_vtimezone(),
        }
    }

    #[must_use]
    pub fn encode(&self) -> MetaValue {
        match self {
            Self::WellKnown { tzid, .. } => MetaValue::Str(tzid.clone()),
            Self::Custom(zone) => MetaValue::Map(zone.encode_metadata()),
        }
    }

    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] for a bare identifier
    /// missing from the catalog, or a decoding error for a custom zone.
    pub fn decode(value: &MetaValue) -> InviteResult<Self> {
        match value {
            MetaValue::Str(tzid) => Self::well_known(tzid)
                .ok_or_else(|| InviteError::UnresolvableReference(tzid.clone())),
            MetaValue::Map(meta) => Ok(Self::Custom(CustomZone::decode_metadata(meta)?)),
            MetaValue::Bool(_) | MetaValue::Long(_) => Err(InviteError::StructuralViolation(
                "time zone entry is neither an identifier nor a map".to_string(),
            )),
        }
    }
}

/// Zone definitions referenced by one invite.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeZoneRegistry {
    zones: BTreeMap<String, ZoneDef>,
    aliases: BTreeMap<String, String>,
    default_zone: Tz,
}

impl Default for TimeZoneRegistry {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl TimeZoneRegistry {
    /// Creates an empty registry. `default_zone` places floating and
    /// date-only values on the timeline.
    #[must_use]
    pub fn new(default_zone: Tz) -> Self {
        Self {
            zones: BTreeMap::new(),
            aliases: BTreeMap::new(),
            default_zone,
        }
    }

    #[must_use]
    pub const fn default_zone(&self) -> Tz {
        self.default_zone
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Real ids of the registered zones.
    pub fn tzids(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    #[must_use]
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// ## Summary
    /// Registers a zone under its own TZID.
    ///
    /// An equivalent zone already present under another id turns the new id
    /// into an alias of it. An existing entry with the same id is kept.
    pub fn add(&mut self, zone: ZoneDef) {
        let tzid = zone.tzid().to_string();
        if self.zones.contains_key(&tzid) || self.aliases.contains_key(&tzid) {
            return;
        }
        if let Some(existing) = self
            .zones
            .values()
            .find(|z| z.equivalent(&zone))
            .map(|z| z.tzid().to_string())
        {
            tracing::debug!(alias = %tzid, real = %existing, "Registering equivalent zone as alias");
            self.aliases.insert(tzid, existing);
            return;
        }
        self.zones.insert(tzid, zone);
    }

    pub fn add_alias(&mut self, alias: impl Into<String>, real: impl Into<String>) {
        let alias = alias.into();
        let real = real.into();
        if alias != real {
            self.aliases.insert(alias, real);
        }
    }

    #[must_use]
    pub fn get(&self, tzid: &str) -> Option<&ZoneDef> {
        self.zones
            .get(tzid)
            .or_else(|| self.zones.get(self.aliases.get(tzid)?))
    }

    #[must_use]
    pub fn contains(&self, tzid: &str) -> bool {
        self.get(tzid).is_some()
    }

    /// ## Summary
    /// Resolves a TZID, falling back to the well-known catalog.
    ///
    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] if neither the registry
    /// nor the catalog (after canonicalization) knows the id.
    pub fn resolve(&self, tzid: &str) -> InviteResult<ZoneDef> {
        if let Some(zone) = self.get(tzid) {
            return Ok(zone.clone());
        }
        ZoneDef::well_known(tzid).ok_or_else(|| {
            InviteError::UnresolvableReference(format!("no definition for time zone '{tzid}'"))
        })
    }

    /// Registers the catalog zone for `tzid` unless already known.
    ///
    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] for unknown ids.
    pub fn ensure(&mut self, tzid: &str) -> InviteResult<()> {
        if !self.contains(tzid) {
            let zone = self.resolve(tzid)?;
            self.add(zone);
        }
        Ok(())
    }

    /// ## Summary
    /// Places a value on the timeline.
    ///
    /// Floating and date-only values use the default zone.
    ///
    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] if the value's zone
    /// cannot be resolved.
    pub fn to_utc(&self, value: &CalDateTime) -> InviteResult<DateTime<Utc>> {
        match value {
            CalDateTime::Date(_) => Ok(localize(value.local(), self.default_zone)?),
            CalDateTime::DateTime { local, form } => match form {
                DateTimeForm::Utc => Ok(Utc.from_utc_datetime(local)),
                DateTimeForm::Floating => Ok(localize(*local, self.default_zone)?),
                DateTimeForm::Zoned { tzid } => self.resolve(tzid)?.to_utc(*local),
            },
        }
    }

    /// ## Summary
    /// Expresses an instant with the given zone form.
    ///
    /// ## Errors
    /// Returns [`InviteError::UnresolvableReference`] for an unknown TZID.
    pub fn express(&self, instant: DateTime<Utc>, form: &DateTimeForm) -> InviteResult<CalDateTime> {
        let local = match form {
            DateTimeForm::Utc => instant.naive_utc(),
            DateTimeForm::Floating => instant.with_timezone(&self.default_zone).naive_local(),
            DateTimeForm::Zoned { tzid } => self.resolve(tzid)?.from_utc(instant),
        };
        Ok(CalDateTime::DateTime {
            local,
            form: form.clone(),
        })
    }

    /// Adds every zone and alias of `other` not already present.
    pub fn merge(&mut self, other: &Self) {
        for zone in other.zones.values() {
            self.add(zone.clone());
        }
        for (alias, real) in &other.aliases {
            if !self.contains(alias) {
                self.add_alias(alias.clone(), real.clone());
            }
        }
    }

    /// ## Summary
    /// Drops zones and aliases not reachable from `referenced`.
    ///
    /// A referenced alias keeps its target zone.
    pub fn retain_referenced(&mut self, referenced: &BTreeSet<String>) {
        self.aliases.retain(|alias, _| referenced.contains(alias));
        let targets: BTreeSet<&String> = self.aliases.values().collect();
        let before = self.zones.len();
        let keep: BTreeSet<String> = self
            .zones
            .keys()
            .filter(|id| referenced.contains(*id) || targets.contains(id))
            .cloned()
            .collect();
        self.zones.retain(|id, _| keep.contains(id));
        if self.zones.len() != before {
            tracing::debug!(
                removed = before - self.zones.len(),
                "Pruned unreferenced time zones"
            );
        }
    }

    /// VTIMEZONE components for each referenced id that resolves, named by
    /// the id the invite uses.
    #[must_use]
    pub fn vtimezones(&self, referenced: &BTreeSet<String>, year: i32) -> Vec<Component> {
        referenced
            .iter()
            .filter_map(|tzid| match self.resolve(tzid) {
                Ok(zone) => {
                    let mut vtz = zone.to_vtimezone(year);
                    vtz.tzid.clone_from(tzid);
                    Some(vtz.to_component())
                }
                Err(err) => {
                    tracing::warn!(%tzid, error = %err, "Skipping VTIMEZONE for unresolvable zone");
                    None
                }
            })
            .collect()
    }

    /// ## Summary
    /// Persisted form: each distinct zone under `#{index}`, the id table
    /// under `ids` and the alias table under `al`, both mapping to indices.
    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        let mut ids = Metadata::new();
        let mut index_of = BTreeMap::new();
        for (i, (id, zone)) in self.zones.iter().enumerate() {
            meta.put(format!("#{i}"), zone.encode());
            ids.put(id.clone(), i);
            index_of.insert(id.as_str(), i);
        }
        let mut aliases = Metadata::new();
        for (alias, real) in &self.aliases {
            if let Some(i) = index_of.get(real.as_str()) {
                aliases.put(alias.clone(), *i);
            }
        }
        meta.put(FN_IDS, ids);
        if !aliases.is_empty() {
            meta.put(FN_ALIASES, aliases);
        }
        meta
    }

    /// ## Summary
    /// Rebuilds a registry in two passes: zones by index, then ids.
    ///
    /// A stored id whose canonical form differs from its zone's canonical id
    /// is promoted to an alias of that zone. Entries that cannot be decoded
    /// are skipped with a warning.
    #[must_use]
    pub fn decode_metadata(meta: &Metadata, default_zone: Tz) -> Self {
        let mut by_index: BTreeMap<i64, ZoneDef> = BTreeMap::new();
        for key in meta.keys() {
            let Some(index) = key.strip_prefix('#').and_then(|i| i.parse::<i64>().ok()) else {
                continue;
            };
            let Some(value) = meta.get(key) else {
                continue;
            };
            match ZoneDef::decode(value) {
                Ok(zone) => {
                    by_index.insert(index, zone);
                }
                Err(err) => tracing::warn!(index, error = %err, "Skipping undecodable time zone"),
            }
        }

        let mut registry = Self::new(default_zone);
        if let Some(ids) = meta.get_map(FN_IDS) {
            for id in ids.keys() {
                let Some(zone) = ids.get_long(id).and_then(|i| by_index.get(&i)) else {
                    continue;
                };
                if canonical_tzid(id) == zone.canonical_id() {
                    if id == zone.tzid() {
                        registry.zones.insert(id.to_string(), zone.clone());
                    } else {
                        let mut renamed = zone.clone();
                        rename(&mut renamed, id);
                        registry.zones.insert(id.to_string(), renamed);
                    }
                } else {
                    registry.zones.entry(zone.tzid().to_string()).or_insert_with(|| zone.clone());
                    registry.add_alias(id, zone.tzid());
                }
            }
        }
        if let Some(aliases) = meta.get_map(FN_ALIASES) {
            for alias in aliases.keys() {
                let Some(zone) = aliases.get_long(alias).and_then(|i| by_index.get(&i)) else {
                    continue;
                };
                let real = registry
                    .zones
                    .iter()
                    .find(|(_, z)| *z == zone)
                    .map(|(id, _)| id.clone())
                    .unwrap_or_else(|| zone.tzid().to_string());
                registry.zones.entry(real.clone()).or_insert_with(|| zone.clone());
                registry.add_alias(alias, real);
            }
        }
        registry
    }
}

fn rename(zone: &mut ZoneDef, id: &str) {
    match zone {
        ZoneDef::WellKnown { tzid, .. } => id.clone_into(tzid),
        ZoneDef::Custom(custom) => id.clone_into(&mut custom.tzid),
    }
}

#[cfg(test)]
#[path = "tzmap_tests.rs"]
mod tests;
