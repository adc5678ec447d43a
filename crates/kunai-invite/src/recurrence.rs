//! Recurrence trees attached to a series invite.
//!
//! A tree is DTSTART plus add rules (repeating patterns and explicit dates)
//! minus sub rules (explicit exclude dates). Repeating patterns on the sub
//! side are the deprecated EXRULE form: they are read and honored during
//! expansion but never written back.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use kunai_rfc::rfc::ical::core::{
    Component, DateTimeForm, Duration, Property, RRule, Value, prop,
};
use kunai_rfc::rfc::ical::expand::{ExpansionOptions, expand_rrule};
use kunai_rfc::rfc::ical::parse::{parse_duration, parse_rrule};

use crate::error::{InviteError, InviteResult};
use crate::metadata::Metadata;
use crate::temporal::{CalDateTime, RecurId};
use crate::tzmap::TimeZoneRegistry;

const FN_RULE_TYPE: &str = "t";
const FN_DTSTART: &str = "dts";
const FN_DURATION: &str = "dur";
const FN_DURATION_LEGACY: &str = "duration";
const FN_ADD_RULES: &str = "add";
const FN_SUB_RULES: &str = "sub";
const FN_NUM_RULES: &str = "nr";
const FN_RULE: &str = "r";
const FN_RECUR: &str = "recur";
const FN_EXCLUDE: &str = "exc";
const FN_NUM_DATES: &str = "nd";
const FN_DATE: &str = "d";
const FN_NUM_EXCEPTIONS: &str = "numEx";
const FN_EXCEPTION: &str = "ex";
const FN_CANCELLATION: &str = "ca";
const FN_RECURRENCE_ID: &str = "recurId";

const RULE_SIMPLE_REPEATING: i64 = 2;
const RULE_EXCEPTION: i64 = 3;
const RULE_RECURRENCE: i64 = 4;
const RULE_SINGLE_INSTANCE: i64 = 5;
const RULE_DATE_LIST: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateListKind {
    /// RDATE
    Add,
    /// EXDATE
    Exclude,
}

/// One entry on either side of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEntry {
    Repeating(RRule),
    Dates {
        kind: DateListKind,
        dates: Vec<CalDateTime>,
    },
}

impl RuleEntry {
    #[must_use]
    pub fn add_dates(dates: Vec<CalDateTime>) -> Self {
        Self::Dates {
            kind: DateListKind::Add,
            dates,
        }
    }

    #[must_use]
    pub fn exclude_dates(dates: Vec<CalDateTime>) -> Self {
        Self::Dates {
            kind: DateListKind::Exclude,
            dates,
        }
    }

    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Repeating(a), Self::Repeating(b)) => a.same_rule(b),
            (
                Self::Dates { kind: ka, dates: da },
                Self::Dates { kind: kb, dates: db },
            ) => {
                ka == kb
                    && da.iter().collect::<BTreeSet<_>>() == db.iter().collect::<BTreeSet<_>>()
            }
            _ => false,
        }
    }

    fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        match self {
            Self::Repeating(rule) => {
                meta.put(FN_RULE_TYPE, RULE_SIMPLE_REPEATING);
                meta.put(FN_RECUR, rule.to_string());
            }
            Self::Dates { kind, dates } => {
                meta.put(FN_RULE_TYPE, RULE_DATE_LIST);
                meta.put(FN_EXCLUDE, *kind == DateListKind::Exclude);
                meta.put_list(
                    FN_NUM_DATES,
                    FN_DATE,
                    dates.iter().map(CalDateTime::to_canonical),
                );
            }
        }
        meta
    }

    fn decode_metadata(meta: &Metadata) -> InviteResult<Self> {
        match meta.get_long(FN_RULE_TYPE) {
            Some(RULE_SIMPLE_REPEATING) => Ok(Self::Repeating(parse_rrule(
                meta.require_str(FN_RECUR)?,
            )?)),
            Some(RULE_DATE_LIST) => {
                let dates = meta
                    .string_list(FN_NUM_DATES, FN_DATE)
                    .iter()
                    .map(|raw| CalDateTime::parse_canonical(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                let kind = if meta.get_bool_or(FN_EXCLUDE, false) {
                    DateListKind::Exclude
                } else {
                    DateListKind::Add
                };
                Ok(Self::Dates { kind, dates })
            }
            Some(RULE_SINGLE_INSTANCE) => Ok(Self::add_dates(vec![CalDateTime::parse_canonical(
                meta.require_str(FN_DTSTART)?,
            )?])),
            other => Err(InviteError::StructuralViolation(format!(
                "unknown recurrence rule type {other:?}"
            ))),
        }
    }
}

/// A per-occurrence override recorded on the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub recur_id: RecurId,
    /// The occurrence was canceled rather than modified.
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceTree {
    pub dtstart: CalDateTime,
    pub duration: Option<Duration>,
    pub add: Vec<RuleEntry>,
    pub sub: Vec<RuleEntry>,
    pub overrides: Vec<Override>,
}

/// An expanded occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Start with the series' zone form.
    pub start: CalDateTime,
    pub instant: DateTime<Utc>,
}

impl RecurrenceTree {
    #[must_use]
    pub fn new(dtstart: CalDateTime, duration: Option<Duration>) -> Self {
        Self {
            dtstart,
            duration,
            add: Vec::new(),
            sub: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Tree with a single repeating rule.
    #[must_use]
    pub fn with_rule(dtstart: CalDateTime, duration: Option<Duration>, rule: RRule) -> Self {
        let mut tree = Self::new(dtstart, duration);
        tree.add.push(RuleEntry::Repeating(rule));
        tree
    }

    #[must_use]
    pub fn with_exclusions(mut self, dates: Vec<CalDateTime>) -> Self {
        self.sub.push(RuleEntry::exclude_dates(dates));
        self
    }

    /// Records a canceled occurrence.
    pub fn cancel_instance(&mut self, recur_id: RecurId) {
        self.overrides.retain(|o| o.recur_id != recur_id);
        self.overrides.push(Override {
            recur_id,
            canceled: true,
        });
    }

    /// ## Summary
    /// Dates removed from the series by its sub rules.
    ///
    /// Only explicit exclude dates count. Add-date entries found on the sub
    /// side are logged and ignored.
    #[must_use]
    pub fn excluded_instances(&self) -> Vec<CalDateTime> {
        let mut excluded = BTreeSet::new();
        for entry in &self.sub {
            match entry {
                RuleEntry::Dates {
                    kind: DateListKind::Exclude,
                    dates,
                } => excluded.extend(dates.iter().cloned()),
                RuleEntry::Dates {
                    kind: DateListKind::Add,
                    dates,
                } => {
                    tracing::debug!(count = dates.len(), "Ignoring add dates on the exclusion side");
                }
                RuleEntry::Repeating(_) => {}
            }
        }
        excluded.into_iter().collect()
    }

    /// Rule-semantic comparison of the add side, entry for entry in any
    /// order. The start is not compared.
    #[must_use]
    pub fn same_rules(&self, other: &Self) -> bool {
        if self.add.len() != other.add.len() {
            return false;
        }
        let mut unmatched: Vec<&RuleEntry> = other.add.iter().collect();
        self.add.iter().all(|a| {
            unmatched
                .iter()
                .position(|b| a.same_as(b))
                .map(|i| unmatched.swap_remove(i))
                .is_some()
        })
    }

    /// Zone ids referenced by any dated entry of the tree.
    #[must_use]
    pub fn referenced_tzids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        let dates = self
            .add
            .iter()
            .chain(&self.sub)
            .filter_map(|entry| match entry {
                RuleEntry::Dates { dates, .. } => Some(dates.iter()),
                RuleEntry::Repeating(_) => None,
            })
            .flatten()
            .chain(std::iter::once(&self.dtstart))
            .chain(self.overrides.iter().map(|o| &o.recur_id.dt));
        for dt in dates {
            if let Some(tzid) = dt.tzid() {
                ids.insert(tzid.to_string());
            }
        }
        ids
    }

    /// ## Summary
    /// Expands occurrences starting inside `[range_start, range_end)`.
    ///
    /// DTSTART always counts as an occurrence. Exclude dates, legacy
    /// exclude rules and canceled overrides remove occurrences.
    ///
    /// ## Errors
    /// Returns an error if a rule cannot be expanded or a zone cannot be
    /// resolved.
    #[tracing::instrument(skip(self, registry), fields(dtstart = %self.dtstart))]
    pub fn expand(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        registry: &TimeZoneRegistry,
        max_instances: usize,
    ) -> InviteResult<Vec<Occurrence>> {
        // rules expand on the series' wall clock
        let form = match &self.dtstart {
            CalDateTime::Date(_) => DateTimeForm::Floating,
            CalDateTime::DateTime { form, .. } => form.clone(),
        };
        let options = ExpansionOptions::with_range(
            registry.express(range_start, &form)?.local(),
            registry.express(range_end, &form)?.local(),
        )
        .with_max_instances(max_instances);
        let start_local = self.dtstart.local();

        let mut candidates = vec![self.dtstart.clone()];
        let mut excluded_local = BTreeSet::new();
        for entry in &self.add {
            match entry {
                RuleEntry::Repeating(rule) => {
                    for local in expand_rrule(rule, start_local, &options)? {
                        candidates.push(self.at_local(local));
                    }
                }
                RuleEntry::Dates {
                    kind: DateListKind::Add,
                    dates,
                } => candidates.extend(dates.iter().cloned()),
                RuleEntry::Dates { .. } => {
                    tracing::debug!("Ignoring exclude dates on the add side");
                }
            }
        }
        for entry in &self.sub {
            if let RuleEntry::Repeating(rule) = entry {
                excluded_local.extend(expand_rrule(rule, start_local, &options)?);
            }
        }

        let mut excluded_instants = BTreeSet::new();
        for dt in self.excluded_instances() {
            excluded_instants.insert(registry.to_utc(&dt)?);
        }
        for o in self.overrides.iter().filter(|o| o.canceled) {
            excluded_instants.insert(registry.to_utc(&o.recur_id.dt)?);
        }

        let mut seen = BTreeSet::new();
        let mut occurrences = Vec::new();
        for start in candidates {
            let instant = registry.to_utc(&start)?;
            if instant < range_start
                || instant >= range_end
                || excluded_local.contains(&start.local())
                || excluded_instants.contains(&instant)
                || !seen.insert(instant)
            {
                continue;
            }
            occurrences.push(Occurrence { start, instant });
        }
        occurrences.sort_by_key(|o| o.instant);
        occurrences.truncate(max_instances);
        Ok(occurrences)
    }

    fn at_local(&self, local: NaiveDateTime) -> CalDateTime {
        match &self.dtstart {
            CalDateTime::Date(_) => CalDateTime::Date(local.date()),
            CalDateTime::DateTime { form, .. } => CalDateTime::DateTime {
                local,
                form: form.clone(),
            },
        }
    }

    /// ## Summary
    /// RRULE, RDATE and EXDATE properties for output.
    ///
    /// Legacy exclude rules are never written.
    #[must_use]
    pub fn to_properties(&self, emit_rdates: bool) -> Vec<Property> {
        let mut props = Vec::new();
        for entry in &self.add {
            match entry {
                RuleEntry::Repeating(rule) => props.push(Property::recur(prop::RRULE, rule.clone())),
                RuleEntry::Dates {
                    kind: DateListKind::Add,
                    dates,
                } if emit_rdates => {
                    props.extend(dates.iter().map(|d| d.to_property(prop::RDATE)));
                }
                RuleEntry::Dates { .. } => {}
            }
        }
        for entry in &self.sub {
            match entry {
                RuleEntry::Dates {
                    kind: DateListKind::Exclude,
                    dates,
                } => props.extend(dates.iter().map(|d| d.to_property(prop::EXDATE))),
                RuleEntry::Repeating(_) => {
                    tracing::debug!("Not emitting legacy exclude rule");
                }
                RuleEntry::Dates { .. } => {}
            }
        }
        props
    }

    /// ## Summary
    /// Builds a tree from the RRULE, RDATE, EXDATE and EXRULE properties of
    /// a component. Returns `None` when the component has no add rules.
    #[must_use]
    pub fn from_component(
        comp: &Component,
        dtstart: &CalDateTime,
        duration: Option<Duration>,
    ) -> Option<Self> {
        let mut tree = Self::new(dtstart.clone(), duration);
        for property in &comp.properties {
            match property.name.as_str() {
                prop::RRULE => {
                    if let Some(rule) = property.value.as_recur() {
                        tree.add.push(RuleEntry::Repeating(rule.clone()));
                    }
                }
                prop::RDATE => tree.add.push(RuleEntry::add_dates(dates_of(property))),
                prop::EXDATE => tree.sub.push(RuleEntry::exclude_dates(dates_of(property))),
                prop::EXRULE => {
                    if let Some(rule) = property.value.as_recur() {
                        tracing::debug!("Reading legacy EXRULE");
                        tree.sub.push(RuleEntry::Repeating(rule.clone()));
                    }
                }
                _ => {}
            }
        }
        (!tree.add.is_empty()).then_some(tree)
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.put(FN_RULE_TYPE, RULE_RECURRENCE);
        meta.put(FN_DTSTART, self.dtstart.to_canonical());
        meta.put_opt(FN_DURATION, self.duration.map(|d| d.to_string()));
        meta.put(FN_ADD_RULES, encode_rules(&self.add));
        let sub: Vec<&RuleEntry> = self
            .sub
            .iter()
            .filter(|entry| {
                let keep = !matches!(entry, RuleEntry::Repeating(_));
                if !keep {
                    tracing::debug!("Skipping legacy exclude rule on encode");
                }
                keep
            })
            .collect();
        if !sub.is_empty() {
            meta.put(FN_SUB_RULES, encode_rules(sub));
        }
        if !self.overrides.is_empty() {
            meta.put(FN_NUM_EXCEPTIONS, self.overrides.len());
            for (i, o) in self.overrides.iter().enumerate() {
                let mut entry = Metadata::new();
                entry.put(FN_RECURRENCE_ID, o.recur_id.encode_metadata());
                if o.canceled {
                    meta.put(format!("{FN_CANCELLATION}{i}"), entry);
                } else {
                    entry.put(FN_RULE_TYPE, RULE_EXCEPTION);
                    meta.put(format!("{FN_EXCEPTION}{i}"), entry);
                }
            }
        }
        meta
    }

    /// ## Errors
    /// Returns an error if DTSTART, a duration, a rule or a date does not
    /// parse, or a rule type is unknown.
    pub fn decode_metadata(meta: &Metadata) -> InviteResult<Self> {
        let dtstart = CalDateTime::parse_canonical(meta.require_str(FN_DTSTART)?)?;
        let duration = meta
            .get_str(FN_DURATION)
            .or_else(|| meta.get_str(FN_DURATION_LEGACY))
            .map(parse_duration)
            .transpose()?;
        let mut tree = Self::new(dtstart, duration);
        if let Some(add) = meta.get_map(FN_ADD_RULES) {
            tree.add = decode_rules(add)?;
        }
        if let Some(sub) = meta.get_map(FN_SUB_RULES) {
            tree.sub = decode_rules(sub)?;
        }
        let count = meta.get_long_or(FN_NUM_EXCEPTIONS, 0).max(0);
        for i in 0..count {
            let (entry, canceled) = match (
                meta.get_map(&format!("{FN_CANCELLATION}{i}")),
                meta.get_map(&format!("{FN_EXCEPTION}{i}")),
            ) {
                (Some(entry), _) => (entry, true),
                (None, Some(entry)) => (entry, false),
                (None, None) => continue,
            };
            let Some(rid) = entry.get_map(FN_RECURRENCE_ID) else {
                tracing::warn!(index = i, "Recurrence override without a recurrence id");
                continue;
            };
            tree.overrides.push(Override {
                recur_id: RecurId::decode_metadata(rid)?,
                canceled,
            });
        }
        Ok(tree)
    }
}

fn encode_rules<'a>(rules: impl IntoIterator<Item = &'a RuleEntry>) -> Metadata {
    let mut meta = Metadata::new();
    let mut count = 0_usize;
    for (i, rule) in rules.into_iter().enumerate() {
        meta.put(format!("{FN_RULE}{i}"), rule.encode_metadata());
        count = i + 1;
    }
    meta.put(FN_NUM_RULES, count);
    meta
}

fn decode_rules(meta: &Metadata) -> InviteResult<Vec<RuleEntry>> {
    meta.map_list(FN_NUM_RULES, FN_RULE)
        .into_iter()
        .map(RuleEntry::decode_metadata)
        .collect()
}

/// Every date carried by an RDATE or EXDATE property.
fn dates_of(property: &Property) -> Vec<CalDateTime> {
    match &property.value {
        Value::DateList(list) => list
            .iter()
            .filter_map(|d| d.to_naive().map(CalDateTime::Date))
            .collect(),
        Value::DateTimeList(list) => list.iter().filter_map(CalDateTime::from_ical).collect(),
        Value::PeriodList(list) => list
            .iter()
            .filter_map(|p| CalDateTime::from_ical(p.start()))
            .collect(),
        Value::Period(p) => CalDateTime::from_ical(p.start()).into_iter().collect(),
        _ => CalDateTime::from_property(property).into_iter().collect(),
    }
}

#[cfg(test)]
#[path = "recurrence_tests.rs"]
mod tests;
