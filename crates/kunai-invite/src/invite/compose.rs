//! Calendar-object output.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Utc};
use kunai_core::constants::{
    PRODID, X_ALT_DESC, X_LOCAL_ONLY, X_MS_ALLDAY, X_MS_INTENDED_STATUS, X_MS_SENDER,
};
use kunai_rfc::rfc::ical::core::{
    Component, ComponentKind, DateTime as ICalDateTime, DateTimeForm, ICalendar, Parameter,
    Property, Value, param, prop,
};

use super::{FreeBusy, Invite, Method};
use crate::participant::MAILTO;
use crate::settings::EngineSettings;
use crate::temporal::RecurId;
use crate::tzmap::TimeZoneRegistry;

/// How an invite is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Render private fields even for non-public invites.
    pub include_private: bool,
    pub emit_rdates: bool,
    /// Fold canceled exceptions into EXDATEs on their series.
    pub convert_canceled_instances_to_exdates: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            include_private: true,
            emit_rdates: true,
            convert_canceled_instances_to_exdates: false,
        }
    }
}

impl From<&EngineSettings> for ComposeOptions {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            include_private: true,
            emit_rdates: settings.emit_rdates,
            convert_canceled_instances_to_exdates: settings.convert_canceled_instances_to_exdates,
        }
    }
}

fn utc_property(name: &str, dt: DateTime<Utc>) -> Property {
    Property::datetime(name, ICalDateTime::from_naive(dt.naive_utc(), DateTimeForm::Utc))
}

const fn intended_status(free_busy: Option<FreeBusy>) -> &'static str {
    match free_busy {
        Some(FreeBusy::Free) => "FREE",
        Some(FreeBusy::Tentative) => "TENTATIVE",
        Some(FreeBusy::OutOfOffice) => "OOF",
        Some(FreeBusy::Busy) | None => "BUSY",
    }
}

impl Invite {
    /// ## Summary
    /// Renders the invite as a VEVENT or VTODO.
    ///
    /// Private fields appear only when `options.include_private` is set or
    /// the invite is public. The description is rendered only if it is
    /// already in memory.
    #[must_use]
    pub fn to_component(&self, options: &ComposeOptions) -> Component {
        let kind = if self.is_task() {
            ComponentKind::Todo
        } else {
            ComponentKind::Event
        };
        let mut comp = Component::new(kind);
        comp.add_property(Property::text(prop::UID, self.uid.as_str()));

        if let Some(recurrence) = self.recurrence() {
            for property in recurrence.to_properties(options.emit_rdates) {
                comp.add_property(property);
            }
        }

        if options.include_private || self.is_public() {
            self.add_private_properties(&mut comp);
        }

        if let Some(organizer) = &self.organizer {
            comp.add_property(organizer.to_property());
            if let Some(sent_by) = organizer.user.sent_by.as_deref().filter(|s| !s.is_empty())
                && !matches!(self.method, Method::Reply | Method::Counter)
            {
                comp.add_property(Property::cal_address(X_MS_SENDER, format!("{MAILTO}{sent_by}")));
            }
        }

        if let Some(start) = &self.start {
            comp.add_property(start.to_property(prop::DTSTART));
        }
        if let Some(end) = &self.end {
            let name = if self.is_task() { prop::DUE } else { prop::DTEND };
            comp.add_property(end.to_property(name));
        }
        if let Some(duration) = self.duration {
            comp.add_property(Property::duration(prop::DURATION, duration));
        }
        comp.add_property(Property::text(prop::STATUS, self.status.as_str()));
        comp.add_property(Property::text(prop::CLASS, self.class.as_str()));

        if self.is_event() {
            let all_day = if self.is_all_day() { "TRUE" } else { "FALSE" };
            comp.add_property(Property::text(X_MS_ALLDAY, all_day));
            if matches!(self.method, Method::Request | Method::Publish | Method::Cancel) {
                comp.add_property(Property::text(
                    X_MS_INTENDED_STATUS,
                    intended_status(self.free_busy),
                ));
            }
            comp.add_property(Property::text(prop::TRANSP, self.transparency.as_str()));
        }

        if let Some(recur_id) = self.recur_id() {
            comp.add_property(recur_id.to_property());
        }
        if let Some(last_modified) = self.last_modified {
            comp.add_property(utc_property(prop::LAST_MODIFIED, last_modified));
        }
        comp.add_property(utc_property(prop::DTSTAMP, self.dtstamp()));
        comp.add_property(Property::integer(prop::SEQUENCE, self.sequence));
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            comp.add_property(Property::new(prop::URL, Value::Uri(url.to_string())));
        }
        if self.is_local_only() {
            comp.add_property(Property::new(X_LOCAL_ONLY, Value::Boolean(true)));
        }
        comp
    }

    fn add_private_properties(&self, comp: &mut Component) {
        if !self.name.is_empty() {
            comp.add_property(Property::text(prop::SUMMARY, self.name.as_str()));
        }
        if let Some(description) = self.description.peek() {
            if let Some(plain) = description.plain.filter(|d| !d.is_empty()) {
                comp.add_property(Property::text(prop::DESCRIPTION, plain));
            }
            if let Some(html) = description.html.filter(|d| !d.is_empty()) {
                comp.add_property(
                    Property::text(X_ALT_DESC, html).with_param(Parameter::new(param::FMTTYPE, "text/html")),
                );
            }
        }
        for comment in &self.comments {
            comp.add_property(Property::text(prop::COMMENT, comment.as_str()));
        }
        if !self.location.is_empty() {
            comp.add_property(Property::text(prop::LOCATION, self.location.as_str()));
        }
        for attendee in &self.attendees {
            comp.add_property(attendee.to_property());
        }
        if let Some(priority) = self.priority {
            comp.add_property(Property::integer(prop::PRIORITY, priority));
        }
        if self.is_task() {
            if let Some(percent) = self.percent_complete {
                comp.add_property(Property::integer(prop::PERCENT_COMPLETE, percent));
            }
            if let Some(completed) = self.completed {
                comp.add_property(utc_property(prop::COMPLETED, completed));
            }
        }
        if !self.categories.is_empty() {
            comp.add_property(Property::new(
                prop::CATEGORIES,
                Value::TextList(self.categories.clone()),
            ));
        }
        for contact in &self.contacts {
            comp.add_property(Property::text(prop::CONTACT, contact.as_str()));
        }
        if let Some(geo) = &self.geo {
            comp.add_property(Property::new(prop::GEO, Value::Unknown(geo.to_ical())));
        }
        for alarm in &self.alarms {
            comp.add_child(alarm.to_component());
        }
        for x_prop in &self.x_props {
            comp.add_property(x_prop.clone());
        }
    }
}

/// ## Summary
/// Wraps invites of one or more lineages into a VCALENDAR with METHOD and
/// the VTIMEZONEs they reference.
///
/// With `convert_canceled_instances_to_exdates`, canceled exceptions whose
/// series is among `invites` become EXDATEs on the series instead of
/// components of their own.
#[must_use]
#[tracing::instrument(skip(invites, options), fields(count = invites.len()))]
pub fn compose_calendar(invites: &[Invite], method: Method, options: &ComposeOptions) -> ICalendar {
    let mut ical = ICalendar::new(PRODID);
    ical.set_method(method.as_str());

    let series_uids: BTreeSet<&str> = invites
        .iter()
        .filter(|inv| inv.is_recurrence())
        .map(|inv| inv.uid.as_str())
        .collect();
    let mut folded: BTreeMap<&str, Vec<&RecurId>> = BTreeMap::new();
    if options.convert_canceled_instances_to_exdates {
        for inv in invites {
            if let Some(rid) = inv.recur_id()
                && inv.is_cancel()
                && series_uids.contains(inv.uid.as_str())
            {
                folded.entry(inv.uid.as_str()).or_default().push(rid);
            }
        }
    }

    let mut registry = invites
        .first()
        .map_or_else(TimeZoneRegistry::default, |inv| {
            TimeZoneRegistry::new(inv.tz_map.default_zone())
        });
    let mut referenced = BTreeSet::new();
    let mut components = Vec::new();
    for inv in invites {
        if inv.recur_id().is_some()
            && folded
                .get(inv.uid.as_str())
                .is_some_and(|rids| rids.iter().any(|r| Some(*r) == inv.recur_id()))
        {
            continue;
        }
        registry.merge(&inv.tz_map);
        referenced.extend(inv.referenced_tzids());
        let mut comp = inv.to_component(options);
        if inv.is_recurrence()
            && let Some(rids) = folded.get(inv.uid.as_str())
        {
            for rid in rids {
                comp.add_property(rid.dt.to_property(prop::EXDATE));
            }
        }
        components.push(comp);
    }

    let year = invites
        .iter()
        .find_map(|inv| inv.start.as_ref())
        .map_or_else(|| Utc::now().year(), |start| start.date_part().year());
    for vtz in registry.vtimezones(&referenced, year) {
        ical.add_component(vtz);
    }
    for comp in components {
        ical.add_component(comp);
    }
    ical
}
