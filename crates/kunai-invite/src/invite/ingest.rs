//! Builds invites from parsed calendar components.

use chrono::{DateTime, Utc};
use kunai_core::constants::{X_ALT_DESC, X_LOCAL_ONLY, X_MS_ALLDAY, X_MS_INTENDED_STATUS};
use kunai_rfc::rfc::ical::core::{
    Component, ComponentKind, ICalendar, Property, Value, param, prop,
};
use kunai_rfc::rfc::ical::expand::VTimezone;

use super::{
    Class, FreeBusy, Geo, Invite, InviteFlags, ItemType, Method, SanitizeMode, Status, Transparency,
};
use crate::account::Account;
use crate::alarm::Alarm;
use crate::error::{InviteError, InviteResult};
use crate::matcher::account_is_organizer;
use crate::participant::{Attendee, Organizer};
use crate::recurrence::RecurrenceTree;
use crate::settings::EngineSettings;
use crate::temporal::{CalDateTime, RecurId};
use crate::tzmap::{CustomZone, TimeZoneRegistry, ZoneDef};

/// Characters of the plain description kept as the preview fragment.
const FRAGMENT_LENGTH: usize = 100;

fn text_flag(property: &Property) -> bool {
    match &property.value {
        Value::Boolean(b) => *b,
        other => other.to_string().trim().eq_ignore_ascii_case("TRUE"),
    }
}

fn parse_intended_status(s: &str) -> Option<FreeBusy> {
    match s.trim().to_ascii_uppercase().as_str() {
        "FREE" => Some(FreeBusy::Free),
        "BUSY" => Some(FreeBusy::Busy),
        "TENTATIVE" => Some(FreeBusy::Tentative),
        "OOF" => Some(FreeBusy::OutOfOffice),
        _ => None,
    }
}

impl Invite {
    /// ## Summary
    /// Reads a VEVENT or VTODO. The result is not sanitized.
    ///
    /// ## Errors
    /// Returns [`InviteError::StructuralViolation`] for other component
    /// kinds or malformed alarms, and resolution errors for UTC-only values
    /// in unknown zones.
    pub fn from_component(
        comp: &Component,
        method: Method,
        registry: &TimeZoneRegistry,
    ) -> InviteResult<Self> {
        let item_type = match comp.kind {
            ComponentKind::Event => ItemType::Event,
            ComponentKind::Todo => ItemType::Task,
            _ => {
                return Err(InviteError::StructuralViolation(format!(
                    "cannot build an invite from {}",
                    comp.name
                )));
            }
        };
        let mut inv = Self::with_uid(item_type, comp.uid().unwrap_or_default());
        inv.method = method;
        inv.tz_map = registry.clone();

        let mut plain = None;
        let mut html = None;
        let mut recur_id = None;
        for property in &comp.properties {
            match property.name.as_str() {
                prop::SEQUENCE => inv.sequence = property.as_integer().unwrap_or_default(),
                prop::DTSTAMP => {
                    if let Some(dtstamp) = instant_of(property, registry)? {
                        inv.set_dtstamp(dtstamp);
                    }
                }
                prop::LAST_MODIFIED => inv.last_modified = instant_of(property, registry)?,
                prop::COMPLETED => inv.completed = instant_of(property, registry)?,
                prop::STATUS => {
                    if let Some(status) = property.as_text().and_then(Status::parse) {
                        inv.status = status;
                    }
                }
                prop::CLASS => {
                    if let Some(class) = property.as_text().and_then(Class::parse) {
                        inv.class = class;
                    }
                }
                prop::TRANSP => {
                    if let Some(transp) = property.as_text().and_then(Transparency::parse) {
                        inv.transparency = transp;
                    }
                }
                X_MS_INTENDED_STATUS => {
                    inv.free_busy = property.as_text().and_then(parse_intended_status);
                }
                X_MS_ALLDAY => inv.set_all_day(text_flag(property)),
                X_LOCAL_ONLY => inv.set_local_only(text_flag(property)),
                prop::DTSTART => inv.start = CalDateTime::from_property(property),
                prop::DTEND | prop::DUE => inv.end = CalDateTime::from_property(property),
                prop::DURATION => inv.duration = property.value.as_duration().copied(),
                prop::SUMMARY => inv.name = property.as_text().unwrap_or_default().to_string(),
                prop::DESCRIPTION => plain = property.as_text().map(str::to_string),
                X_ALT_DESC => {
                    let is_html = property
                        .get_param_value(param::FMTTYPE)
                        .is_some_and(|f| f.eq_ignore_ascii_case("text/html"));
                    if is_html {
                        html = property.as_text().map(str::to_string);
                    }
                }
                prop::LOCATION => inv.location = property.as_text().unwrap_or_default().to_string(),
                prop::ORGANIZER => inv.organizer = Some(Organizer::from_property(property)),
                prop::ATTENDEE => inv.attendees.push(Attendee::from_property(property)),
                prop::RECURRENCE_ID => recur_id = RecurId::from_property(property),
                prop::PRIORITY => inv.priority = property.as_integer(),
                prop::PERCENT_COMPLETE => inv.percent_complete = property.as_integer(),
                prop::CATEGORIES => match &property.value {
                    Value::TextList(list) => inv.categories.extend(list.iter().cloned()),
                    other => inv.categories.push(other.to_string()),
                },
                prop::COMMENT => inv.comments.push(property.value.to_string()),
                prop::CONTACT => inv.contacts.push(property.value.to_string()),
                prop::GEO => inv.geo = Geo::parse(&property.value.to_string()),
                prop::URL => inv.url = property.value.as_uri().map(str::to_string),
                prop::ATTACH => inv.flags.set(InviteFlags::HAS_ATTACHMENT, true),
                name if name.starts_with("X-") => inv.x_props.push(property.clone()),
                _ => {}
            }
        }

        let fragment: String = plain
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(FRAGMENT_LENGTH)
            .collect();
        inv.fragment = fragment.trim().to_string();
        inv.set_description(plain, html);

        if let Some(start) = inv.start.clone() {
            inv.set_recurrence(RecurrenceTree::from_component(comp, &start, inv.duration));
        }
        if recur_id.is_some() {
            inv.set_recur_id(recur_id);
        }

        for child in comp.children_of_kind(ComponentKind::Alarm) {
            if let Some(alarm) = Alarm::from_component(child)? {
                inv.alarms.push(alarm);
            }
        }
        Ok(inv)
    }
}

/// A DATE-TIME property as an instant.
fn instant_of(property: &Property, registry: &TimeZoneRegistry) -> InviteResult<Option<DateTime<Utc>>> {
    CalDateTime::from_property(property)
        .map(|dt| registry.to_utc(&dt))
        .transpose()
}

/// ## Summary
/// Collects the VTIMEZONEs of a calendar into a registry.
///
/// Catalog ids register as well-known zones; other definitions register as
/// custom zones. Definitions that cannot be interpreted are skipped with a
/// warning.
#[must_use]
pub fn registry_from_calendar(ical: &ICalendar, settings: &EngineSettings) -> TimeZoneRegistry {
    let mut registry = TimeZoneRegistry::new(settings.default_timezone);
    for comp in ical.timezones() {
        match VTimezone::parse(comp) {
            Ok(vtz) => match ZoneDef::well_known(&vtz.tzid) {
                Some(zone) => registry.add(zone),
                None => registry.add(ZoneDef::Custom(CustomZone::from_vtimezone(&vtz))),
            },
            Err(err) => tracing::warn!(error = %err, "Skipping unusable VTIMEZONE"),
        }
    }
    registry
}

/// ## Summary
/// Turns every VEVENT and VTODO of a calendar into a sanitized invite.
///
/// All invites share the calendar's zone definitions, each pruned to what it
/// references. `owner` is the account the calendar is delivered to and
/// decides organizer status.
///
/// ## Errors
/// Propagates component and sanitize errors; see [`Invite::from_component`]
/// and [`Invite::sanitize`].
#[tracing::instrument(skip_all)]
pub fn invites_from_calendar(
    ical: &ICalendar,
    settings: &EngineSettings,
    owner: Option<&Account>,
    mode: SanitizeMode,
) -> InviteResult<Vec<Invite>> {
    let method = ical.method().map_or(Method::Publish, Method::lookup);
    let registry = registry_from_calendar(ical, settings);
    let mut invites = Vec::new();
    for (num, comp) in ical.schedulable().into_iter().enumerate() {
        let mut inv = Invite::from_component(comp, method, &registry)?;
        inv.item.component_num = i32::try_from(num).unwrap_or_default();
        inv.is_organizer = account_is_organizer(&inv, owner);
        let repairs = inv.sanitize(mode)?;
        tracing::debug!(uid = %inv.uid, repairs = repairs.len(), "Ingested invite");
        invites.push(inv);
    }
    Ok(invites)
}
