//! iCalendar serializer (RFC 5545).
//!
//! Output is deterministic: properties, parameters and child components are
//! emitted in a canonical order so equal trees render to equal bytes.

use super::escape::{escape_param_value, escape_text};
use super::fold::fold_line;
use crate::rfc::ical::core::{Component, ComponentKind, ICalendar, Parameter, Property, Value};

/// Renders a whole calendar, CRLF-terminated.
#[must_use]
pub fn serialize(ical: &ICalendar) -> String {
    serialize_component(&ical.root)
}

/// Renders a component and its children.
#[must_use]
pub fn serialize_component(component: &Component) -> String {
    let mut result = String::new();
    result.push_str(&content_line(&format!("BEGIN:{}", component.name)));

    for prop in canonical_property_order(&component.properties, component.kind) {
        result.push_str(&serialize_property(prop));
    }
    for child in canonical_component_order(&component.children) {
        result.push_str(&serialize_component(child));
    }

    result.push_str(&content_line(&format!("END:{}", component.name)));
    result
}

/// Renders one property as a folded, CRLF-terminated content line.
#[must_use]
pub fn serialize_property(prop: &Property) -> String {
    let mut line = prop.name.clone();
    for param in canonical_param_order(&prop.params) {
        line.push(';');
        line.push_str(&param.name);
        line.push('=');
        let values: Vec<String> = param.values.iter().map(|v| escape_param_value(v)).collect();
        line.push_str(&values.join(","));
    }
    line.push(':');
    line.push_str(&serialize_value(&prop.value));
    content_line(&line)
}

fn content_line(line: &str) -> String {
    let mut folded = fold_line(line);
    folded.push_str("\r\n");
    folded
}

/// Text is escaped here; every other type renders its own wire form.
fn serialize_value(value: &Value) -> String {
    match value {
        Value::Text(s) => escape_text(s),
        Value::TextList(list) => list
            .iter()
            .map(|s| escape_text(s))
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn property_order(kind: ComponentKind) -> &'static [&'static str] {
    match kind {
        ComponentKind::Calendar => &["VERSION", "PRODID", "CALSCALE", "METHOD"],
        ComponentKind::Event | ComponentKind::Todo => &[
            "UID",
            "RECURRENCE-ID",
            "DTSTAMP",
            "SEQUENCE",
            "DTSTART",
            "DTEND",
            "DUE",
            "DURATION",
            "RRULE",
            "RDATE",
            "EXDATE",
            "SUMMARY",
            "DESCRIPTION",
            "LOCATION",
            "GEO",
            "CLASS",
            "STATUS",
            "TRANSP",
            "PRIORITY",
            "PERCENT-COMPLETE",
            "COMPLETED",
            "ORGANIZER",
            "ATTENDEE",
            "CATEGORIES",
            "COMMENT",
            "CONTACT",
            "URL",
            "LAST-MODIFIED",
        ],
        ComponentKind::Timezone => &["TZID", "LAST-MODIFIED", "TZURL"],
        ComponentKind::Standard | ComponentKind::Daylight => &[
            "DTSTART",
            "TZOFFSETFROM",
            "TZOFFSETTO",
            "RRULE",
            "RDATE",
            "TZNAME",
        ],
        ComponentKind::Alarm => &[
            "ACTION",
            "TRIGGER",
            "DURATION",
            "REPEAT",
            "DESCRIPTION",
            "SUMMARY",
            "ATTENDEE",
            "ATTACH",
        ],
        ComponentKind::Unknown => &[],
    }
}

/// Known properties in table order, then the rest (X- included) as given.
fn canonical_property_order(props: &[Property], kind: ComponentKind) -> Vec<&Property> {
    let order = property_order(kind);
    let mut ordered: Vec<&Property> = Vec::with_capacity(props.len());
    for &name in order {
        ordered.extend(props.iter().filter(|p| p.name.eq_ignore_ascii_case(name)));
    }
    ordered.extend(
        props
            .iter()
            .filter(|p| !order.iter().any(|n| p.name.eq_ignore_ascii_case(n))),
    );
    ordered
}

const PARAM_ORDER: &[&str] = &[
    "VALUE",
    "TZID",
    "FMTTYPE",
    "LANGUAGE",
    "CN",
    "DIR",
    "CUTYPE",
    "ROLE",
    "PARTSTAT",
    "RSVP",
    "DELEGATED-FROM",
    "DELEGATED-TO",
    "SENT-BY",
    "MEMBER",
    "RELATED",
    "RANGE",
];

fn canonical_param_order(params: &[Parameter]) -> Vec<&Parameter> {
    let mut ordered: Vec<&Parameter> = Vec::with_capacity(params.len());
    for name in PARAM_ORDER {
        ordered.extend(params.iter().filter(|p| p.name.eq_ignore_ascii_case(name)));
    }
    ordered.extend(
        params
            .iter()
            .filter(|p| !PARAM_ORDER.iter().any(|n| p.name.eq_ignore_ascii_case(n))),
    );
    ordered
}

/// VTIMEZONEs first, then schedulable components by UID and RECURRENCE-ID
/// (the series before its exceptions), then everything else as given.
fn canonical_component_order(children: &[Component]) -> Vec<&Component> {
    let mut timezones = Vec::new();
    let mut schedulable = Vec::new();
    let mut other = Vec::new();
    for child in children {
        match child.kind {
            ComponentKind::Timezone => timezones.push(child),
            ComponentKind::Event | ComponentKind::Todo => schedulable.push(child),
            _ => other.push(child),
        }
    }
    schedulable.sort_by(|a, b| {
        let key_a = (a.uid().unwrap_or_default(), recurrence_key(a));
        let key_b = (b.uid().unwrap_or_default(), recurrence_key(b));
        key_a.cmp(&key_b)
    });

    let mut result = Vec::with_capacity(children.len());
    result.extend(timezones);
    result.extend(schedulable);
    result.extend(other);
    result
}

fn recurrence_key(component: &Component) -> String {
    component
        .get_property("RECURRENCE-ID")
        .map(|p| p.value.to_string())
        .unwrap_or_default()
}
