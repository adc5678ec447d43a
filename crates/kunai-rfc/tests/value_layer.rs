//! Grammar events in, typed components and folded text out.

use chrono::{NaiveDate, NaiveDateTime};
use kunai_rfc::rfc::ical::build::serialize;
use kunai_rfc::rfc::ical::core::{ComponentKind, ICalendar, UtcOffset, Value, prop};
use kunai_rfc::rfc::ical::expand::{ExpansionOptions, VTimezone, expand_rrule};
use kunai_rfc::rfc::ical::parse::{ComponentBuilder, ContentHandler, ParseErrorKind};

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, d)
        .and_then(|d| d.and_hms_opt(h, 0, 0))
        .expect("valid date-time")
}

fn feed(builder: &mut ComponentBuilder, lines: &[&str]) {
    for line in lines {
        let (head, value) = line.split_once(':').expect("content line");
        match head {
            "BEGIN" => builder.start_component(value).expect("begin"),
            "END" => builder.end_component(value).expect("end"),
            _ => {
                let mut parts = head.split(';');
                builder
                    .start_property(parts.next().expect("name"))
                    .expect("property");
                for param in parts {
                    let (name, v) = param.split_once('=').expect("parameter");
                    builder.parameter(name, v).expect("parameter");
                }
                builder.property_value(value).expect("value");
                builder.end_property().expect("end property");
            }
        }
    }
}

fn calendar() -> ICalendar {
    let mut builder = ComponentBuilder::new();
    feed(
        &mut builder,
        &[
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "PRODID:-//Test//Test//EN",
            "METHOD:REQUEST",
            "BEGIN:VTIMEZONE",
            "TZID:Gulf",
            "BEGIN:STANDARD",
            "DTSTART:19700101T000000",
            "TZOFFSETFROM:+0300",
            "TZOFFSETTO:+0300",
            "TZNAME:GST",
            "END:STANDARD",
            "END:VTIMEZONE",
            "BEGIN:VEVENT",
            "UID:abc-123",
            "DTSTAMP:20240601T080000Z",
            "DTSTART;TZID=Gulf:20240601T090000",
            "DURATION:PT1H",
            "RRULE:FREQ=DAILY;COUNT=3",
            "SUMMARY:Planning\\, round two",
            "SEQUENCE:2",
            "END:VEVENT",
            "END:VCALENDAR",
        ],
    );
    builder.finish_calendar().expect("calendar")
}

#[test_log::test]
fn builder_types_values_by_property() {
    let cal = calendar();
    assert_eq!(cal.method(), Some("REQUEST"));
    assert_eq!(cal.timezones().len(), 1);

    let events = cal.schedulable();
    assert_eq!(events.len(), 1);
    let event = events[0];
    assert_eq!(event.kind, ComponentKind::Event);
    assert_eq!(event.uid(), Some("abc-123"));
    assert_eq!(event.text_of(prop::SUMMARY), Some("Planning, round two"));

    let start = event
        .get_property(prop::DTSTART)
        .and_then(|p| p.value.as_datetime())
        .expect("start");
    assert_eq!(start.tzid(), Some("Gulf"));
    assert_eq!(start.to_naive(), Some(at(1, 9)));

    let sequence = event.get_property(prop::SEQUENCE).map(|p| &p.value);
    assert!(matches!(sequence, Some(Value::Integer(2))));
    assert!(
        event
            .get_property(prop::RRULE)
            .and_then(|p| p.value.as_recur())
            .is_some()
    );
}

#[test_log::test]
fn custom_zone_converts_wall_clock() {
    let cal = calendar();
    let zone = VTimezone::parse(cal.timezones()[0]).expect("zone");
    tracing::debug!(tzid = %zone.tzid, "Parsed custom zone");

    assert_eq!(zone.offset_at(at(1, 9)), UtcOffset::from_hours_minutes(3, 0));
    assert_eq!(zone.to_utc(at(1, 9)), at(1, 6));
    assert_eq!(zone.from_utc(at(1, 6)), at(1, 9));
}

#[test_log::test]
fn daily_rule_expands_on_the_wall_clock() {
    let cal = calendar();
    let event = cal.schedulable()[0];
    let rule = event
        .get_property(prop::RRULE)
        .and_then(|p| p.value.as_recur())
        .expect("rule");

    let all = expand_rrule(rule, at(1, 9), &ExpansionOptions::default()).expect("expand");
    assert_eq!(all, vec![at(1, 9), at(2, 9), at(3, 9)]);

    let capped = expand_rrule(
        rule,
        at(1, 9),
        &ExpansionOptions::default().with_max_instances(2),
    )
    .expect("expand");
    assert_eq!(capped.len(), 2);
}

#[test_log::test]
fn serialization_is_stable() {
    let text = serialize(&calendar());
    tracing::debug!(%text, "Rendered calendar");

    assert!(text.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(text.ends_with("END:VCALENDAR\r\n"));
    assert!(text.contains("DTSTART;TZID=Gulf:20240601T090000\r\n"));
    assert!(text.contains("SUMMARY:Planning\\, round two\r\n"));
    assert!(text.find("BEGIN:VTIMEZONE") < text.find("BEGIN:VEVENT"));
    assert!(text.find("UID:abc-123") < text.find("DTSTART"));

    assert_eq!(text, serialize(&calendar()));
}

#[test_log::test]
fn long_lines_are_folded() {
    let mut builder = ComponentBuilder::new();
    let summary = format!("SUMMARY:{}", "x".repeat(120));
    feed(
        &mut builder,
        &["BEGIN:VCALENDAR", "BEGIN:VEVENT", &summary, "END:VEVENT", "END:VCALENDAR"],
    );
    let text = serialize(&builder.finish_calendar().expect("calendar"));

    assert!(text.contains("\r\n x"));
    assert!(text.split("\r\n").all(|line| line.len() <= 75));
}

#[test]
fn mismatched_end_is_rejected() {
    let mut builder = ComponentBuilder::new();
    builder.start_component("VCALENDAR").expect("begin");
    builder.start_component("VEVENT").expect("begin");
    let err = builder.end_component("VTODO").expect_err("mismatch");
    assert_eq!(err.kind, ParseErrorKind::MismatchedComponent);
}

#[test]
fn unclosed_calendar_is_rejected() {
    let mut builder = ComponentBuilder::new();
    builder.start_component("VCALENDAR").expect("begin");
    let err = builder.finish_calendar().expect_err("open");
    assert_eq!(err.kind, ParseErrorKind::MissingEnd);
}

#[test]
fn malformed_value_fails_at_end_of_property() {
    let mut builder = ComponentBuilder::new();
    builder.start_component("VEVENT").expect("begin");
    builder.start_property("DTSTART").expect("property");
    builder.property_value("2024-06-01").expect("value");
    assert!(builder.end_property().is_err());
}
