//! Event-driven component construction.
//!
//! Text tokenization happens elsewhere; an external grammar parser reports
//! what it sees through [`ContentHandler`], and [`ComponentBuilder`] turns
//! those events into a typed [`Component`] tree.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::values::{
    parse_boolean, parse_date, parse_datetime, parse_duration, parse_float, parse_integer,
    parse_period, parse_rrule, parse_utc_offset, split_text_list, unescape_text,
};
use crate::rfc::ical::core::{
    Component, ComponentKind, ContentLine, DateTime, ICalendar, Parameter, Property, Value,
};

/// Receiver for grammar events.
///
/// Events for one property arrive as `start_property`, any number of
/// `parameter` calls, one or more `property_value` calls, then `end_property`.
pub trait ContentHandler {
    /// ## Errors
    /// Implementations may reject components they cannot hold.
    fn start_component(&mut self, name: &str) -> ParseResult<()>;

    /// ## Errors
    /// Returns an error if `name` does not close the innermost component.
    fn end_component(&mut self, name: &str) -> ParseResult<()>;

    /// ## Errors
    /// Returns an error if no component is open.
    fn start_property(&mut self, name: &str) -> ParseResult<()>;

    /// Adds one parameter value; repeated names accumulate.
    ///
    /// ## Errors
    /// Returns an error if no property is open.
    fn parameter(&mut self, name: &str, value: &str) -> ParseResult<()>;

    /// ## Errors
    /// Returns an error if no property is open.
    fn property_value(&mut self, raw: &str) -> ParseResult<()>;

    /// ## Errors
    /// Returns an error when the accumulated value is malformed for its type.
    fn end_property(&mut self) -> ParseResult<()>;
}

/// Builds a component tree from grammar events.
#[derive(Debug, Default)]
pub struct ComponentBuilder {
    stack: Vec<Component>,
    pending: Option<ContentLine>,
    completed: Option<Component>,
}

impl ComponentBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the finished top-level component.
    ///
    /// ## Errors
    /// Returns an error if components are still open or none was built.
    pub fn finish(self) -> ParseResult<Component> {
        if let Some(open) = self.stack.last() {
            return Err(ParseError::new(ParseErrorKind::MissingEnd)
                .with_context(format!("missing END:{}", open.name)));
        }
        self.completed
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin))
    }

    /// Returns the finished VCALENDAR.
    ///
    /// ## Errors
    /// Returns an error if the top-level component is not a VCALENDAR.
    pub fn finish_calendar(self) -> ParseResult<ICalendar> {
        let root = self.finish()?;
        if root.kind != ComponentKind::Calendar {
            return Err(ParseError::new(ParseErrorKind::MissingBegin)
                .with_context(format!("expected VCALENDAR, got {}", root.name)));
        }
        Ok(ICalendar { root })
    }
}

impl ContentHandler for ComponentBuilder {
    fn start_component(&mut self, name: &str) -> ParseResult<()> {
        tracing::trace!(component = name, "Begin component");
        self.stack.push(Component::named(name));
        Ok(())
    }

    fn end_component(&mut self, name: &str) -> ParseResult<()> {
        let Some(current) = self.stack.pop() else {
            return Err(ParseError::new(ParseErrorKind::MismatchedComponent)
                .with_context(format!("END:{name} without BEGIN")));
        };
        if !current.name.eq_ignore_ascii_case(name) {
            return Err(ParseError::new(ParseErrorKind::MismatchedComponent)
                .with_context(format!("expected END:{}, got END:{name}", current.name)));
        }
        match self.stack.last_mut() {
            Some(parent) => parent.add_child(current),
            None => self.completed = Some(current),
        }
        Ok(())
    }

    fn start_property(&mut self, name: &str) -> ParseResult<()> {
        if self.stack.is_empty() {
            return Err(ParseError::new(ParseErrorKind::MissingBegin)
                .with_context(format!("property {name} outside a component")));
        }
        self.pending = Some(ContentLine::new(name));
        Ok(())
    }

    fn parameter(&mut self, name: &str, value: &str) -> ParseResult<()> {
        let line = self.pending_line()?;
        if let Some(existing) = line
            .params
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
        {
            existing.values.push(value.to_string());
        } else {
            line.params.push(Parameter::new(name, value));
        }
        Ok(())
    }

    fn property_value(&mut self, raw: &str) -> ParseResult<()> {
        let line = self.pending_line()?;
        if !line.raw_value.is_empty() {
            line.raw_value.push(',');
        }
        line.raw_value.push_str(raw);
        Ok(())
    }

    fn end_property(&mut self) -> ParseResult<()> {
        let line = self
            .pending
            .take()
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin))?;
        let property = resolve_property(line)?;
        if let Some(component) = self.stack.last_mut() {
            component.add_property(property);
        }
        Ok(())
    }
}

impl ComponentBuilder {
    fn pending_line(&mut self) -> ParseResult<&mut ContentLine> {
        self.pending
            .as_mut()
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin))
    }
}

/// Converts a content line into a typed property.
///
/// ## Errors
/// Returns an error when the raw value does not match its resolved type.
pub fn resolve_property(line: ContentLine) -> ParseResult<Property> {
    let value_type = determine_value_type(&line);
    let value = parse_value(&line.raw_value, value_type, line.tzid())?;
    Ok(Property {
        name: line.name,
        params: line.params,
        value,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Boolean,
    CalAddress,
    Date,
    DateTime,
    Duration,
    Float,
    Integer,
    Period,
    Recur,
    Text,
    TextList,
    Uri,
    UtcOffset,
    Unknown,
}

impl ValueType {
    fn from_param(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Self::Boolean,
            "CAL-ADDRESS" => Self::CalAddress,
            "DATE" => Self::Date,
            "DATE-TIME" => Self::DateTime,
            "DURATION" => Self::Duration,
            "FLOAT" => Self::Float,
            "INTEGER" => Self::Integer,
            "PERIOD" => Self::Period,
            "RECUR" => Self::Recur,
            "TEXT" => Self::Text,
            "URI" => Self::Uri,
            "UTC-OFFSET" => Self::UtcOffset,
            _ => Self::Unknown,
        }
    }
}

fn looks_like_date(raw: &str) -> bool {
    !raw.contains('T') && raw.split(',').all(|d| d.trim().len() == 8)
}

fn determine_value_type(cl: &ContentLine) -> ValueType {
    if let Some(value_type) = cl.value_type() {
        return ValueType::from_param(value_type);
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DUE" | "RECURRENCE-ID" | "EXDATE" => {
            if looks_like_date(&cl.raw_value) {
                ValueType::Date
            } else {
                ValueType::DateTime
            }
        }
        "RDATE" => {
            if cl.raw_value.contains('/') {
                ValueType::Period
            } else if looks_like_date(&cl.raw_value) {
                ValueType::Date
            } else {
                ValueType::DateTime
            }
        }
        "DTSTAMP" | "CREATED" | "LAST-MODIFIED" | "COMPLETED" => ValueType::DateTime,
        "DURATION" => ValueType::Duration,
        "TRIGGER" => {
            if cl.raw_value.starts_with(['P', '+', '-']) {
                ValueType::Duration
            } else {
                ValueType::DateTime
            }
        }
        "PERCENT-COMPLETE" | "PRIORITY" | "REPEAT" | "SEQUENCE" => ValueType::Integer,
        "RRULE" | "EXRULE" => ValueType::Recur,
        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,
        "URL" | "TZURL" | "ATTACH" => ValueType::Uri,
        "FREEBUSY" => ValueType::Period,
        "ATTENDEE" | "ORGANIZER" => ValueType::CalAddress,
        "CATEGORIES" | "RESOURCES" => ValueType::TextList,
        _ => ValueType::Text,
    }
}

fn parse_value(raw: &str, value_type: ValueType, tzid: Option<&str>) -> ParseResult<Value> {
    let items = || raw.split(',').map(str::trim).filter(|s| !s.is_empty());
    match value_type {
        ValueType::Text => Ok(Value::Text(unescape_text(raw))),
        ValueType::TextList => Ok(Value::TextList(split_text_list(raw))),
        ValueType::DateTime => {
            let mut dts: Vec<DateTime> = items()
                .map(|s| parse_datetime(s, tzid))
                .collect::<ParseResult<_>>()?;
            match dts.len() {
                0 => Ok(Value::Unknown(raw.to_string())),
                1 => Ok(Value::DateTime(dts.remove(0))),
                _ => Ok(Value::DateTimeList(dts)),
            }
        }
        ValueType::Date => {
            let mut dates: Vec<_> = items().map(parse_date).collect::<ParseResult<_>>()?;
            match dates.len() {
                0 => Ok(Value::Unknown(raw.to_string())),
                1 => Ok(Value::Date(dates.remove(0))),
                _ => Ok(Value::DateList(dates)),
            }
        }
        ValueType::Period => {
            let mut periods: Vec<_> = items()
                .map(|s| parse_period(s, tzid))
                .collect::<ParseResult<_>>()?;
            match periods.len() {
                0 => Ok(Value::Unknown(raw.to_string())),
                1 => Ok(Value::Period(periods.remove(0))),
                _ => Ok(Value::PeriodList(periods)),
            }
        }
        ValueType::Duration => Ok(Value::Duration(parse_duration(raw)?)),
        ValueType::Integer => Ok(Value::Integer(parse_integer(raw)?)),
        ValueType::Float => Ok(Value::Float(parse_float(raw)?)),
        ValueType::Boolean => Ok(Value::Boolean(parse_boolean(raw)?)),
        ValueType::Recur => Ok(Value::Recur(Box::new(parse_rrule(raw)?))),
        ValueType::UtcOffset => Ok(Value::UtcOffset(parse_utc_offset(raw)?)),
        ValueType::CalAddress => Ok(Value::CalAddress(raw.to_string())),
        ValueType::Uri => Ok(Value::Uri(raw.to_string())),
        ValueType::Unknown => Ok(Value::Unknown(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{Date, Duration};

    fn prop(b: &mut ComponentBuilder, name: &str, params: &[(&str, &str)], raw: &str) {
        b.start_property(name).unwrap();
        for (k, v) in params {
            b.parameter(k, v).unwrap();
        }
        b.property_value(raw).unwrap();
        b.end_property().unwrap();
    }

    #[test_log::test]
    fn builds_typed_event() {
        let mut b = ComponentBuilder::new();
        b.start_component("VCALENDAR").unwrap();
        prop(&mut b, "METHOD", &[], "REQUEST");
        b.start_component("VEVENT").unwrap();
        prop(&mut b, "UID", &[], "abc");
        prop(&mut b, "DTSTART", &[("TZID", "Europe/Paris")], "20240601T100000");
        prop(&mut b, "DTEND", &[], "20240602");
        prop(&mut b, "DURATION", &[], "PT1H");
        prop(&mut b, "SEQUENCE", &[], "3");
        prop(&mut b, "EXDATE", &[], "20240603T100000Z,20240604T100000Z");
        prop(&mut b, "CATEGORIES", &[], "Work,Fun\\, really");
        prop(&mut b, "ATTENDEE", &[("PARTSTAT", "ACCEPTED")], "mailto:a@example.com");
        b.end_component("VEVENT").unwrap();
        b.end_component("VCALENDAR").unwrap();

        let cal = b.finish_calendar().unwrap();
        tracing::debug!(?cal, "Built calendar");
        assert_eq!(cal.method(), Some("REQUEST"));
        let event = cal.schedulable()[0];
        assert_eq!(event.uid(), Some("abc"));
        let start = event.get_property("DTSTART").unwrap().value.as_datetime().unwrap();
        assert_eq!(start.tzid(), Some("Europe/Paris"));
        assert_eq!(
            event.get_property("DTEND").unwrap().value.as_date(),
            Some(&Date::new(2024, 6, 2))
        );
        assert_eq!(
            event.get_property("DURATION").unwrap().value.as_duration(),
            Some(&Duration::hours(1))
        );
        assert_eq!(event.get_property("SEQUENCE").unwrap().as_integer(), Some(3));
        assert!(matches!(
            event.get_property("EXDATE").unwrap().value,
            Value::DateTimeList(ref l) if l.len() == 2
        ));
        assert_eq!(
            event.get_property("CATEGORIES").unwrap().value,
            Value::TextList(vec!["Work".into(), "Fun, really".into()])
        );
    }

    #[test]
    fn repeated_parameters_accumulate() {
        let mut b = ComponentBuilder::new();
        b.start_component("VEVENT").unwrap();
        prop(
            &mut b,
            "ATTENDEE",
            &[("MEMBER", "mailto:g1@x"), ("MEMBER", "mailto:g2@x")],
            "mailto:a@x",
        );
        b.end_component("VEVENT").unwrap();
        let event = b.finish().unwrap();
        let member = event.properties[0].get_param("MEMBER").unwrap();
        assert_eq!(member.values.len(), 2);
    }

    #[test]
    fn malformed_value_is_an_error() {
        let mut b = ComponentBuilder::new();
        b.start_component("VEVENT").unwrap();
        b.start_property("DURATION").unwrap();
        b.property_value("one hour").unwrap();
        let err = b.end_property().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidDuration);
    }

    #[test]
    fn mismatched_end_is_rejected() {
        let mut b = ComponentBuilder::new();
        b.start_component("VCALENDAR").unwrap();
        b.start_component("VEVENT").unwrap();
        let err = b.end_component("VCALENDAR").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MismatchedComponent);
    }

    #[test]
    fn unterminated_stream_is_rejected() {
        let mut b = ComponentBuilder::new();
        b.start_component("VCALENDAR").unwrap();
        assert_eq!(b.finish().unwrap_err().kind, ParseErrorKind::MissingEnd);
        assert!(ComponentBuilder::new().start_property("UID").is_err());
    }
}
