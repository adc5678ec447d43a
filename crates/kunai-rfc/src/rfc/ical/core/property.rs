//! iCalendar property and content line types (RFC 5545 §3.1, §3.8).

use super::{Date, DateTime, Duration, Parameter, RRule, Value};

/// A property as delivered by a grammar parser, before value typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Upper-cased property name.
    pub name: String,
    pub params: Vec<Parameter>,
    /// Raw value string (unfolded, still escaped).
    pub raw_value: String,
}

impl ContentLine {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: String::new(),
        }
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(Parameter::value)
    }

    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        self.get_param_value(super::parameter::names::VALUE)
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_param_value(super::parameter::names::TZID)
    }
}

/// A typed iCalendar property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Upper-cased property name.
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: Value,
}

impl Property {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value,
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Text(value.into()))
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, Value::Integer(value))
    }

    /// DATE-TIME property; zoned values carry their `TZID` parameter.
    #[must_use]
    pub fn datetime(name: impl Into<String>, dt: DateTime) -> Self {
        let tzid = dt.tzid().map(str::to_string);
        let mut prop = Self::new(name, Value::DateTime(dt));
        if let Some(tzid) = tzid {
            prop.params.push(Parameter::tzid(tzid));
        }
        prop
    }

    #[must_use]
    pub fn date(name: impl Into<String>, d: Date) -> Self {
        Self::new(name, Value::Date(d)).with_param(Parameter::value_type("DATE"))
    }

    #[must_use]
    pub fn duration(name: impl Into<String>, d: Duration) -> Self {
        Self::new(name, Value::Duration(d))
    }

    #[must_use]
    pub fn recur(name: impl Into<String>, rule: RRule) -> Self {
        Self::new(name, Value::Recur(Box::new(rule)))
    }

    #[must_use]
    pub fn cal_address(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::new(name, Value::CalAddress(address.into()))
    }

    #[must_use]
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.set_param(param);
        self
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.get_param(name)?.value()
    }

    /// Replaces any parameter with the same name.
    pub fn set_param(&mut self, param: Parameter) {
        self.params.retain(|p| p.name != param.name);
        self.params.push(param);
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        self.value.as_integer()
    }
}

/// Property names used by the engine.
pub mod names {
    pub const ACTION: &str = "ACTION";
    pub const ATTACH: &str = "ATTACH";
    pub const ATTENDEE: &str = "ATTENDEE";
    pub const CATEGORIES: &str = "CATEGORIES";
    pub const CLASS: &str = "CLASS";
    pub const COMMENT: &str = "COMMENT";
    pub const COMPLETED: &str = "COMPLETED";
    pub const CONTACT: &str = "CONTACT";
    pub const DESCRIPTION: &str = "DESCRIPTION";
    pub const DTEND: &str = "DTEND";
    pub const DTSTAMP: &str = "DTSTAMP";
    pub const DTSTART: &str = "DTSTART";
    pub const DUE: &str = "DUE";
    pub const DURATION: &str = "DURATION";
    pub const EXDATE: &str = "EXDATE";
    pub const EXRULE: &str = "EXRULE";
    pub const GEO: &str = "GEO";
    pub const LAST_MODIFIED: &str = "LAST-MODIFIED";
    pub const LOCATION: &str = "LOCATION";
    pub const METHOD: &str = "METHOD";
    pub const ORGANIZER: &str = "ORGANIZER";
    pub const PERCENT_COMPLETE: &str = "PERCENT-COMPLETE";
    pub const PRIORITY: &str = "PRIORITY";
    pub const PRODID: &str = "PRODID";
    pub const RDATE: &str = "RDATE";
    pub const RECURRENCE_ID: &str = "RECURRENCE-ID";
    pub const REPEAT: &str = "REPEAT";
    pub const RRULE: &str = "RRULE";
    pub const SEQUENCE: &str = "SEQUENCE";
    pub const STATUS: &str = "STATUS";
    pub const SUMMARY: &str = "SUMMARY";
    pub const TRANSP: &str = "TRANSP";
    pub const TRIGGER: &str = "TRIGGER";
    pub const TZID: &str = "TZID";
    pub const TZNAME: &str = "TZNAME";
    pub const TZOFFSETFROM: &str = "TZOFFSETFROM";
    pub const TZOFFSETTO: &str = "TZOFFSETTO";
    pub const UID: &str = "UID";
    pub const URL: &str = "URL";
    pub const VERSION: &str = "VERSION";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoned_datetime_carries_tzid() {
        let prop = Property::datetime(
            names::DTSTART,
            DateTime::zoned(2026, 1, 23, 12, 0, 0, "America/New_York"),
        );
        assert_eq!(prop.get_param_value("tzid"), Some("America/New_York"));

        let utc = Property::datetime(names::DTSTAMP, DateTime::utc(2026, 1, 23, 12, 0, 0));
        assert!(utc.params.is_empty());
    }

    #[test]
    fn set_param_replaces() {
        let prop = Property::text(names::SUMMARY, "Meeting")
            .with_param(Parameter::new("LANGUAGE", "en"))
            .with_param(Parameter::new("LANGUAGE", "de"));
        assert_eq!(prop.params.len(), 1);
        assert_eq!(prop.get_param_value("LANGUAGE"), Some("de"));
        assert_eq!(prop.as_text(), Some("Meeting"));
    }

    #[test]
    fn content_line_params() {
        let mut cl = ContentLine::new("dtstart");
        cl.params.push(Parameter::tzid("Europe/Paris"));
        cl.params.push(Parameter::value_type("DATE-TIME"));
        assert_eq!(cl.name, "DTSTART");
        assert_eq!(cl.tzid(), Some("Europe/Paris"));
        assert_eq!(cl.value_type(), Some("DATE-TIME"));
    }
}
