//! iCalendar property parameters (RFC 5545 §3.2).

/// A single property parameter, e.g. the `TZID` in
/// `DTSTART;TZID=America/New_York:20260123T120000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Upper-cased parameter name.
    pub name: String,
    /// Most parameters carry one value; MEMBER and DELEGATED-* may carry several.
    pub values: Vec<String>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            values: vec![value.into()],
        }
    }

    /// Returns the first (and usually only) value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.eq_ignore_ascii_case(value))
    }

    #[must_use]
    pub fn tzid(tzid: impl Into<String>) -> Self {
        Self::new(names::TZID, tzid)
    }

    #[must_use]
    pub fn value_type(value_type: impl Into<String>) -> Self {
        Self::new(names::VALUE, value_type)
    }

    #[must_use]
    pub fn rsvp(rsvp: bool) -> Self {
        Self::new(names::RSVP, if rsvp { "TRUE" } else { "FALSE" })
    }

    #[must_use]
    pub fn related(related: TriggerRelated) -> Self {
        Self::new(names::RELATED, related.as_str())
    }
}

/// RELATED parameter values for TRIGGER (RFC 5545 §3.2.14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriggerRelated {
    #[default]
    Start,
    End,
}

impl TriggerRelated {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("END") {
            Self::End
        } else {
            Self::Start
        }
    }
}

/// Parameter names used by the engine.
pub mod names {
    pub const CN: &str = "CN";
    pub const CUTYPE: &str = "CUTYPE";
    pub const DELEGATED_FROM: &str = "DELEGATED-FROM";
    pub const DELEGATED_TO: &str = "DELEGATED-TO";
    pub const DIR: &str = "DIR";
    pub const FMTTYPE: &str = "FMTTYPE";
    pub const LANGUAGE: &str = "LANGUAGE";
    pub const MEMBER: &str = "MEMBER";
    pub const PARTSTAT: &str = "PARTSTAT";
    pub const RANGE: &str = "RANGE";
    pub const RELATED: &str = "RELATED";
    pub const ROLE: &str = "ROLE";
    pub const RSVP: &str = "RSVP";
    pub const SENT_BY: &str = "SENT-BY";
    pub const TZID: &str = "TZID";
    pub const VALUE: &str = "VALUE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_normalized() {
        let p = Parameter::new("partstat", "ACCEPTED");
        assert_eq!(p.name, "PARTSTAT");
        assert!(p.has_value("accepted"));
    }

    #[test]
    fn trigger_related_parse() {
        assert_eq!(TriggerRelated::parse("end"), TriggerRelated::End);
        assert_eq!(TriggerRelated::parse("START"), TriggerRelated::Start);
        assert_eq!(TriggerRelated::parse("bogus"), TriggerRelated::Start);
    }
}
