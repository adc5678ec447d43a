//! VALARM entries.

use chrono::{DateTime, Utc};
use kunai_rfc::rfc::ical::core::{
    Component, ComponentKind, DateTime as ICalDateTime, DateTimeForm, Duration, Parameter,
    Property, TriggerRelated, Value, param, prop,
};
use kunai_rfc::rfc::ical::parse::{ParseError, ParseErrorKind, parse_datetime, parse_duration};

use crate::error::{InviteError, InviteResult};
use crate::metadata::Metadata;
use crate::participant::Attendee;

const FN_ACTION: &str = "ac";
const FN_TRIGGER_TYPE: &str = "tt";
const FN_TRIGGER_RELATED: &str = "trd";
const FN_TRIGGER_RELATIVE: &str = "tr";
const FN_TRIGGER_ABSOLUTE: &str = "ta";
const FN_REPEAT_DURATION: &str = "rd";
const FN_REPEAT_COUNT: &str = "rc";
const FN_DESCRIPTION: &str = "ds";
const FN_SUMMARY: &str = "su";
const FN_NUM_ATTENDEES: &str = "numAt";
const FN_ATTENDEE: &str = "at";
const FN_ATTACH: &str = "attach";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    Display,
    Audio,
    Email,
}

impl AlarmAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Display => "DISPLAY",
            Self::Audio => "AUDIO",
            Self::Email => "EMAIL",
        }
    }

    const fn code(self) -> &'static str {
        match self {
            Self::Display => "d",
            Self::Audio => "a",
            Self::Email => "e",
        }
    }

    /// ## Summary
    /// Parses an action name or persisted code.
    ///
    /// PROCEDURE and unknown actions are refused with a warning.
    #[must_use]
    pub fn lookup(s: &str) -> Option<Self> {
        let action = match s.to_ascii_uppercase().as_str() {
            "DISPLAY" | "D" => Some(Self::Display),
            "AUDIO" | "A" => Some(Self::Audio),
            "EMAIL" | "E" => Some(Self::Email),
            _ => None,
        };
        if action.is_none() {
            tracing::warn!(action = %s, "Alarm action is not allowed; ignoring alarm");
        }
        action
    }
}

/// When an alarm fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Offset from the start or end of the invite.
    Relative {
        related: TriggerRelated,
        offset: Duration,
    },
    Absolute(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub action: AlarmAction,
    pub trigger: Trigger,
    /// Repeat interval and count.
    pub repeat: Option<(Duration, u32)>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub attendees: Vec<Attendee>,
    /// Attachment URI.
    pub attach: Option<String>,
}

impl Alarm {
    /// Display alarm `offset` before the start.
    #[must_use]
    pub fn display_before_start(offset: Duration, description: impl Into<String>) -> Self {
        Self {
            action: AlarmAction::Display,
            trigger: Trigger::Relative {
                related: TriggerRelated::Start,
                offset: if offset.negative { offset } else { offset.negate() },
            },
            repeat: None,
            description: Some(description.into()),
            summary: None,
            attendees: Vec::new(),
            attach: None,
        }
    }

    #[must_use]
    pub fn encode_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.put(FN_ACTION, self.action.code());
        match &self.trigger {
            Trigger::Relative { related, offset } => {
                meta.put(FN_TRIGGER_TYPE, "r");
                meta.put(
                    FN_TRIGGER_RELATED,
                    match related {
                        TriggerRelated::Start => "S",
                        TriggerRelated::End => "E",
                    },
                );
                meta.put(FN_TRIGGER_RELATIVE, offset.to_string());
            }
            Trigger::Absolute(at) => {
                meta.put(FN_TRIGGER_TYPE, "a");
                meta.put(FN_TRIGGER_ABSOLUTE, utc_string(*at));
            }
        }
        if let Some((interval, count)) = &self.repeat {
            meta.put(FN_REPEAT_DURATION, interval.to_string());
            meta.put(FN_REPEAT_COUNT, *count);
        }
        meta.put_opt(FN_DESCRIPTION, self.description.as_deref());
        meta.put_opt(FN_SUMMARY, self.summary.as_deref());
        meta.put_opt(FN_ATTACH, self.attach.as_deref());
        meta.put_list(
            FN_NUM_ATTENDEES,
            FN_ATTENDEE,
            self.attendees.iter().map(Attendee::encode_metadata),
        );
        meta
    }

    /// ## Summary
    /// Reads a persisted alarm. Disallowed actions yield `Ok(None)`.
    ///
    /// ## Errors
    /// Returns [`InviteError::MalformedTemporal`] if a trigger or repeat value
    /// does not parse.
    pub fn decode_metadata(meta: &Metadata) -> InviteResult<Option<Self>> {
        let Some(action) = AlarmAction::lookup(meta.get_str(FN_ACTION).unwrap_or_default()) else {
            return Ok(None);
        };
        let trigger = if meta.get_str(FN_TRIGGER_TYPE) == Some("a") {
            Trigger::Absolute(parse_utc(meta.require_str(FN_TRIGGER_ABSOLUTE)?)?)
        } else {
            let related = match meta.get_str(FN_TRIGGER_RELATED) {
                Some("E") => TriggerRelated::End,
                _ => TriggerRelated::Start,
            };
            Trigger::Relative {
                related,
                offset: parse_duration(meta.get_str(FN_TRIGGER_RELATIVE).unwrap_or("PT0S"))?,
            }
        };
        let repeat = match meta.get_str(FN_REPEAT_DURATION) {
            Some(raw) => Some((
                parse_duration(raw)?,
                u32::try_from(meta.get_long_or(FN_REPEAT_COUNT, 0)).unwrap_or(0),
            )),
            None => None,
        };
        let attendees = meta
            .map_list(FN_NUM_ATTENDEES, FN_ATTENDEE)
            .into_iter()
            .map(Attendee::decode_metadata)
            .collect();
        Ok(Some(Self {
            action,
            trigger,
            repeat,
            description: meta.get_str(FN_DESCRIPTION).map(str::to_string),
            summary: meta.get_str(FN_SUMMARY).map(str::to_string),
            attendees,
            attach: meta.get_str(FN_ATTACH).map(str::to_string),
        }))
    }

    #[must_use]
    pub fn to_component(&self) -> Component {
        let mut comp = Component::new(ComponentKind::Alarm);
        comp.add_property(Property::text(prop::ACTION, self.action.as_str()));
        match &self.trigger {
            Trigger::Relative { related, offset } => {
                let mut trigger = Property::duration(prop::TRIGGER, *offset);
                if *related == TriggerRelated::End {
                    trigger.set_param(Parameter::related(*related));
                }
                comp.add_property(trigger);
            }
            Trigger::Absolute(at) => {
                comp.add_property(
                    Property::datetime(
                        prop::TRIGGER,
                        ICalDateTime::from_naive(at.naive_utc(), DateTimeForm::Utc),
                    )
                    .with_param(Parameter::value_type("DATE-TIME")),
                );
            }
        }
        if let Some((interval, count)) = &self.repeat {
            comp.add_property(Property::integer(
                prop::REPEAT,
                i32::try_from(*count).unwrap_or(i32::MAX),
            ));
            comp.add_property(Property::duration(prop::DURATION, *interval));
        }
        // DISPLAY and EMAIL alarms require a DESCRIPTION.
        let description = match (&self.description, self.action) {
            (Some(d), _) => Some(d.clone()),
            (None, AlarmAction::Display | AlarmAction::Email) => Some("Reminder".to_string()),
            (None, AlarmAction::Audio) => None,
        };
        if let Some(description) = description {
            comp.add_property(Property::text(prop::DESCRIPTION, description));
        }
        if let Some(summary) = &self.summary {
            comp.add_property(Property::text(prop::SUMMARY, summary.clone()));
        }
        if let Some(attach) = &self.attach {
            comp.add_property(Property::new(prop::ATTACH, Value::Uri(attach.clone())));
        }
        for attendee in &self.attendees {
            comp.add_property(attendee.to_property());
        }
        comp
    }

    /// ## Summary
    /// Reads a VALARM. Disallowed actions yield `Ok(None)`.
    ///
    /// ## Errors
    /// Returns [`InviteError::StructuralViolation`] if ACTION or TRIGGER is
    /// missing or TRIGGER has an unusable value.
    pub fn from_component(comp: &Component) -> InviteResult<Option<Self>> {
        let action = comp
            .text_of(prop::ACTION)
            .ok_or_else(|| InviteError::StructuralViolation("VALARM without ACTION".into()))?;
        let Some(action) = AlarmAction::lookup(action) else {
            return Ok(None);
        };
        let trigger_prop = comp
            .get_property(prop::TRIGGER)
            .ok_or_else(|| InviteError::StructuralViolation("VALARM without TRIGGER".into()))?;
        let trigger = match &trigger_prop.value {
            Value::Duration(offset) => Trigger::Relative {
                related: trigger_prop
                    .get_param_value(param::RELATED)
                    .map_or(TriggerRelated::Start, TriggerRelated::parse),
                offset: *offset,
            },
            Value::DateTime(dt) => {
                let naive = dt.to_naive().ok_or_else(|| {
                    ParseError::invalid(ParseErrorKind::InvalidDateTime, &dt.to_string())
                })?;
                Trigger::Absolute(DateTime::from_naive_utc_and_offset(naive, Utc))
            }
            other => {
                return Err(InviteError::StructuralViolation(format!(
                    "unusable TRIGGER value {other}"
                )));
            }
        };
        let repeat = match (
            comp.get_property(prop::REPEAT).and_then(Property::as_integer),
            comp.get_property(prop::DURATION)
                .and_then(|p| p.value.as_duration()),
        ) {
            (Some(count), Some(interval)) => Some((*interval, u32::try_from(count).unwrap_or(0))),
            _ => None,
        };
        Ok(Some(Self {
            action,
            trigger,
            repeat,
            description: comp.text_of(prop::DESCRIPTION).map(str::to_string),
            summary: comp.text_of(prop::SUMMARY).map(str::to_string),
            attendees: comp
                .get_properties(prop::ATTENDEE)
                .into_iter()
                .map(Attendee::from_property)
                .collect(),
            attach: comp
                .get_property(prop::ATTACH)
                .and_then(|p| p.value.as_uri())
                .map(str::to_string),
        }))
    }
}

fn utc_string(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn parse_utc(raw: &str) -> InviteResult<DateTime<Utc>> {
    let dt = parse_datetime(raw, None)?;
    let naive = dt
        .to_naive()
        .ok_or_else(|| ParseError::invalid(ParseErrorKind::InvalidDateTime, raw))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}
