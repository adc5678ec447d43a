//! iCalendar core models (RFC 5545).
//!
//! Typed values keep the engine independent of the text grammar: parsers
//! deliver these types, serializers consume them.

mod component;
mod datetime;
mod duration;
mod parameter;
mod property;
mod rrule;
mod value;

pub use component::{Component, ComponentKind, ICalendar};
pub use datetime::{DateTime, DateTimeForm, UtcOffset};
pub use duration::Duration;
pub use parameter::{Parameter, TriggerRelated, names as param};
pub use property::{ContentLine, Property, names as prop};
pub use rrule::{Frequency, RRule, RRuleUntil, Weekday, WeekdayNum};
pub use value::{Date, Period, Value};
