//! iCalendar value parsing (RFC 5545).
//!
//! Tokenizing calendar text is the job of an external grammar parser. This
//! module types what that parser reports: raw values become [`Value`]s and
//! component/property events become a component tree.
//!
//! [`Value`]: crate::rfc::ical::core::Value

mod error;
mod handler;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use handler::{ComponentBuilder, ContentHandler, resolve_property};
pub use values::{
    parse_boolean, parse_date, parse_datetime, parse_duration, parse_float, parse_integer,
    parse_period, parse_rrule, parse_utc_offset, split_text_list, unescape_text,
};
