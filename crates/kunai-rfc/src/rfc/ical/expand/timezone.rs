//! Timezone identifier canonicalization and local-to-UTC conversion.
//!
//! Uses ICU4X for Windows timezone ID to IANA mapping and alias
//! canonicalization.

use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;

/// Error during timezone conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Unknown or invalid timezone identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// A local time that does not exist even after shifting past the gap.
    #[error("Non-existent time (DST gap): {0}")]
    NonExistentTime(String),
}

/// Normalizes a calendar TZID to its canonical IANA name.
///
/// Vendor prefixes are stripped, Windows names are mapped, and IANA aliases
/// (`US/Eastern`, `Europe/Kiev`) resolve to their canonical zone.
/// Unrecognized ids are returned with only the prefix stripped.
#[must_use]
pub fn canonical_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .unwrap_or(tzid)
        .trim();

    let iana_parser = IanaParserExtended::new();

    if let Some(tz) = WindowsParser::new().parse(stripped, None)
        && let Some(entry) = iana_parser.iter().find(|entry| entry.time_zone == tz)
    {
        return entry.canonical.to_string();
    }

    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone != icu::time::TimeZone::UNKNOWN {
        return parsed.canonical.to_string();
    }

    stripped.to_string()
}

/// Looks up a well-known zone by id, canonicalizing first.
#[must_use]
pub fn well_known_zone(tzid: &str) -> Option<Tz> {
    if let Ok(tz) = Tz::from_str(tzid) {
        return Some(tz);
    }
    Tz::from_str(&canonical_tzid(tzid)).ok()
}

/// ## Summary
/// Converts a wall-clock time in `tz` to UTC.
///
/// In a DST fold the earlier instant is used. A time inside a DST gap is
/// shifted forward by one hour.
///
/// ## Errors
/// Returns [`ConversionError::NonExistentTime`] if the shifted time still
/// does not exist.
pub fn localize(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, ConversionError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = local + TimeDelta::hours(1);
            tracing::trace!(%local, zone = %tz.name(), "Local time falls in a DST gap");
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| ConversionError::NonExistentTime(format!("{local} in {}", tz.name())))
        }
    }
}
