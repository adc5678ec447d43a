//! RRULE expansion using the `rrule` crate.
//!
//! Expansion happens on the wall clock: occurrences keep the local time of
//! DTSTART and the caller maps each one to an instant through its zone.

use chrono::NaiveDateTime;

use crate::rfc::ical::core::{DateTime, DateTimeForm, RRule, RRuleUntil};

/// Error during recurrence expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpansionError {
    /// The rule was rejected by the recurrence engine.
    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("RRULE has no FREQ")]
    MissingFrequency,
}

/// Options for recurrence expansion.
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    /// Maximum number of occurrences to generate.
    pub max_instances: usize,
    /// Start of the wall-clock window (inclusive).
    pub range_start: Option<NaiveDateTime>,
    /// End of the wall-clock window (inclusive).
    pub range_end: Option<NaiveDateTime>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_instances: 1000,
            range_start: None,
            range_end: None,
        }
    }
}

impl ExpansionOptions {
    #[must_use]
    pub fn with_range(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            range_start: Some(start),
            range_end: Some(end),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }
}

/// ## Summary
/// Expands a recurrence rule into wall-clock occurrence times.
///
/// UNTIL is compared on the wall clock; a DATE until covers the whole day.
///
/// ## Errors
/// Returns an error if the rule has no frequency or is rejected by the
/// `rrule` crate's validation.
#[tracing::instrument(skip(options), fields(rule = %rule))]
pub fn expand_rrule(
    rule: &RRule,
    dtstart: NaiveDateTime,
    options: &ExpansionOptions,
) -> Result<Vec<NaiveDateTime>, ExpansionError> {
    if rule.freq.is_none() {
        return Err(ExpansionError::MissingFrequency);
    }

    // the rrule crate wants a UTC UNTIL alongside a UTC DTSTART
    let mut wall_clock = rule.clone();
    wall_clock.until = rule.until.as_ref().and_then(until_as_utc);

    let text = format!(
        "DTSTART:{}Z\nRRULE:{wall_clock}",
        dtstart.format("%Y%m%dT%H%M%S")
    );
    let mut set = text
        .parse::<rrule::RRuleSet>()
        .map_err(|e| ExpansionError::InvalidRule(e.to_string()))?;

    let utc = rrule::Tz::Tz(chrono_tz::UTC);
    if let Some(start) = options.range_start {
        set = set.after(start.and_utc().with_timezone(&utc));
    }
    if let Some(end) = options.range_end {
        set = set.before(end.and_utc().with_timezone(&utc));
    }

    let limit = u16::try_from(options.max_instances).unwrap_or(u16::MAX);
    let result = set.all(limit);
    if result.limited {
        tracing::debug!(limit, "Expansion stopped at the instance cap");
    }

    Ok(result.dates.iter().map(chrono::DateTime::naive_utc).collect())
}

fn until_as_utc(until: &RRuleUntil) -> Option<RRuleUntil> {
    let naive = match until {
        RRuleUntil::Date(d) => d.to_naive()?.and_hms_opt(23, 59, 59)?,
        RRuleUntil::DateTime(dt) => dt.to_naive()?,
    };
    Some(RRuleUntil::DateTime(DateTime::from_naive(
        naive,
        DateTimeForm::Utc,
    )))
}
