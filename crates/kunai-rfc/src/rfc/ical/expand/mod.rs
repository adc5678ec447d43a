//! Timezone resolution and recurrence expansion (RFC 5545).

mod rrule;
mod timezone;
mod vtimezone;

pub use self::rrule::{ExpansionError, ExpansionOptions, expand_rrule};
pub use timezone::{ConversionError, canonical_tzid, localize, well_known_zone};
pub use vtimezone::{Observance, ObservanceKind, VTimezone, VTimezoneError};
