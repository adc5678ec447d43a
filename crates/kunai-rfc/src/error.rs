use thiserror::Error;

use crate::rfc::ical::expand::{ExpansionError, VTimezoneError};
use crate::rfc::ical::parse::ParseError;

/// RFC parsing and validation errors
#[derive(Error, Debug)]
pub enum RfcError {
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Timezone definition error: {0}")]
    Timezone(#[from] VTimezoneError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
