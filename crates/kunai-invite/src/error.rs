use kunai_core::error::CoreError;
use kunai_rfc::error::RfcError;
use kunai_rfc::rfc::ical::expand::{ConversionError, ExpansionError};
use kunai_rfc::rfc::ical::parse::ParseError;
use thiserror::Error;

/// Invite engine errors
#[derive(Error, Debug)]
pub enum InviteError {
    /// Data that breaks a structural rule, e.g. a missing UID or attendees
    /// without an organizer.
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// A TZID that neither the invite's registry nor the well-known catalog
    /// can resolve.
    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    #[error("Malformed temporal value: {0}")]
    MalformedTemporal(#[from] ParseError),

    #[error("Invalid lineage transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Rfc(#[from] RfcError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ConversionError> for InviteError {
    fn from(err: ConversionError) -> Self {
        Self::UnresolvableReference(err.to_string())
    }
}

impl From<ExpansionError> for InviteError {
    fn from(err: ExpansionError) -> Self {
        Self::Rfc(RfcError::Expansion(err))
    }
}

pub type InviteResult<T> = std::result::Result<T, InviteError>;
