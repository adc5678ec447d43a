//! iCalendar value parse errors.

use std::fmt;

/// Result type for value parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A value that could not be interpreted.
///
/// Carries no line or column: input arrives as already-tokenized events, so
/// the offending raw text is kept in `context` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub context: Option<String>,
}

impl ParseError {
    #[must_use]
    pub const fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Shorthand for an error whose context is the rejected input.
    #[must_use]
    pub fn invalid(kind: ParseErrorKind, input: &str) -> Self {
        Self::new(kind).with_context(format!("'{input}'"))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {ctx}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidDate,
    InvalidTime,
    InvalidDateTime,
    InvalidDuration,
    InvalidPeriod,
    InvalidRRule,
    InvalidFrequency,
    InvalidWeekday,
    UntilCountConflict,
    InvalidUtcOffset,
    InvalidInteger,
    InvalidFloat,
    InvalidBoolean,
    /// A property or parameter event arrived outside a component.
    MissingBegin,
    /// An end event did not close the innermost open component.
    MismatchedComponent,
    /// The event stream ended with components still open.
    MissingEnd,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidDate => "invalid date",
            Self::InvalidTime => "invalid time",
            Self::InvalidDateTime => "invalid date-time",
            Self::InvalidDuration => "invalid duration",
            Self::InvalidPeriod => "invalid period",
            Self::InvalidRRule => "invalid recurrence rule",
            Self::InvalidFrequency => "invalid frequency",
            Self::InvalidWeekday => "invalid weekday",
            Self::UntilCountConflict => "UNTIL and COUNT are mutually exclusive",
            Self::InvalidUtcOffset => "invalid UTC offset",
            Self::InvalidInteger => "invalid integer",
            Self::InvalidFloat => "invalid float",
            Self::InvalidBoolean => "invalid boolean",
            Self::MissingBegin => "event outside any component",
            Self::MismatchedComponent => "mismatched component end",
            Self::MissingEnd => "unterminated component",
        };
        f.write_str(s)
    }
}
