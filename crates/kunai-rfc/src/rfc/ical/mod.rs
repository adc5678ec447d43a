//! iCalendar (RFC 5545) value layer.
//!
//! - `core`: typed component, property, parameter and value model
//! - `parse`: value parsers and the event-driven component builder
//! - `build`: serialization back to folded text
//! - `expand`: timezone resolution and recurrence expansion

pub mod build;
pub mod core;
pub mod expand;
pub mod parse;
