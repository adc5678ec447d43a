//! Calendar invite engine.
//!
//! Models a single event or task definition, its recurrence, the time zones
//! it references and its participants, and computes the differences between
//! two versions of the same invite. Pure value transformations: persistence,
//! transport and locking belong to the caller.

pub mod account;
pub mod alarm;
pub mod change;
pub mod description;
pub mod error;
pub mod invite;
pub mod lineage;
pub mod matcher;
pub mod metadata;
pub mod participant;
pub mod recurrence;
pub mod settings;
pub mod temporal;
pub mod tzmap;
