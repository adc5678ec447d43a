//! Persisted key-value tree.
//!
//! Invites, time zones, recurrence trees and participants are persisted as
//! nested maps with short, stable tags. Readers are lenient: counts may be
//! stored as strings and booleans as numbers by older writers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{InviteError, InviteResult};

/// A nested map of tagged values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: BTreeMap<String, MetaValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Long(i64),
    Str(String),
    Map(Metadata),
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<u32> for MetaValue {
    fn from(value: u32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Long(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        Self::Map(value)
    }
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Stores `value` only when present.
    pub fn put_opt<V: Into<MetaValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.put(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; numeric strings are accepted.
    #[must_use]
    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.entries.get(key)? {
            MetaValue::Long(n) => Some(*n),
            MetaValue::Str(s) => s.trim().parse().ok(),
            MetaValue::Bool(_) | MetaValue::Map(_) => None,
        }
    }

    #[must_use]
    pub fn get_long_or(&self, key: &str, default: i64) -> i64 {
        self.get_long(key).unwrap_or(default)
    }

    /// Boolean value; `"true"`/`"false"` strings and `0`/`1` are accepted.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            MetaValue::Bool(b) => Some(*b),
            MetaValue::Long(n) => Some(*n != 0),
            MetaValue::Str(s) => s.trim().parse().ok(),
            MetaValue::Map(_) => None,
        }
    }

    #[must_use]
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    #[must_use]
    pub fn get_map(&self, key: &str) -> Option<&Metadata> {
        match self.entries.get(key)? {
            MetaValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// ## Summary
    /// Returns a string tag that must be present.
    ///
    /// ## Errors
    /// Returns [`InviteError::StructuralViolation`] when the tag is missing or
    /// not a string.
    pub fn require_str(&self, key: &str) -> InviteResult<&str> {
        self.get_str(key).ok_or_else(|| {
            InviteError::StructuralViolation(format!("missing required tag '{key}'"))
        })
    }

    /// Writes a counted list as `count_key` plus `{prefix}{i}` entries.
    ///
    /// Empty lists write nothing.
    pub fn put_list<I, V>(&mut self, count_key: &str, prefix: &str, items: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<MetaValue>,
    {
        let mut count = 0_usize;
        for (i, item) in items.into_iter().enumerate() {
            self.put(format!("{prefix}{i}"), item);
            count = i + 1;
        }
        if count > 0 {
            self.put(count_key, count);
        }
    }

    /// Reads a counted list, skipping holes.
    #[must_use]
    pub fn list(&self, count_key: &str, prefix: &str) -> Vec<&MetaValue> {
        let count = self.get_long_or(count_key, 0).max(0);
        (0..count)
            .filter_map(|i| self.entries.get(&format!("{prefix}{i}")))
            .collect()
    }

    #[must_use]
    pub fn map_list(&self, count_key: &str, prefix: &str) -> Vec<&Metadata> {
        self.list(count_key, prefix)
            .into_iter()
            .filter_map(|v| match v {
                MetaValue::Map(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn string_list(&self, count_key: &str, prefix: &str) -> Vec<String> {
        self.list(count_key, prefix)
            .into_iter()
            .filter_map(|v| match v {
                MetaValue::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// ## Errors
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> InviteResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// ## Errors
    /// Returns an error if `json` is not a JSON object of tagged values.
    pub fn from_json(json: &str) -> InviteResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
