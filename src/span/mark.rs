//! Marks: named, ranged inline formatting over flat offsets

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Whether insertions exactly at a mark edge join the mark
///
/// The flat model owns this decision; the tree only ever sees the outcome
/// (the mark set reported on a splice patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expand {
    Before,
    #[default]
    After,
    Both,
    None,
}

impl Expand {
    /// Text inserted at the mark's start joins the mark
    pub fn grows_at_start(self) -> bool {
        matches!(self, Expand::Before | Expand::Both)
    }

    /// Text inserted at the mark's end joins the mark
    pub fn grows_at_end(self) -> bool {
        matches!(self, Expand::After | Expand::Both)
    }
}

/// A half-open flat range `[start, end)` plus its expand policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkRange {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub expand: Expand,
}

impl MarkRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            expand: Expand::default(),
        }
    }

    pub fn with_expand(mut self, expand: Expand) -> Self {
        self.expand = expand;
        self
    }

    /// Reject empty, inverted and out-of-bounds ranges
    pub fn validate(&self, length: usize) -> Result<()> {
        validate_range(self.start, self.end, length)
    }
}

pub(crate) fn validate_range(start: usize, end: usize, length: usize) -> Result<()> {
    if start >= end {
        return Err(SyncError::InvalidMarkRange { start, end });
    }
    if end > length {
        return Err(SyncError::MarkOutOfBounds { start, end, length });
    }
    Ok(())
}

/// A mark as read from the flat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub name: String,
    pub value: Value,
    pub start: usize,
    pub end: usize,
}

impl Mark {
    pub fn new(name: impl Into<String>, value: Value, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            value,
            start,
            end,
        }
    }

    pub fn validate(&self, length: usize) -> Result<()> {
        validate_range(self.start, self.end, length)
    }
}

/// The uniform set of marks active over one inline node
///
/// Keyed by mark name, so two marks with the same name can never both be
/// active; the later one replaces the earlier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkSet(BTreeMap<String, Value>);

impl MarkSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Set `name` to `value`, or remove it when `value` is null
    ///
    /// Returns true if the set changed.
    pub fn apply(&mut self, name: &str, value: &Value) -> bool {
        if value.is_null() {
            return self.0.remove(name).is_some();
        }
        if self.0.get(name) == Some(value) {
            return false;
        }
        self.0.insert(name.to_string(), value.clone());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Value)> for MarkSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }
}
