//! Mark ranges of the reference flat model and how edits move them

use crate::span::{Expand, Mark, MarkRange, MarkSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored mark: a [`Mark`] plus its expand policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatMark {
    pub name: String,
    pub value: Value,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub expand: Expand,
}

impl FlatMark {
    pub fn new(name: impl Into<String>, value: Value, range: MarkRange) -> Self {
        Self {
            name: name.into(),
            value,
            start: range.start,
            end: range.end,
            expand: range.expand,
        }
    }

    pub fn to_mark(&self) -> Mark {
        Mark::new(self.name.clone(), self.value.clone(), self.start, self.end)
    }

    /// Move the range for `len` items inserted at `at`
    ///
    /// `grow` is false for block markers, which never extend a mark at its
    /// edges.
    fn shift_for_insert(&mut self, at: usize, len: usize, grow: bool) {
        let grows_at_start = grow && self.expand.grows_at_start();
        let grows_at_end = grow && self.expand.grows_at_end();
        if at < self.start || (at == self.start && !grows_at_start) {
            self.start += len;
            self.end += len;
        } else if at < self.end || (at == self.end && grows_at_end) {
            self.end += len;
        }
    }

    fn shift_for_delete(&mut self, at: usize, len: usize) {
        let cut = |pos: usize| {
            if pos >= at + len {
                pos - len
            } else {
                pos.min(at)
            }
        };
        self.start = cut(self.start);
        self.end = cut(self.end);
    }
}

/// All marks of a flat document, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct MarkTable {
    marks: Vec<FlatMark>,
}

impl MarkTable {
    pub(super) fn iter(&self) -> impl Iterator<Item = &FlatMark> {
        self.marks.iter()
    }

    pub(super) fn insert(&mut self, at: usize, len: usize, grow: bool) {
        for mark in &mut self.marks {
            mark.shift_for_insert(at, len, grow);
        }
    }

    pub(super) fn delete(&mut self, at: usize, len: usize) {
        for mark in &mut self.marks {
            mark.shift_for_delete(at, len);
        }
        self.marks.retain(|m| m.start < m.end);
    }

    /// Marks covering every position of `[start, end)`
    pub(super) fn active_over(&self, start: usize, end: usize) -> MarkSet {
        self.marks
            .iter()
            .filter(|m| m.start <= start && end <= m.end)
            .map(|m| (m.name.clone(), m.value.clone()))
            .collect()
    }

    /// Clear `name` over a range, splitting marks that straddle it
    pub(super) fn clear(&mut self, name: &str, start: usize, end: usize) {
        let mut kept = Vec::with_capacity(self.marks.len());
        for mark in self.marks.drain(..) {
            if mark.name != name || mark.end <= start || mark.start >= end {
                kept.push(mark);
                continue;
            }
            if mark.start < start {
                kept.push(FlatMark {
                    end: start,
                    ..mark.clone()
                });
            }
            if mark.end > end {
                kept.push(FlatMark { start: end, ..mark });
            }
        }
        self.marks = kept;
    }

    /// Set `mark`, replacing whatever same-name mark covered its range
    pub(super) fn set(&mut self, mark: FlatMark) {
        self.clear(&mark.name, mark.start, mark.end);
        let mut merged = mark;
        self.marks.retain(|other| {
            let touches = other.name == merged.name
                && other.value == merged.value
                && other.start <= merged.end
                && merged.start <= other.end;
            if touches {
                merged.start = merged.start.min(other.start);
                merged.end = merged.end.max(other.end);
            }
            !touches
        });
        self.marks.push(merged);
    }
}
