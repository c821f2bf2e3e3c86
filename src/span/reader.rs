//! Span Model Reader
//!
//! Walks a span sequence left to right, attaching flat offsets, and resolves
//! which marks are active over each run of text. Marks are sorted once by
//! start offset and consumed by a cursor, so a full pass costs
//! O(spans + marks) rather than rescanning the mark list per run.

use super::mark::{Mark, MarkSet};
use super::marker::{BlockMarker, Span};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A span together with the flat offset it starts at
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanEvent<'a> {
    Block {
        offset: usize,
        marker: &'a BlockMarker,
    },
    Text {
        offset: usize,
        content: &'a str,
    },
}

impl SpanEvent<'_> {
    pub fn offset(&self) -> usize {
        match self {
            SpanEvent::Block { offset, .. } | SpanEvent::Text { offset, .. } => *offset,
        }
    }
}

/// Iterator over spans with their flat offsets; empty text spans are skipped
pub struct SpanReader<'a> {
    spans: std::slice::Iter<'a, Span>,
    offset: usize,
}

impl<'a> SpanReader<'a> {
    pub fn new(spans: &'a [Span]) -> Self {
        Self {
            spans: spans.iter(),
            offset: 0,
        }
    }

    /// Flat offset just past the last span read so far
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for SpanReader<'a> {
    type Item = SpanEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offset = self.offset;
            match self.spans.next()? {
                Span::Text(content) => {
                    if content.is_empty() {
                        continue;
                    }
                    self.offset += content.chars().count();
                    return Some(SpanEvent::Text { offset, content });
                }
                Span::Block(marker) => {
                    self.offset += 1;
                    return Some(SpanEvent::Block { offset, marker });
                }
            }
        }
    }
}

/// Total number of flat positions covered by `spans`
pub fn flat_length(spans: &[Span]) -> usize {
    spans.iter().map(Span::flat_len).sum()
}

/// Visible text of `spans` (block markers contribute nothing)
pub fn visible_text(spans: &[Span]) -> String {
    spans
        .iter()
        .filter_map(|span| match span {
            Span::Text(content) => Some(content.as_str()),
            Span::Block(_) => None,
        })
        .collect()
}

/// A full snapshot of the flat model: spans plus the marks over them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanSnapshot {
    pub spans: Vec<Span>,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

impl SpanSnapshot {
    pub fn flat_len(&self) -> usize {
        flat_length(&self.spans)
    }
}

/// Parse a span snapshot from JSON
///
/// Accepts either `{"spans": [...], "marks": [...]}` or the bare span array a
/// replicated engine emits, where text spans may carry their active marks
/// inline (`{"type": "text", "value": "Hi", "marks": {"strong": true}}`).
/// Inline marks are lifted into ranges; consecutive text spans carrying the
/// same mark extend one range.
pub fn parse_spans(value: &Value) -> Result<SpanSnapshot> {
    let (items, mut marks) = match value {
        Value::Array(items) => (items, Vec::new()),
        Value::Object(obj) => {
            let items = obj
                .get("spans")
                .and_then(Value::as_array)
                .ok_or_else(|| SyncError::InvalidSpan("missing 'spans' array".to_string()))?;
            let marks = match obj.get("marks") {
                Some(raw) => serde_json::from_value::<Vec<Mark>>(raw.clone())
                    .map_err(|e| SyncError::InvalidSpan(format!("bad marks: {}", e)))?,
                None => Vec::new(),
            };
            (items, marks)
        }
        _ => {
            return Err(SyncError::InvalidSpan(
                "expected an array of spans".to_string(),
            ))
        }
    };

    let mut spans = Vec::with_capacity(items.len());
    let mut offset = 0;
    for item in items {
        let kind = item
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::InvalidSpan(format!("span without type: {}", item)))?;
        match kind {
            "text" => {
                let content = item
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SyncError::InvalidSpan(format!("text span without value: {}", item)))?;
                let len = content.chars().count();
                if let Some(inline) = item.get("marks") {
                    let inline = inline.as_object().ok_or_else(|| {
                        SyncError::InvalidSpan(format!("marks must be an object: {}", inline))
                    })?;
                    for (name, mark_value) in inline {
                        if mark_value.is_null() || len == 0 {
                            continue;
                        }
                        extend_or_push(&mut marks, name, mark_value, offset, offset + len);
                    }
                }
                spans.push(Span::Text(content.to_string()));
                offset += len;
            }
            "block" => {
                let raw = item.get("value").cloned().unwrap_or(Value::Null);
                let marker: BlockMarker = serde_json::from_value(raw)
                    .map_err(|e| SyncError::InvalidSpan(format!("bad block marker: {}", e)))?;
                spans.push(Span::Block(marker));
                offset += 1;
            }
            other => {
                return Err(SyncError::InvalidSpan(format!(
                    "unknown span type '{}'",
                    other
                )))
            }
        }
    }

    Ok(SpanSnapshot { spans, marks })
}

fn extend_or_push(marks: &mut Vec<Mark>, name: &str, value: &Value, start: usize, end: usize) {
    if let Some(existing) = marks
        .iter_mut()
        .rev()
        .find(|m| m.name == name && m.end == start && &m.value == value)
    {
        existing.end = end;
        return;
    }
    marks.push(Mark::new(name, value.clone(), start, end));
}

/// Cursor over marks sorted by start offset
///
/// `seek` must be called with non-decreasing offsets.
#[derive(Debug, Clone)]
pub struct MarkCursor {
    pending: Vec<Mark>,
    next: usize,
    active: Vec<Mark>,
    position: usize,
}

impl MarkCursor {
    pub fn new(mut marks: Vec<Mark>) -> Self {
        // Stable: marks starting at the same offset keep their input order,
        // so a later mark of the same name still wins.
        marks.sort_by_key(|m| m.start);
        Self {
            pending: marks,
            next: 0,
            active: Vec::new(),
            position: 0,
        }
    }

    /// Marks active at `offset`, and the next offset where that set may change
    pub fn seek(&mut self, offset: usize) -> (MarkSet, Option<usize>) {
        debug_assert!(offset >= self.position, "mark cursor moved backwards");
        self.position = offset;

        self.active.retain(|m| m.end > offset);
        while let Some(mark) = self.pending.get(self.next) {
            if mark.start > offset {
                break;
            }
            if mark.end > offset {
                self.active.push(mark.clone());
            }
            self.next += 1;
        }

        let mut set = MarkSet::new();
        for mark in &self.active {
            set.apply(&mark.name, &mark.value);
        }

        let next_start = self.pending.get(self.next).map(|m| m.start);
        let next_end = self.active.iter().map(|m| m.end).min();
        let boundary = match (next_start, next_end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        (set, boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reader_offsets() {
        let spans = vec![
            Span::text("Hello"),
            Span::block(BlockMarker::new("paragraph")),
            Span::text(""),
            Span::text("World"),
        ];
        let events: Vec<_> = SpanReader::new(&spans).collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].offset(), 0);
        assert_eq!(events[1].offset(), 5);
        assert_eq!(events[2].offset(), 6);
        assert_eq!(flat_length(&spans), 11);
        assert_eq!(visible_text(&spans), "HelloWorld");
    }

    #[test]
    fn test_parse_inline_marks() {
        let json = json!([
            {"type": "text", "value": "Hello "},
            {"type": "text", "value": "Wor", "marks": {"strong": true}},
            {"type": "text", "value": "ld", "marks": {"strong": true, "em": true}},
            {"type": "block", "value": {"type": "paragraph", "parents": [], "attrs": {}}},
            {"type": "text", "value": "!"}
        ]);
        let snapshot = parse_spans(&json).unwrap();
        assert_eq!(snapshot.spans.len(), 5);
        assert_eq!(snapshot.flat_len(), 13);
        assert_eq!(
            snapshot.marks,
            vec![
                Mark::new("strong", json!(true), 6, 11),
                Mark::new("em", json!(true), 9, 11),
            ]
        );
    }

    #[test]
    fn test_parse_object_form() {
        let json = json!({
            "spans": [{"type": "text", "value": "Hello World"}],
            "marks": [{"name": "strong", "value": true, "start": 6, "end": 11}]
        });
        let snapshot = parse_spans(&json).unwrap();
        assert_eq!(snapshot.marks, vec![Mark::new("strong", json!(true), 6, 11)]);
    }

    #[test]
    fn test_parse_rejects_unknown_span() {
        let err = parse_spans(&json!([{"type": "image", "value": {}}])).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSpan(_)));
    }

    #[test]
    fn test_mark_cursor_boundaries() {
        let mut cursor = MarkCursor::new(vec![
            Mark::new("em", json!(true), 4, 8),
            Mark::new("strong", json!(true), 2, 6),
        ]);

        let (set, boundary) = cursor.seek(0);
        assert!(set.is_empty());
        assert_eq!(boundary, Some(2));

        let (set, boundary) = cursor.seek(2);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["strong"]);
        assert_eq!(boundary, Some(4));

        let (set, boundary) = cursor.seek(4);
        assert_eq!(set.len(), 2);
        assert_eq!(boundary, Some(6));

        let (set, boundary) = cursor.seek(6);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["em"]);
        assert_eq!(boundary, Some(8));

        let (set, boundary) = cursor.seek(8);
        assert!(set.is_empty());
        assert_eq!(boundary, None);
    }

    #[test]
    fn test_mark_cursor_later_mark_wins() {
        let mut cursor = MarkCursor::new(vec![
            Mark::new("link", json!("a"), 0, 4),
            Mark::new("link", json!("b"), 2, 4),
        ]);
        let (set, _) = cursor.seek(2);
        assert_eq!(set.get("link"), Some(&json!("b")));
    }
}
