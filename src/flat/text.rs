//! FlatText: rope-backed flat document

use super::marks::{FlatMark, MarkTable};
use super::PLACEHOLDER;
use crate::error::{Result, SyncError};
use crate::patch::{text_path_with, Patch, Path, Prop};
use crate::reconcile::FlatOp;
use crate::span::{BlockMarker, Mark, MarkRange, Span, SpanSnapshot};
use ropey::Rope;
use serde_json::Value;

/// A single-replica flat document
///
/// Block markers live in the rope as [`PLACEHOLDER`] characters; their
/// descriptors are kept beside it, sorted by offset. Every mutation returns
/// the patch burst a replicated engine would emit for it.
///
/// # Example
///
/// ```rust
/// use spansync_core::flat::FlatText;
/// use spansync_core::span::BlockMarker;
///
/// let mut doc = FlatText::new();
/// doc.splice(0, 0, "Hello World").unwrap();
/// let burst = doc.split_block(5, BlockMarker::new("paragraph")).unwrap();
///
/// assert_eq!(burst.len(), 4);
/// assert_eq!(doc.to_plain_string(), "Hello\n World");
/// ```
#[derive(Debug, Clone)]
pub struct FlatText {
    rope: Rope,
    blocks: Vec<(usize, BlockMarker)>,
    marks: MarkTable,
    text_path: Vec<String>,
}

impl Default for FlatText {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatText {
    pub fn new() -> Self {
        Self::with_text_path(vec!["text".to_string()])
    }

    /// Empty document whose patches address `text_path`
    pub fn with_text_path(text_path: Vec<String>) -> Self {
        Self {
            rope: Rope::new(),
            blocks: Vec::new(),
            marks: MarkTable::default(),
            text_path,
        }
    }

    /// Load a document from spans and marks
    pub fn from_spans(spans: &[Span], marks: &[Mark]) -> Result<Self> {
        let mut doc = Self::new();
        let mut offset = 0;
        for span in spans {
            match span {
                Span::Text(content) => {
                    if content.contains(PLACEHOLDER) {
                        return Err(SyncError::InvalidSpan(
                            "text span contains the block placeholder".to_string(),
                        ));
                    }
                    doc.rope.insert(offset, content);
                }
                Span::Block(marker) => {
                    doc.rope.insert_char(offset, PLACEHOLDER);
                    doc.blocks.push((offset, marker.clone()));
                }
            }
            offset += span.flat_len();
        }
        for mark in marks {
            mark.validate(offset)?;
            doc.marks.set(FlatMark::new(
                mark.name.clone(),
                mark.value.clone(),
                MarkRange::new(mark.start, mark.end),
            ));
        }
        Ok(doc)
    }

    pub fn from_snapshot(snapshot: &SpanSnapshot) -> Result<Self> {
        Self::from_spans(&snapshot.spans, &snapshot.marks)
    }

    pub fn text_path(&self) -> &[String] {
        &self.text_path
    }

    /// Number of flat positions
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptor of the marker at `index`, if there is one
    pub fn block_at(&self, index: usize) -> Option<&BlockMarker> {
        self.block_slot(index).ok().map(|slot| &self.blocks[slot].1)
    }

    /// Markers with their offsets, in document order
    pub fn blocks(&self) -> impl Iterator<Item = (usize, &BlockMarker)> {
        self.blocks.iter().map(|(offset, block)| (*offset, block))
    }

    fn block_slot(&self, index: usize) -> Result<usize> {
        self.blocks
            .binary_search_by_key(&index, |(offset, _)| *offset)
            .map_err(|_| SyncError::NoBlockAt { offset: index })
    }

    fn path(&self, extra: impl IntoIterator<Item = Prop>) -> Path {
        text_path_with(&self.text_path, extra)
    }

    fn check_range(&self, index: usize, count: usize) -> Result<()> {
        let length = self.len();
        if index.checked_add(count).filter(|end| *end <= length).is_none() {
            return Err(SyncError::PositionOutOfRange {
                offset: index.saturating_add(count),
                length,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Delete `delete_count` items at `index`, then insert `text` there
    ///
    /// Deleted items may include block markers. Inserted text joins the marks
    /// whose expand policy reaches the insertion point; the resulting mark
    /// set travels on the splice patch.
    pub fn splice(&mut self, index: usize, delete_count: usize, text: &str) -> Result<Vec<Patch>> {
        self.check_range(index, delete_count)?;
        if text.contains(PLACEHOLDER) {
            return Err(SyncError::InvalidText(
                "inserted text contains the block placeholder".to_string(),
            ));
        }

        let mut burst = Vec::new();
        if delete_count > 0 {
            self.remove(index, delete_count);
            burst.push(Patch::Delete {
                path: self.path([Prop::from(index)]),
                length: delete_count,
            });
        }

        let inserted = text.chars().count();
        if inserted > 0 {
            self.rope.insert(index, text);
            self.shift_blocks(index, inserted as isize);
            self.marks.insert(index, inserted, true);
            burst.push(Patch::Splice {
                path: self.path(None),
                index,
                delete_count: 0,
                value: text.to_string(),
                marks: self.marks.active_over(index, index + inserted),
            });
        }
        Ok(burst)
    }

    /// Insert a block marker at `index`
    pub fn split_block(&mut self, index: usize, block: BlockMarker) -> Result<Vec<Patch>> {
        self.check_range(index, 0)?;
        self.rope.insert_char(index, PLACEHOLDER);
        self.shift_blocks(index, 1);
        let slot = self.blocks.partition_point(|(offset, _)| *offset < index);
        self.blocks.insert(slot, (index, block.clone()));
        self.marks.insert(index, 1, false);

        let field = |key: &str| self.path([Prop::from(index), Prop::from(key)]);
        let mut burst = vec![
            Patch::Insert {
                path: self.path([Prop::from(index)]),
                values: vec![Value::Object(Default::default())],
            },
            Patch::Put {
                path: field("type"),
                value: Value::String(block.block_type.clone()),
            },
            Patch::Put {
                path: field("parents"),
                value: Value::Array(Vec::new()),
            },
            Patch::Put {
                path: field("attrs"),
                value: Value::Object(Default::default()),
            },
        ];
        for (key, value) in &block.attrs {
            burst.push(Patch::Put {
                path: self.path([Prop::from(index), Prop::from("attrs"), Prop::key(key.clone())]),
                value: value.clone(),
            });
        }
        for (i, parent) in block.parents.iter().enumerate() {
            burst.push(Patch::Insert {
                path: self.path([Prop::from(index), Prop::from("parents"), Prop::from(i)]),
                values: vec![Value::String(parent.clone())],
            });
        }
        Ok(burst)
    }

    /// Remove the marker at `index`, merging its text into the block before
    pub fn join_block(&mut self, index: usize) -> Result<Vec<Patch>> {
        self.block_slot(index)?;
        self.splice(index, 1, "")
    }

    /// Replace the marker at `index`, emitting only the fields that changed
    pub fn update_block(&mut self, index: usize, block: BlockMarker) -> Result<Vec<Patch>> {
        let slot = self.block_slot(index)?;
        let old = std::mem::replace(&mut self.blocks[slot].1, block.clone());

        let mut burst = Vec::new();
        if old.block_type != block.block_type {
            burst.push(Patch::Put {
                path: self.path([Prop::from(index), Prop::from("type")]),
                value: Value::String(block.block_type.clone()),
            });
        }
        if old.parents != block.parents {
            burst.push(Patch::Put {
                path: self.path([Prop::from(index), Prop::from("parents")]),
                value: serde_json::json!(block.parents),
            });
        }
        for (key, value) in &block.attrs {
            if old.attrs.get(key) != Some(value) {
                burst.push(Patch::Put {
                    path: self.path([Prop::from(index), Prop::from("attrs"), Prop::key(key.clone())]),
                    value: value.clone(),
                });
            }
        }
        for key in old.attrs.keys().filter(|k| !block.attrs.contains_key(*k)) {
            burst.push(Patch::Delete {
                path: self.path([Prop::from(index), Prop::from("attrs"), Prop::key(key.clone())]),
                length: 1,
            });
        }
        Ok(burst)
    }

    /// Set mark `name` over `range`; a null value removes it
    pub fn mark(&mut self, range: MarkRange, name: &str, value: Value) -> Result<Vec<Patch>> {
        range.validate(self.len())?;
        if value.is_null() {
            return self.unmark(range, name);
        }
        self.marks.set(FlatMark::new(name, value.clone(), range));
        Ok(vec![Patch::Mark {
            path: self.path(None),
            name: name.to_string(),
            value,
            start: range.start,
            end: range.end,
        }])
    }

    pub fn unmark(&mut self, range: MarkRange, name: &str) -> Result<Vec<Patch>> {
        range.validate(self.len())?;
        self.marks.clear(name, range.start, range.end);
        Ok(vec![Patch::Mark {
            path: self.path(None),
            name: name.to_string(),
            value: Value::Null,
            start: range.start,
            end: range.end,
        }])
    }

    pub fn apply_op(&mut self, op: &FlatOp) -> Result<Vec<Patch>> {
        match op {
            FlatOp::Splice {
                index,
                delete_count,
                text,
            } => self.splice(*index, *delete_count, text),
            FlatOp::SplitBlock { index, block } => self.split_block(*index, block.clone()),
            FlatOp::UpdateBlock { index, block } => self.update_block(*index, block.clone()),
            FlatOp::Mark { range, name, value } => self.mark(*range, name, value.clone()),
            FlatOp::Unmark { range, name } => self.unmark(*range, name),
        }
    }

    fn remove(&mut self, index: usize, count: usize) {
        self.rope.remove(index..index + count);
        self.blocks
            .retain(|(offset, _)| *offset < index || *offset >= index + count);
        self.shift_blocks(index + count, -(count as isize));
        self.marks.delete(index, count);
    }

    /// Move every marker at or after `from` by `delta`
    fn shift_blocks(&mut self, from: usize, delta: isize) {
        for (offset, _) in self.blocks.iter_mut().filter(|(offset, _)| *offset >= from) {
            *offset = offset.saturating_add_signed(delta);
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn spans(&self) -> Vec<Span> {
        let mut spans = Vec::with_capacity(self.blocks.len() * 2 + 1);
        let mut at = 0;
        for (offset, block) in &self.blocks {
            if *offset > at {
                spans.push(Span::Text(self.rope.slice(at..*offset).to_string()));
            }
            spans.push(Span::Block(block.clone()));
            at = offset + 1;
        }
        if at < self.len() {
            spans.push(Span::Text(self.rope.slice(at..).to_string()));
        }
        spans
    }

    /// Stored marks, ordered by start; structured values stay encoded
    pub fn marks(&self) -> Vec<Mark> {
        let mut marks: Vec<Mark> = self.marks.iter().map(FlatMark::to_mark).collect();
        marks.sort_by(|a, b| (a.start, &a.name).cmp(&(b.start, &b.name)));
        marks
    }

    pub fn snapshot(&self) -> SpanSnapshot {
        SpanSnapshot {
            spans: self.spans(),
            marks: self.marks(),
        }
    }

    /// Characters without markers
    pub fn visible_text(&self) -> String {
        self.rope.chars().filter(|c| *c != PLACEHOLDER).collect()
    }

    /// Characters with every marker rendered as a newline
    pub fn to_plain_string(&self) -> String {
        self.rope
            .chars()
            .map(|c| if c == PLACEHOLDER { '\n' } else { c })
            .collect()
    }
}
