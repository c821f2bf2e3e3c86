//! Inline-level edits on text blocks
//!
//! Offsets here are local: chars from the start of a text block's content.
//! Every edit leaves the block's inlines non-empty with distinct mark sets
//! between neighbours, and marks the position index stale from the block
//! onwards.

use super::document::DocumentTree;
use super::node::{byte_offset, InlineNode, NodeId};
use crate::error::{Result, SyncError};
use crate::span::MarkSet;
use serde_json::Value;

/// Where a local offset falls among a block's inlines
enum Location {
    /// Strictly inside inline `index`, `local` chars in
    Inside { index: usize, local: usize },
    /// Between inline `index - 1` and inline `index`
    Boundary { index: usize },
}

impl DocumentTree {
    /// Inline runs of a text block with their local start offsets
    pub fn inline_runs(&self, block: NodeId) -> Vec<(usize, NodeId)> {
        let mut runs = Vec::new();
        let mut acc = 0;
        if let Some(block) = self.block(block) {
            for id in &block.inlines {
                runs.push((acc, *id));
                acc += self.inline(*id).map_or(0, InlineNode::len);
            }
        }
        runs
    }

    fn locate(&self, block: NodeId, at: usize) -> Result<Location> {
        let node = self.block_ref(block)?;
        if at > node.text_len {
            return Err(SyncError::PositionOutOfRange {
                offset: at,
                length: node.text_len,
            });
        }
        let mut acc = 0;
        for (index, id) in node.inlines.iter().enumerate() {
            if acc == at {
                return Ok(Location::Boundary { index });
            }
            let len = self.inline(*id).map_or(0, InlineNode::len);
            if at < acc + len {
                return Ok(Location::Inside {
                    index,
                    local: at - acc,
                });
            }
            acc += len;
        }
        Ok(Location::Boundary {
            index: node.inlines.len(),
        })
    }

    /// Mark the index stale from `block`'s slot
    ///
    /// A block whose cached slot no longer matches sits after an entry that
    /// was inserted or removed, so the index is already stale from there.
    pub(crate) fn touch(&mut self, block: NodeId) {
        if let Some(slot) = self.slot_of(block) {
            self.invalidate_from(slot);
        }
    }

    /// Make `at` an inline boundary and return the index of the inline after it
    pub(crate) fn split_inlines_at(&mut self, block: NodeId, at: usize) -> Result<usize> {
        match self.locate(block, at)? {
            Location::Boundary { index } => Ok(index),
            Location::Inside { index, local } => {
                let id = self.block_ref(block)?.inlines[index];
                let inline = self.inline_mut(id)?;
                let cut = byte_offset(&inline.text, local);
                let tail = inline.text.split_off(cut);
                let head = std::mem::take(&mut inline.text);
                inline.set_text(head);
                let marks = inline.marks.clone();

                let tail_id = self.alloc_inline(block, InlineNode::new(tail, marks));
                self.block_mut(block)?.inlines.insert(index + 1, tail_id);
                Ok(index + 1)
            }
        }
    }

    /// Insert `text` carrying `marks` at local offset `at`
    ///
    /// Edits an existing inline in place when one with the same marks covers
    /// or touches the insertion point; otherwise splits and adds a node.
    pub(crate) fn insert_text(
        &mut self,
        block: NodeId,
        at: usize,
        text: &str,
        marks: &MarkSet,
    ) -> Result<()> {
        let added = text.chars().count();
        if added == 0 {
            return Ok(());
        }

        let index = match self.locate(block, at)? {
            Location::Inside { index, local } => {
                let id = self.block_ref(block)?.inlines[index];
                let inline = self.inline_mut(id)?;
                if &inline.marks == marks {
                    let mut content = std::mem::take(&mut inline.text);
                    content.insert_str(byte_offset(&content, local), text);
                    inline.set_text(content);
                    self.finish_text_edit(block, added as isize)?;
                    return Ok(());
                }
                self.split_inlines_at(block, at)?
            }
            Location::Boundary { index } => index,
        };

        let inlines = &self.block_ref(block)?.inlines;
        let left = index.checked_sub(1).and_then(|i| inlines.get(i)).copied();
        let right = inlines.get(index).copied();

        if let Some(left) = left.filter(|id| self.inline(*id).is_some_and(|i| &i.marks == marks)) {
            let inline = self.inline_mut(left)?;
            let mut content = std::mem::take(&mut inline.text);
            content.push_str(text);
            inline.set_text(content);
        } else if let Some(right) =
            right.filter(|id| self.inline(*id).is_some_and(|i| &i.marks == marks))
        {
            let inline = self.inline_mut(right)?;
            let mut content = text.to_string();
            content.push_str(&inline.text);
            inline.set_text(content);
        } else {
            let id = self.alloc_inline(block, InlineNode::new(text, marks.clone()));
            self.block_mut(block)?.inlines.insert(index, id);
        }

        self.finish_text_edit(block, added as isize)
    }

    /// Remove `count` chars starting at local offset `at`
    pub(crate) fn delete_text(&mut self, block: NodeId, at: usize, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let length = self.block_ref(block)?.text_len;
        if at + count > length {
            return Err(SyncError::PositionOutOfRange {
                offset: at + count,
                length,
            });
        }

        // Within one inline: cut in place
        let (index, local) = match self.locate(block, at)? {
            Location::Inside { index, local } => (index, local),
            Location::Boundary { index } => (index, 0),
        };
        if let Some(id) = self.block_ref(block)?.inlines.get(index).copied() {
            let inline = self.inline_mut(id)?;
            if local + count <= inline.len {
                let from = byte_offset(&inline.text, local);
                let to = byte_offset(&inline.text, local + count);
                let mut content = std::mem::take(&mut inline.text);
                content.replace_range(from..to, "");
                inline.set_text(content);
                self.normalize_inlines(block)?;
                return self.finish_text_edit(block, -(count as isize));
            }
        }

        let start = self.split_inlines_at(block, at)?;
        let end = self.split_inlines_at(block, at + count)?;
        let removed: Vec<NodeId> = self.block_mut(block)?.inlines.drain(start..end).collect();
        for id in removed {
            self.remove_node(id);
        }
        self.normalize_inlines(block)?;
        self.finish_text_edit(block, -(count as isize))
    }

    fn finish_text_edit(&mut self, block: NodeId, delta: isize) -> Result<()> {
        let node = self.block_mut(block)?;
        node.text_len = node.text_len.checked_add_signed(delta).ok_or_else(|| {
            SyncError::InvalidText(format!("text length of {} underflowed", block))
        })?;
        self.touch(block);
        Ok(())
    }

    /// Drop empty inlines and merge neighbours with equal marks (left wins)
    pub(crate) fn normalize_inlines(&mut self, block: NodeId) -> Result<()> {
        let inlines = std::mem::take(&mut self.block_mut(block)?.inlines);
        let mut kept: Vec<NodeId> = Vec::with_capacity(inlines.len());

        for id in inlines {
            let Some(inline) = self.inline(id) else {
                continue;
            };
            if inline.is_empty() {
                self.remove_node(id);
                continue;
            }
            let merge_into = kept
                .last()
                .copied()
                .filter(|prev| self.inline(*prev).is_some_and(|p| p.marks == inline.marks));
            match merge_into {
                Some(prev) => {
                    let tail = self
                        .remove_node(id)
                        .and_then(|n| n.as_inline().map(|i| i.text.clone()))
                        .unwrap_or_default();
                    let target = self.inline_mut(prev)?;
                    let mut content = std::mem::take(&mut target.text);
                    content.push_str(&tail);
                    target.set_text(content);
                }
                None => kept.push(id),
            }
        }

        self.block_mut(block)?.inlines = kept;
        Ok(())
    }

    /// Detach every inline from local offset `at` to the end of the block
    pub(crate) fn take_inlines_from(&mut self, block: NodeId, at: usize) -> Result<Vec<NodeId>> {
        let index = self.split_inlines_at(block, at)?;
        let node = self.block_mut(block)?;
        let taken: Vec<NodeId> = node.inlines.drain(index..).collect();
        let moved = node.text_len - at;
        node.text_len = at;
        self.touch(block);
        debug_assert_eq!(
            moved,
            taken.iter().map(|id| self.inline(*id).map_or(0, InlineNode::len)).sum::<usize>()
        );
        Ok(taken)
    }

    /// Append detached inlines to the end of `block`
    pub(crate) fn append_inlines(&mut self, block: NodeId, inlines: Vec<NodeId>) -> Result<()> {
        let mut added = 0;
        for id in &inlines {
            added += self.inline(*id).map_or(0, InlineNode::len);
            self.set_parent(*id, Some(block));
        }
        let node = self.block_mut(block)?;
        node.inlines.extend(inlines);
        node.text_len += added;
        self.normalize_inlines(block)?;
        self.touch(block);
        Ok(())
    }

    /// Set (or with null, remove) mark `name` over local range `[from, to)`
    ///
    /// Returns whether any inline changed.
    pub(crate) fn apply_mark(
        &mut self,
        block: NodeId,
        from: usize,
        to: usize,
        name: &str,
        value: &Value,
    ) -> Result<bool> {
        if from >= to {
            return Ok(false);
        }
        let start = self.split_inlines_at(block, from)?;
        let end = self.split_inlines_at(block, to)?;

        let ids: Vec<NodeId> = self.block_ref(block)?.inlines[start..end].to_vec();
        let mut changed = false;
        for id in ids {
            changed |= self.inline_mut(id)?.marks.apply(name, value);
        }
        self.normalize_inlines(block)?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::span::{Mark, Span};
    use crate::tree::build;
    use serde_json::json;

    fn strong() -> MarkSet {
        let mut set = MarkSet::new();
        set.insert("strong", json!(true));
        set
    }

    fn runs(tree: &DocumentTree, block: NodeId) -> Vec<(String, bool)> {
        tree.block(block)
            .unwrap()
            .inlines
            .iter()
            .map(|id| {
                let inline = tree.inline(*id).unwrap();
                (inline.text.clone(), inline.marks.contains("strong"))
            })
            .collect()
    }

    fn hello_world() -> (DocumentTree, NodeId) {
        let marks = vec![Mark::new("strong", json!(true), 6, 11)];
        let tree = build(&[Span::text("Hello World")], &marks, &EngineConfig::default()).unwrap();
        let block = tree.text_blocks()[0];
        (tree, block)
    }

    #[test]
    fn test_insert_in_place_keeps_identity() {
        let (mut tree, block) = hello_world();
        let first = tree.block(block).unwrap().inlines[0];

        tree.insert_text(block, 2, "y", &MarkSet::new()).unwrap();
        assert_eq!(tree.block(block).unwrap().inlines[0], first);
        assert_eq!(runs(&tree, block)[0], ("Heyllo ".to_string(), false));
        assert_eq!(tree.block(block).unwrap().text_len(), 12);
    }

    #[test]
    fn test_insert_at_boundary_joins_matching_neighbour() {
        let (mut tree, block) = hello_world();
        tree.insert_text(block, 6, "Strong", &strong()).unwrap();
        assert_eq!(
            runs(&tree, block),
            vec![("Hello ".to_string(), false), ("StrongWorld".to_string(), true)]
        );
    }

    #[test]
    fn test_insert_with_new_marks_splits() {
        let (mut tree, block) = hello_world();
        tree.insert_text(block, 2, "X", &strong()).unwrap();
        assert_eq!(
            runs(&tree, block),
            vec![
                ("He".to_string(), false),
                ("X".to_string(), true),
                ("llo ".to_string(), false),
                ("World".to_string(), true),
            ]
        );
        assert!(tree.invariant_violations().is_empty());
    }

    #[test]
    fn test_delete_across_runs_merges_junction() {
        let (mut tree, block) = hello_world();
        tree.insert_text(block, 11, "!", &MarkSet::new()).unwrap();
        // "Hello " "World" "!" -> delete "World"
        tree.delete_text(block, 6, 5).unwrap();
        assert_eq!(runs(&tree, block), vec![("Hello !".to_string(), false)]);
        assert!(tree.invariant_violations().is_empty());
    }

    #[test]
    fn test_delete_out_of_range() {
        let (mut tree, block) = hello_world();
        let err = tree.delete_text(block, 8, 10).unwrap_err();
        assert!(matches!(err, SyncError::PositionOutOfRange { .. }));
    }

    #[test]
    fn test_apply_mark_splits_and_merges() {
        let (mut tree, block) = hello_world();
        assert!(tree.apply_mark(block, 0, 6, "strong", &json!(true)).unwrap());
        assert_eq!(runs(&tree, block), vec![("Hello World".to_string(), true)]);

        assert!(tree.apply_mark(block, 3, 5, "strong", &serde_json::Value::Null).unwrap());
        assert_eq!(
            runs(&tree, block),
            vec![
                ("Hel".to_string(), true),
                ("lo".to_string(), false),
                (" World".to_string(), true),
            ]
        );
        assert!(!tree.apply_mark(block, 3, 5, "strong", &serde_json::Value::Null).unwrap());
    }

    #[test]
    fn test_take_and_append_inlines() {
        let (mut tree, block) = hello_world();
        let taken = tree.take_inlines_from(block, 8).unwrap();
        assert_eq!(tree.block(block).unwrap().text_len(), 8);
        assert_eq!(runs(&tree, block), vec![("Hello ".to_string(), false), ("Wo".to_string(), true)]);

        tree.append_inlines(block, taken).unwrap();
        assert_eq!(runs(&tree, block), vec![("Hello ".to_string(), false), ("World".to_string(), true)]);
        assert_eq!(tree.block(block).unwrap().text_len(), 11);
    }
}
