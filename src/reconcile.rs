//! Local Edit Reconciliation
//!
//! Turns edit intents expressed against the tree (what the presentation layer
//! knows about) into operations on the flat model. Translation is pure: the
//! tree only changes later, when the flat model's patch burst comes back
//! through the applier.

use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::position::{PositionMapper, TreePosition};
use crate::span::{BlockMarker, MarkCodec, MarkRange};
use crate::tree::{BlockNode, BlockOrigin, DocumentTree, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

fn mark_on() -> Value {
    Value::Bool(true)
}

/// An edit the presentation layer wants to make
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditIntent {
    InsertText {
        at: TreePosition,
        text: String,
    },
    /// Delete everything between two positions
    Delete {
        from: TreePosition,
        to: TreePosition,
    },
    /// Backspace: one grapheme, or join with the previous block at its start
    DeleteBackward {
        at: TreePosition,
    },
    /// Remove the mark if the whole range has it, otherwise apply it
    ToggleMark {
        from: TreePosition,
        to: TreePosition,
        name: String,
        #[serde(default = "mark_on")]
        value: Value,
    },
    /// Set a mark value over a range; `null` removes the mark
    SetMark {
        from: TreePosition,
        to: TreePosition,
        name: String,
        value: Value,
    },
    /// Enter: start a new block at a position
    SplitBlock {
        at: TreePosition,
        #[serde(default)]
        block: Option<BlockMarker>,
    },
    /// Merge a block's text into the text block before it
    JoinBlocks {
        block: NodeId,
    },
    /// Retype or re-attribute a block
    ChangeBlock {
        block: NodeId,
        #[serde(rename = "blockType")]
        block_type: String,
        #[serde(default)]
        attrs: Map<String, Value>,
        #[serde(default)]
        parents: Option<Vec<String>>,
    },
}

/// An operation on the flat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FlatOp {
    Splice {
        index: usize,
        #[serde(rename = "deleteCount")]
        delete_count: usize,
        text: String,
    },
    /// Insert a block marker at `index`
    SplitBlock { index: usize, block: BlockMarker },
    /// Replace the marker at `index`
    UpdateBlock { index: usize, block: BlockMarker },
    Mark {
        range: MarkRange,
        name: String,
        value: Value,
    },
    Unmark { range: MarkRange, name: String },
}

pub struct Reconciler<'a> {
    tree: &'a DocumentTree,
    mapper: PositionMapper<'a>,
    codec: MarkCodec,
    default_block_type: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(tree: &'a DocumentTree, config: &'a EngineConfig) -> Self {
        Self {
            tree,
            mapper: PositionMapper::new(tree, config.boundary_affinity),
            codec: config.codec(),
            default_block_type: &config.default_block_type,
        }
    }

    pub fn translate(&self, intent: &EditIntent) -> Result<Vec<FlatOp>> {
        match intent {
            EditIntent::InsertText { at, text } => {
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![FlatOp::Splice {
                    index: self.mapper.text_offset(at)?,
                    delete_count: 0,
                    text: text.clone(),
                }])
            }
            EditIntent::Delete { from, to } => {
                let (start, end) = self.range(from, to)?;
                if start == end {
                    return Ok(Vec::new());
                }
                Ok(vec![FlatOp::Splice {
                    index: start,
                    delete_count: end - start,
                    text: String::new(),
                }])
            }
            EditIntent::DeleteBackward { at } => self.delete_backward(at),
            EditIntent::ToggleMark {
                from,
                to,
                name,
                value,
            } => {
                let (start, end) = self.range(from, to)?;
                if start == end {
                    return Ok(Vec::new());
                }
                if self.mark_covers(name, start, end)? {
                    Ok(vec![FlatOp::Unmark {
                        range: MarkRange::new(start, end),
                        name: name.clone(),
                    }])
                } else {
                    Ok(vec![self.set_mark(name, value, start, end)])
                }
            }
            EditIntent::SetMark {
                from,
                to,
                name,
                value,
            } => {
                let (start, end) = self.range(from, to)?;
                if start == end {
                    return Ok(Vec::new());
                }
                Ok(vec![self.set_mark(name, value, start, end)])
            }
            EditIntent::SplitBlock { at, block } => {
                let index = self.mapper.text_offset(at)?;
                let block = match block {
                    Some(block) => block.clone(),
                    None => self.continuation(index)?,
                };
                Ok(vec![FlatOp::SplitBlock { index, block }])
            }
            EditIntent::JoinBlocks { block } => {
                let (slot, node) = self.text_block(*block)?;
                if node.origin != BlockOrigin::Marker {
                    return Err(SyncError::NotAddressable(*block));
                }
                Ok(vec![FlatOp::Splice {
                    index: self.tree.entry_start(slot),
                    delete_count: 1,
                    text: String::new(),
                }])
            }
            EditIntent::ChangeBlock {
                block,
                block_type,
                attrs,
                parents,
            } => {
                let (slot, node) = self.text_block(*block)?;
                let marker = BlockMarker {
                    block_type: block_type.clone(),
                    parents: parents.clone().unwrap_or_else(|| node.parents.clone()),
                    attrs: attrs.clone(),
                };
                let index = self.tree.entry_start(slot);
                Ok(vec![match node.origin {
                    BlockOrigin::Marker => FlatOp::UpdateBlock {
                        index,
                        block: marker,
                    },
                    // Leading text has no marker to update; giving it one
                    // moves the text into the new block.
                    _ => FlatOp::SplitBlock {
                        index,
                        block: marker,
                    },
                }])
            }
        }
    }

    /// Ordered flat text offsets of two positions
    fn range(&self, from: &TreePosition, to: &TreePosition) -> Result<(usize, usize)> {
        let a = self.mapper.text_offset(from)?;
        let b = self.mapper.text_offset(to)?;
        Ok((a.min(b), a.max(b)))
    }

    fn set_mark(&self, name: &str, value: &Value, start: usize, end: usize) -> FlatOp {
        let range = MarkRange::new(start, end);
        if value.is_null() {
            return FlatOp::Unmark {
                range,
                name: name.to_string(),
            };
        }
        FlatOp::Mark {
            range,
            name: name.to_string(),
            value: self.codec.encode(name, value),
        }
    }

    fn delete_backward(&self, at: &TreePosition) -> Result<Vec<FlatOp>> {
        let index = self.mapper.text_offset(at)?;
        let Some(slot) = self.tree.entry_for_content(index) else {
            return Ok(Vec::new());
        };
        let block = self.tree.text_blocks()[slot];
        let local = index - self.tree.content_start(slot);

        if local == 0 {
            if self.tree.block_ref(block)?.origin != BlockOrigin::Marker {
                return Ok(Vec::new());
            }
            return Ok(vec![FlatOp::Splice {
                index: index - 1,
                delete_count: 1,
                text: String::new(),
            }]);
        }

        let text = self.tree.block_text(block).unwrap_or_default();
        let byte = crate::tree::byte_offset(&text, local);
        let width = text[..byte]
            .grapheme_indices(true)
            .next_back()
            .map_or(1, |(start, _)| text[start..byte].chars().count());
        Ok(vec![FlatOp::Splice {
            index: index - width,
            delete_count: width,
            text: String::new(),
        }])
    }

    /// Whether every character in `[start, end)` carries mark `name`
    ///
    /// A range holding no text at all counts as unmarked.
    fn mark_covers(&self, name: &str, start: usize, end: usize) -> Result<bool> {
        let mut seen_text = false;
        let mut slot = self.tree.entry_at_or_before(start);
        while slot < self.tree.text_blocks().len() && self.tree.entry_start(slot) < end {
            let content_start = self.tree.content_start(slot);
            let block = self.tree.text_blocks()[slot];
            for (run_start, id) in self.tree.inline_runs(block) {
                let inline = self.tree.inline(id).ok_or(SyncError::UnknownNode(id))?;
                let from = content_start + run_start;
                let to = from + inline.len();
                if from.max(start) < to.min(end) {
                    seen_text = true;
                    if !inline.marks.contains(name) {
                        return Ok(false);
                    }
                }
            }
            slot += 1;
        }
        Ok(seen_text)
    }

    /// Marker for a block split off at `index` when none was given
    ///
    /// Keeps the nesting of the block being split so Enter inside a list item
    /// yields another item in the same list.
    fn continuation(&self, index: usize) -> Result<BlockMarker> {
        let slot = self.tree.entry_for_content(index).unwrap_or(0);
        let current = self.tree.entry(slot)?;
        let mut marker = BlockMarker::new(current.block_type.clone());
        marker.parents = current.parents.clone();
        if current.origin == BlockOrigin::Implicit || current.parents.is_empty() {
            marker.block_type = self.default_block_type.to_string();
        }
        Ok(marker)
    }

    fn text_block(&self, block: NodeId) -> Result<(usize, &'a BlockNode)> {
        let node = self.tree.block(block).ok_or(SyncError::UnknownNode(block))?;
        let slot = self
            .tree
            .slot_of(block)
            .ok_or(SyncError::NotAddressable(block))?;
        Ok((slot, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Mark, Span};
    use crate::tree::build;
    use serde_json::json;

    fn tree_of(spans: &[Span], marks: &[Mark]) -> DocumentTree {
        build(spans, marks, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_insert_at_boundary_goes_into_next_block() {
        let tree = tree_of(
            &[Span::text("Hello"), Span::block(BlockMarker::new("paragraph")), Span::text("World")],
            &[],
        );
        let config = EngineConfig::default();
        let reconciler = Reconciler::new(&tree, &config);
        let second = tree.text_blocks()[1];
        let at = TreePosition {
            node: second,
            offset: 0,
            boundary: true,
        };
        let ops = reconciler
            .translate(&EditIntent::InsertText {
                at,
                text: "x".into(),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![FlatOp::Splice {
                index: 6,
                delete_count: 0,
                text: "x".into()
            }]
        );
    }

    #[test]
    fn test_toggle_mark_on_then_off() {
        let config = EngineConfig::default();
        let plain = tree_of(&[Span::text("Hello World")], &[]);
        let block = plain.text_blocks()[0];
        let intent = EditIntent::ToggleMark {
            from: TreePosition::new(block, 6),
            to: TreePosition::new(block, 11),
            name: "strong".into(),
            value: json!(true),
        };
        assert_eq!(
            Reconciler::new(&plain, &config).translate(&intent).unwrap(),
            vec![FlatOp::Mark {
                range: MarkRange::new(6, 11),
                name: "strong".into(),
                value: json!(true)
            }]
        );

        let bold = tree_of(
            &[Span::text("Hello World")],
            &[Mark::new("strong", json!(true), 6, 11)],
        );
        let block = bold.text_blocks()[0];
        let intent = EditIntent::ToggleMark {
            from: TreePosition::new(block, 6),
            to: TreePosition::new(block, 11),
            name: "strong".into(),
            value: json!(true),
        };
        assert_eq!(
            Reconciler::new(&bold, &config).translate(&intent).unwrap(),
            vec![FlatOp::Unmark {
                range: MarkRange::new(6, 11),
                name: "strong".into()
            }]
        );
    }

    #[test]
    fn test_link_value_encoded_for_flat_model() {
        let tree = tree_of(&[Span::text("Link here")], &[]);
        let config = EngineConfig::default();
        let block = tree.text_blocks()[0];
        let link = json!({"href": "https://example.com", "title": "Example"});
        let ops = Reconciler::new(&tree, &config)
            .translate(&EditIntent::SetMark {
                from: TreePosition::new(block, 0),
                to: TreePosition::new(block, 4),
                name: "link".into(),
                value: link.clone(),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![FlatOp::Mark {
                range: MarkRange::new(0, 4),
                name: "link".into(),
                value: Value::String(link.to_string())
            }]
        );
    }

    #[test]
    fn test_delete_backward_grapheme() {
        let tree = tree_of(&[Span::text("ae\u{301}")], &[]);
        let config = EngineConfig::default();
        let block = tree.text_blocks()[0];
        let ops = Reconciler::new(&tree, &config)
            .translate(&EditIntent::DeleteBackward {
                at: TreePosition::new(block, 3),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![FlatOp::Splice {
                index: 1,
                delete_count: 2,
                text: String::new()
            }]
        );
    }

    #[test]
    fn test_delete_backward_at_block_start_joins() {
        let tree = tree_of(
            &[Span::text("Hello"), Span::block(BlockMarker::new("paragraph")), Span::text("World")],
            &[],
        );
        let config = EngineConfig::default();
        let reconciler = Reconciler::new(&tree, &config);
        let second = tree.text_blocks()[1];
        let ops = reconciler
            .translate(&EditIntent::DeleteBackward {
                at: TreePosition::new(second, 0),
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![FlatOp::Splice {
                index: 5,
                delete_count: 1,
                text: String::new()
            }]
        );
        assert_eq!(
            reconciler
                .translate(&EditIntent::JoinBlocks { block: second })
                .unwrap(),
            ops
        );

        let first = tree.text_blocks()[0];
        assert!(reconciler
            .translate(&EditIntent::DeleteBackward {
                at: TreePosition::new(first, 0)
            })
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_split_keeps_list_nesting() {
        let item = BlockMarker::new("list_item").with_parents(["bullet_list"]);
        let tree = tree_of(&[Span::block(item.clone()), Span::text("one")], &[]);
        let config = EngineConfig::default();
        let block = tree.text_blocks()[0];
        let ops = Reconciler::new(&tree, &config)
            .translate(&EditIntent::SplitBlock {
                at: TreePosition::new(block, 3),
                block: None,
            })
            .unwrap();
        assert_eq!(ops, vec![FlatOp::SplitBlock { index: 4, block: item }]);
    }

    #[test]
    fn test_change_implicit_block_inserts_marker() {
        let tree = tree_of(&[Span::text("Title")], &[]);
        let config = EngineConfig::default();
        let block = tree.text_blocks()[0];
        let ops = Reconciler::new(&tree, &config)
            .translate(&EditIntent::ChangeBlock {
                block,
                block_type: "heading".into(),
                attrs: Map::new(),
                parents: None,
            })
            .unwrap();
        assert_eq!(
            ops,
            vec![FlatOp::SplitBlock {
                index: 0,
                block: BlockMarker::new("heading")
            }]
        );
    }

    #[test]
    fn test_intent_json() {
        let intent: EditIntent = serde_json::from_value(json!({
            "type": "toggleMark",
            "from": {"node": 1, "offset": 0},
            "to": {"node": 1, "offset": 4},
            "name": "em"
        }))
        .unwrap();
        assert!(matches!(intent, EditIntent::ToggleMark { ref value, .. } if *value == json!(true)));

        let op = FlatOp::Splice {
            index: 2,
            delete_count: 1,
            text: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "splice", "index": 2, "deleteCount": 1, "text": ""})
        );
    }
}
