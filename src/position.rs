//! Position Mapper
//!
//! Converts flat offsets to tree positions and back, using the cached start
//! offset of every text block (binary search, no tree walk).
//!
//! # Boundary convention
//!
//! An offset that lands exactly on a block marker is ambiguous: it is both
//! "after the last character of the previous block" and "before the first
//! character of the next one". [`BoundaryAffinity`] picks the side:
//!
//! ```text
//! flat:     H e l l o ¶ W o r l d
//! offset:             5
//!
//! NextBlock      -> (second block, 0, boundary: true)
//! PreviousBlock  -> (first block,  5, boundary: false)
//! ```
//!
//! `boundary: true` always means "on this block's marker", so both sides
//! round-trip to the same offset.

use crate::config::BoundaryAffinity;
use crate::error::{Result, SyncError};
use crate::tree::{BlockOrigin, DocumentTree, InlineNode, NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// A position inside the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreePosition {
    /// A text block, or an inline node
    pub node: NodeId,
    /// Chars into the node's text
    pub offset: usize,
    /// Set when the position sits on `node`'s block marker
    #[serde(default)]
    pub boundary: bool,
}

impl TreePosition {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            offset,
            boundary: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSelection {
    pub anchor: TreePosition,
    pub head: TreePosition,
}

impl TreeSelection {
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }
}

pub struct PositionMapper<'a> {
    tree: &'a DocumentTree,
    affinity: BoundaryAffinity,
}

impl<'a> PositionMapper<'a> {
    pub fn new(tree: &'a DocumentTree, affinity: BoundaryAffinity) -> Self {
        debug_assert!(tree.index_is_valid(), "mapping positions over a stale index");
        Self { tree, affinity }
    }

    pub fn tree(&self) -> &'a DocumentTree {
        self.tree
    }

    /// Number of flat positions
    pub fn len(&self) -> usize {
        self.tree.flat_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree position of a flat offset, `0 <= offset <= len`
    pub fn to_tree_position(&self, offset: usize) -> Result<TreePosition> {
        let length = self.len();
        if offset > length {
            return Err(SyncError::PositionOutOfRange { offset, length });
        }

        let slot = self.tree.entry_at_or_before(offset);
        let block = self.tree.text_blocks()[slot];
        let on_marker = self.tree.block_ref(block)?.origin == BlockOrigin::Marker
            && self.tree.entry_start(slot) == offset;

        if on_marker {
            if self.affinity == BoundaryAffinity::PreviousBlock && slot > 0 {
                let previous = self.tree.text_blocks()[slot - 1];
                return Ok(TreePosition::new(
                    previous,
                    self.tree.block_ref(previous)?.text_len(),
                ));
            }
            return Ok(TreePosition {
                node: block,
                offset: 0,
                boundary: true,
            });
        }

        Ok(TreePosition::new(block, offset - self.tree.content_start(slot)))
    }

    /// Flat offset of a tree position
    ///
    /// Accepts text blocks and inline nodes; containers and the root do not
    /// address flat text.
    pub fn to_flat_offset(&self, position: &TreePosition) -> Result<usize> {
        let (block, local) = self.block_local(position)?;
        let slot = self
            .tree
            .slot_of(block)
            .ok_or(SyncError::NotAddressable(block))?;

        if position.boundary {
            let origin = self.tree.block_ref(block)?.origin;
            if origin != BlockOrigin::Marker || local != 0 {
                return Err(SyncError::NotAddressable(position.node));
            }
            return Ok(self.tree.entry_start(slot));
        }
        Ok(self.tree.content_start(slot) + local)
    }

    /// Flat offset where text typed at `position` would go
    ///
    /// Same as [`to_flat_offset`](Self::to_flat_offset) except that a
    /// boundary position resolves to the start of its block's text.
    pub fn text_offset(&self, position: &TreePosition) -> Result<usize> {
        let offset = self.to_flat_offset(position)?;
        Ok(if position.boundary { offset + 1 } else { offset })
    }

    pub fn to_tree_selection(&self, anchor: usize, head: usize) -> Result<TreeSelection> {
        Ok(TreeSelection {
            anchor: self.to_tree_position(anchor)?,
            head: self.to_tree_position(head)?,
        })
    }

    pub fn to_flat_selection(&self, selection: &TreeSelection) -> Result<(usize, usize)> {
        Ok((
            self.to_flat_offset(&selection.anchor)?,
            self.to_flat_offset(&selection.head)?,
        ))
    }

    /// Inline node holding `position`, with the offset inside it
    ///
    /// A position between two inlines belongs to the one on its left (the
    /// run whose marks typing there would continue); at the start of a block
    /// it belongs to the first inline. `None` for an empty block.
    pub fn inline_at(&self, position: &TreePosition) -> Result<Option<(NodeId, usize)>> {
        if let Some(NodeKind::Inline(inline)) = self.tree.get(position.node).map(|n| &n.kind) {
            if position.offset > inline.len() {
                return Err(SyncError::PositionOutOfRange {
                    offset: position.offset,
                    length: inline.len(),
                });
            }
            return Ok(Some((position.node, position.offset)));
        }

        let (block, local) = self.block_local(position)?;
        let mut found = None;
        for (start, id) in self.tree.inline_runs(block) {
            let len = self.tree.inline(id).map_or(0, InlineNode::len);
            if found.is_none() || start < local {
                found = Some((id, local.saturating_sub(start).min(len)));
            }
            if start + len >= local {
                break;
            }
        }
        Ok(found)
    }

    /// Flat range `[start, end)` of a text block's content
    pub fn content_range(&self, block: NodeId) -> Result<(usize, usize)> {
        let slot = self
            .tree
            .slot_of(block)
            .ok_or(SyncError::NotAddressable(block))?;
        Ok((self.tree.content_start(slot), self.tree.content_end(slot)))
    }

    /// Resolve a position to its text block and local char offset
    fn block_local(&self, position: &TreePosition) -> Result<(NodeId, usize)> {
        let node = self
            .tree
            .get(position.node)
            .ok_or(SyncError::UnknownNode(position.node))?;
        let (block, local) = match &node.kind {
            NodeKind::Block(block) => {
                if !block.origin.is_text_block() {
                    return Err(SyncError::NotAddressable(position.node));
                }
                (position.node, position.offset)
            }
            NodeKind::Inline(inline) => {
                if position.offset > inline.len() {
                    return Err(SyncError::PositionOutOfRange {
                        offset: position.offset,
                        length: inline.len(),
                    });
                }
                let parent = node.parent.ok_or(SyncError::NotAddressable(position.node))?;
                let start = self
                    .tree
                    .inline_runs(parent)
                    .into_iter()
                    .find(|(_, id)| *id == position.node)
                    .map(|(start, _)| start)
                    .ok_or(SyncError::NotAddressable(position.node))?;
                (parent, start + position.offset)
            }
        };

        let length = self.tree.block_ref(block)?.text_len();
        if local > length {
            return Err(SyncError::PositionOutOfRange {
                offset: local,
                length,
            });
        }
        Ok((block, local))
    }
}
