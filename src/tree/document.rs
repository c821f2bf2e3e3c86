//! DocumentTree: the node arena plus the flat-offset index
//!
//! Besides the nodes, the tree keeps every text block (marker or implicit
//! origin) in flat order together with the flat offset it starts at. Those
//! starts are a cache: mutations mark the index invalid from the first slot
//! they touched and [`DocumentTree::refresh_index`] recomputes only the
//! suffix, so a burst of edits near the end of a long document never walks
//! the blocks before them.

use super::node::{BlockNode, BlockOrigin, InlineNode, Node, NodeId, NodeKind};
use crate::error::{Result, SyncError};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DocumentTree {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) root: NodeId,

    /// Text blocks in flat order
    pub(crate) entries: Vec<NodeId>,

    /// Flat offset where each entry starts (its marker, or its text for the
    /// implicit block). Only `starts[..valid]` is current.
    pub(crate) starts: Vec<usize>,
    pub(crate) valid: usize,

    next_id: u64,
}

impl DocumentTree {
    /// A tree holding only the root; callers must add at least one text block
    pub(crate) fn with_root() -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId::new(0),
            entries: Vec::new(),
            starts: Vec::new(),
            valid: 0,
            next_id: 0,
        };
        tree.root = tree.alloc(None, NodeKind::Block(BlockNode::new("doc", BlockOrigin::Root)));
        tree
    }

    pub(crate) fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { id, parent, kind });
        id
    }

    pub(crate) fn alloc_inline(&mut self, parent: NodeId, inline: InlineNode) -> NodeId {
        self.alloc(Some(parent), NodeKind::Inline(inline))
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn block(&self, id: NodeId) -> Option<&BlockNode> {
        self.nodes.get(&id).and_then(Node::as_block)
    }

    pub fn inline(&self, id: NodeId) -> Option<&InlineNode> {
        self.nodes.get(&id).and_then(Node::as_inline)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Text blocks in flat order
    pub fn text_blocks(&self) -> &[NodeId] {
        &self.entries
    }

    pub(crate) fn block_mut(&mut self, id: NodeId) -> Result<&mut BlockNode> {
        self.nodes
            .get_mut(&id)
            .and_then(Node::as_block_mut)
            .ok_or(SyncError::UnknownNode(id))
    }

    pub(crate) fn inline_mut(&mut self, id: NodeId) -> Result<&mut InlineNode> {
        self.nodes
            .get_mut(&id)
            .and_then(Node::as_inline_mut)
            .ok_or(SyncError::UnknownNode(id))
    }

    pub(crate) fn block_ref(&self, id: NodeId) -> Result<&BlockNode> {
        self.block(id).ok_or(SyncError::UnknownNode(id))
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
    }

    /// Number of flat positions in the document
    pub fn flat_len(&self) -> usize {
        debug_assert!(self.index_is_valid(), "position index read while stale");
        match (self.starts.last(), self.entries.last()) {
            (Some(start), Some(id)) => start + self.block(*id).map_or(0, BlockNode::flat_width),
            _ => 0,
        }
    }

    /// Concatenated text of all inline nodes, in document order
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        for id in &self.entries {
            self.push_block_text(*id, &mut out);
        }
        out
    }

    /// Text of one text block
    pub fn block_text(&self, id: NodeId) -> Option<String> {
        let mut out = String::new();
        self.block(id)?;
        self.push_block_text(id, &mut out);
        Some(out)
    }

    fn push_block_text(&self, id: NodeId, out: &mut String) {
        if let Some(block) = self.block(id) {
            for inline in &block.inlines {
                if let Some(inline) = self.inline(*inline) {
                    out.push_str(&inline.text);
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Position index
    // ---------------------------------------------------------------

    pub(crate) fn index_is_valid(&self) -> bool {
        self.valid >= self.entries.len() && self.starts.len() == self.entries.len()
    }

    /// Mark every entry from `slot` onwards as needing a new start
    pub(crate) fn invalidate_from(&mut self, slot: usize) {
        self.valid = self.valid.min(slot);
    }

    /// Recompute starts (and cached slots) for the invalid suffix
    pub(crate) fn refresh_index(&mut self) {
        let len = self.entries.len();
        if self.valid >= len && self.starts.len() == len {
            return;
        }
        let from = self.valid.min(len).min(self.starts.len());
        self.starts.truncate(from);

        let mut offset = match from.checked_sub(1) {
            Some(prev) => {
                self.starts[prev] + self.block(self.entries[prev]).map_or(0, BlockNode::flat_width)
            }
            None => 0,
        };
        for slot in from..len {
            let id = self.entries[slot];
            self.starts.push(offset);
            if let Some(block) = self.nodes.get_mut(&id).and_then(Node::as_block_mut) {
                block.slot = slot;
                offset += block.flat_width();
            }
        }
        self.valid = len;
    }

    pub(crate) fn insert_entry(&mut self, slot: usize, id: NodeId) {
        self.entries.insert(slot, id);
        self.invalidate_from(slot);
    }

    pub(crate) fn remove_entry(&mut self, slot: usize) -> NodeId {
        self.invalidate_from(slot);
        self.entries.remove(slot)
    }

    /// Slot of a text block, from its cached slot
    pub(crate) fn slot_of(&self, id: NodeId) -> Option<usize> {
        let slot = self.block(id)?.slot;
        (self.entries.get(slot) == Some(&id)).then_some(slot)
    }

    pub(crate) fn entry(&self, slot: usize) -> Result<&BlockNode> {
        let id = self
            .entries
            .get(slot)
            .ok_or(SyncError::PositionOutOfRange {
                offset: slot,
                length: self.entries.len(),
            })?;
        self.block_ref(*id)
    }

    pub(crate) fn entry_start(&self, slot: usize) -> usize {
        self.starts[slot]
    }

    /// Flat offset of the first character of an entry
    pub(crate) fn content_start(&self, slot: usize) -> usize {
        let marker = self
            .block(self.entries[slot])
            .map_or(0, |b| b.origin.marker_width());
        self.starts[slot] + marker
    }

    pub(crate) fn content_end(&self, slot: usize) -> usize {
        let text = self.block(self.entries[slot]).map_or(0, BlockNode::text_len);
        self.content_start(slot) + text
    }

    /// Last entry starting at or before `offset`
    pub(crate) fn entry_at_or_before(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1)
    }

    /// Entry whose text would receive an insertion at flat `offset`
    ///
    /// `None` only when the document starts with a marker and `offset` is 0.
    pub(crate) fn entry_for_content(&self, offset: usize) -> Option<usize> {
        let slot = self.entry_at_or_before(offset);
        if self.content_start(slot) <= offset {
            return Some(slot);
        }
        slot.checked_sub(1)
    }

    /// Entry whose marker sits exactly at `offset`
    pub(crate) fn entry_with_marker(&self, offset: usize) -> Option<usize> {
        let slot = self.entry_at_or_before(offset);
        let block = self.block(self.entries[slot])?;
        (block.origin == BlockOrigin::Marker && self.starts[slot] == offset).then_some(slot)
    }

    // ---------------------------------------------------------------
    // Invariants
    // ---------------------------------------------------------------

    /// Structural problems found in the tree; empty when it is consistent
    ///
    /// Checks parent links, the pre-order of text blocks, ancestor chains
    /// against recorded parents, inline uniformity and the cached index.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut pre_order = Vec::new();
        self.collect_text_blocks(self.root, &mut pre_order, &mut problems);
        if pre_order != self.entries {
            problems.push("text block index disagrees with tree pre-order".to_string());
        }
        if self.entries.is_empty() {
            problems.push("tree has no text block".to_string());
        }

        for (slot, id) in self.entries.iter().enumerate() {
            let Some(block) = self.block(*id) else {
                problems.push(format!("entry {} is not a block", id));
                continue;
            };
            if block.origin == BlockOrigin::Implicit && slot != 0 {
                problems.push(format!("implicit block {} at slot {}", id, slot));
            }
            if slot == 0 && block.origin == BlockOrigin::Implicit && block.text_len == 0 && self.entries.len() > 1 {
                problems.push("empty implicit block before a marker".to_string());
            }

            let chain: Vec<&str> = self
                .ancestors(*id)
                .iter()
                .rev()
                .skip(1)
                .filter_map(|a| self.block(*a).map(|b| b.block_type.as_str()))
                .collect();
            if chain != block.parents.iter().map(String::as_str).collect::<Vec<_>>() {
                problems.push(format!(
                    "block {} has ancestors {:?} but parents {:?}",
                    id, chain, block.parents
                ));
            }

            let mut total = 0;
            let mut previous: Option<&InlineNode> = None;
            for inline_id in &block.inlines {
                let Some(inline) = self.inline(*inline_id) else {
                    problems.push(format!("inline {} missing", inline_id));
                    continue;
                };
                if self.parent(*inline_id) != Some(*id) {
                    problems.push(format!("inline {} has wrong parent", inline_id));
                }
                if inline.is_empty() {
                    problems.push(format!("inline {} is empty", inline_id));
                }
                if inline.len != inline.text.chars().count() {
                    problems.push(format!("inline {} has stale length", inline_id));
                }
                if previous.is_some_and(|p| p.marks == inline.marks) {
                    problems.push(format!("inline {} repeats its neighbour's marks", inline_id));
                }
                total += inline.len;
                previous = Some(inline);
            }
            if total != block.text_len {
                problems.push(format!("block {} has stale text length", id));
            }
        }

        if self.index_is_valid() {
            let mut offset = 0;
            for (slot, id) in self.entries.iter().enumerate() {
                if self.starts[slot] != offset {
                    problems.push(format!("stale start for slot {}", slot));
                }
                offset += self.block(*id).map_or(0, BlockNode::flat_width);
            }
        }

        problems
    }

    fn collect_text_blocks(&self, id: NodeId, out: &mut Vec<NodeId>, problems: &mut Vec<String>) {
        let Some(block) = self.block(id) else {
            problems.push(format!("child {} is not a block", id));
            return;
        };
        if block.origin.is_text_block() {
            out.push(id);
        }
        if block.origin == BlockOrigin::Container && block.children.is_empty() {
            problems.push(format!("container {} is empty", id));
        }
        for child in &block.children {
            if self.parent(*child) != Some(id) {
                problems.push(format!("child {} has wrong parent", child));
            }
            self.collect_text_blocks(*child, out, problems);
        }
    }

    /// Ancestors of `id`, nearest first, ending with the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            chain.push(ancestor);
            current = self.parent(ancestor);
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::span::{BlockMarker, Span};
    use crate::tree::build;

    fn tree_of(spans: Vec<Span>) -> DocumentTree {
        build(&spans, &[], &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_index_lookups() {
        // "Hello" ¶ "World"
        let tree = tree_of(vec![
            Span::text("Hello"),
            Span::block(BlockMarker::new("paragraph")),
            Span::text("World"),
        ]);
        assert_eq!(tree.flat_len(), 11);
        assert_eq!(tree.text_blocks().len(), 2);

        assert_eq!(tree.entry_at_or_before(4), 0);
        assert_eq!(tree.entry_at_or_before(5), 1);
        assert_eq!(tree.entry_for_content(5), Some(0));
        assert_eq!(tree.entry_for_content(6), Some(1));
        assert_eq!(tree.entry_with_marker(5), Some(1));
        assert_eq!(tree.entry_with_marker(4), None);
        assert_eq!(tree.content_start(1), 6);
        assert_eq!(tree.content_end(1), 11);
    }

    #[test]
    fn test_leading_marker_has_no_content_slot_at_zero() {
        let tree = tree_of(vec![
            Span::block(BlockMarker::new("heading")),
            Span::text("Title"),
        ]);
        assert_eq!(tree.entry_for_content(0), None);
        assert_eq!(tree.entry_for_content(1), Some(0));
        assert_eq!(tree.entry_with_marker(0), Some(0));
    }

    #[test]
    fn test_refresh_only_recomputes_suffix() {
        let mut tree = tree_of(vec![
            Span::text("ab"),
            Span::block(BlockMarker::new("paragraph")),
            Span::text("cd"),
            Span::block(BlockMarker::new("paragraph")),
            Span::text("ef"),
        ]);
        let second = tree.entries[1];
        tree.block_mut(second).unwrap().text_len += 3;
        tree.invalidate_from(2);
        tree.refresh_index();
        assert_eq!(tree.starts, vec![0, 2, 8]);
        assert_eq!(tree.slot_of(tree.entries[2]), Some(2));
    }

    #[test]
    fn test_visible_text_and_invariants() {
        let tree = tree_of(vec![
            Span::block(BlockMarker::new("list_item").with_parents(["bullet_list"])),
            Span::text("one"),
            Span::block(BlockMarker::new("list_item").with_parents(["bullet_list"])),
            Span::text("two"),
        ]);
        assert_eq!(tree.visible_text(), "onetwo");
        assert!(tree.invariant_violations().is_empty());
        let first = tree.text_blocks()[0];
        assert_eq!(tree.block_text(first).as_deref(), Some("one"));
        assert_eq!(tree.ancestors(first).len(), 2);
    }
}
