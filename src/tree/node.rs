//! Tree nodes
//!
//! Nodes live in an arena owned by [`DocumentTree`](super::DocumentTree) and
//! are addressed by [`NodeId`]. Ids are never reused within a session, so an
//! id that survives a patch burst names the same node it named before.

use crate::span::MarkSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of a node in the document tree
///
/// # Example
///
/// ```rust
/// use spansync_core::tree::NodeId;
///
/// let a = NodeId::new(1);
/// let b = NodeId::new(2);
/// assert!(a < b);
/// assert_eq!(a.to_string(), "n1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Why a block node exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOrigin {
    /// The top-level container; has no marker of its own
    Root,
    /// Opened by a block marker; owns exactly one flat placeholder
    Marker,
    /// Synthesized from a `parents` chain; owns no flat position
    Container,
    /// Leading block for text before the first marker, or an empty document
    Implicit,
}

impl BlockOrigin {
    /// Text blocks own inline content and are addressable by flat offsets
    pub fn is_text_block(self) -> bool {
        matches!(self, BlockOrigin::Marker | BlockOrigin::Implicit)
    }

    /// Flat positions taken by the block itself, excluding its text
    pub fn marker_width(self) -> usize {
        match self {
            BlockOrigin::Marker => 1,
            _ => 0,
        }
    }
}

/// A structural node
///
/// Inline content comes first, nested blocks after it: in flat order a text
/// block's characters precede the markers of the blocks nested inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub block_type: String,
    pub parents: Vec<String>,
    pub attrs: Map<String, Value>,
    pub origin: BlockOrigin,
    pub inlines: Vec<NodeId>,
    pub children: Vec<NodeId>,

    /// Sum of inline lengths
    pub(crate) text_len: usize,

    /// Index among the text blocks; valid while the position index is
    pub(crate) slot: usize,
}

impl BlockNode {
    pub fn new(block_type: impl Into<String>, origin: BlockOrigin) -> Self {
        Self {
            block_type: block_type.into(),
            parents: Vec::new(),
            attrs: Map::new(),
            origin,
            inlines: Vec::new(),
            children: Vec::new(),
            text_len: 0,
            slot: usize::MAX,
        }
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// Flat width: the marker (if any) plus the text
    pub fn flat_width(&self) -> usize {
        self.origin.marker_width() + self.text_len
    }
}

/// A run of text with a uniform mark set
#[derive(Debug, Clone, PartialEq)]
pub struct InlineNode {
    pub text: String,
    pub marks: MarkSet,
    pub(crate) len: usize,
}

impl InlineNode {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self { text, marks, len }
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.len = text.chars().count();
        self.text = text;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Block(BlockNode),
    Inline(InlineNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn as_block(&self) -> Option<&BlockNode> {
        match &self.kind {
            NodeKind::Block(block) => Some(block),
            NodeKind::Inline(_) => None,
        }
    }

    pub fn as_inline(&self) -> Option<&InlineNode> {
        match &self.kind {
            NodeKind::Inline(inline) => Some(inline),
            NodeKind::Block(_) => None,
        }
    }

    pub(crate) fn as_block_mut(&mut self) -> Option<&mut BlockNode> {
        match &mut self.kind {
            NodeKind::Block(block) => Some(block),
            NodeKind::Inline(_) => None,
        }
    }

    pub(crate) fn as_inline_mut(&mut self) -> Option<&mut InlineNode> {
        match &mut self.kind {
            NodeKind::Inline(inline) => Some(inline),
            NodeKind::Block(_) => None,
        }
    }
}

/// Byte offset of char index `chars` in `text` (clamped to the end)
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
