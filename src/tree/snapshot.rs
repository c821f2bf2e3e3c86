//! Serializable view of the tree
//!
//! Snapshots drop node ids and caches, so two trees that describe the same
//! document compare equal no matter how they were produced. That makes them
//! the unit of comparison between an incrementally patched tree and a fresh
//! rebuild, and the read-only form handed to a presentation layer.

use super::document::DocumentTree;
use super::node::{BlockOrigin, NodeId, NodeKind};
use crate::span::MarkSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotNode {
    Block {
        #[serde(rename = "type")]
        block_type: String,
        origin: BlockOrigin,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attrs: Map<String, Value>,
        #[serde(default)]
        children: Vec<SnapshotNode>,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "MarkSet::is_empty")]
        marks: MarkSet,
    },
}

impl SnapshotNode {
    /// Concatenated text below this node
    pub fn text(&self) -> String {
        match self {
            SnapshotNode::Text { text, .. } => text.clone(),
            SnapshotNode::Block { children, .. } => children.iter().map(SnapshotNode::text).collect(),
        }
    }

    pub fn children(&self) -> &[SnapshotNode] {
        match self {
            SnapshotNode::Block { children, .. } => children,
            SnapshotNode::Text { .. } => &[],
        }
    }
}

impl DocumentTree {
    pub fn snapshot(&self) -> SnapshotNode {
        self.snapshot_node(self.root).unwrap_or(SnapshotNode::Block {
            block_type: String::new(),
            origin: BlockOrigin::Root,
            attrs: Map::new(),
            children: Vec::new(),
        })
    }

    /// Snapshot of a subtree
    pub fn snapshot_node(&self, id: NodeId) -> Option<SnapshotNode> {
        let node = self.get(id)?;
        Some(match &node.kind {
            NodeKind::Inline(inline) => SnapshotNode::Text {
                text: inline.text.clone(),
                marks: inline.marks.clone(),
            },
            NodeKind::Block(block) => SnapshotNode::Block {
                block_type: block.block_type.clone(),
                origin: block.origin,
                attrs: block.attrs.clone(),
                children: block
                    .inlines
                    .iter()
                    .chain(&block.children)
                    .filter_map(|child| self.snapshot_node(*child))
                    .collect(),
            },
        })
    }
}
