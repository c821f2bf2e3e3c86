//! Tree Builder
//!
//! One left-to-right pass over the spans. Block markers go through the shared
//! placement routine; text is cut into inline nodes wherever the active mark
//! set changes, with marks consumed by a [`MarkCursor`] so they are never
//! rescanned.

use super::document::DocumentTree;
use super::node::{BlockNode, BlockOrigin, InlineNode, NodeId, NodeKind};
use super::placement::{FreshSink, TraversalContext};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::span::{flat_length, Mark, MarkCodec, MarkCursor, MarkSet, Span, SpanEvent, SpanReader};
use tracing::debug;

/// Build a fresh tree from a span snapshot
///
/// Mark ranges are validated against the flat length before anything is
/// built; an empty, inverted or out-of-bounds range fails the whole build.
///
/// # Example
///
/// ```rust
/// use spansync_core::config::EngineConfig;
/// use spansync_core::span::{BlockMarker, Span};
/// use spansync_core::tree::build;
///
/// let spans = vec![
///     Span::text("Hello"),
///     Span::block(BlockMarker::new("paragraph")),
///     Span::text("World"),
/// ];
/// let tree = build(&spans, &[], &EngineConfig::default()).unwrap();
///
/// assert_eq!(tree.text_blocks().len(), 2);
/// assert_eq!(tree.visible_text(), "HelloWorld");
/// ```
pub fn build(spans: &[Span], marks: &[Mark], config: &EngineConfig) -> Result<DocumentTree> {
    let length = flat_length(spans);
    for mark in marks {
        mark.validate(length)?;
    }

    let codec = config.codec();
    let mut tree = DocumentTree::with_root();
    let mut ctx = TraversalContext::new(tree.root);
    let mut cursor = MarkCursor::new(marks.to_vec());
    let mut current: Option<NodeId> = None;

    for event in SpanReader::new(spans) {
        match event {
            SpanEvent::Block { marker, .. } => {
                let mut block = BlockNode::new(marker.block_type.clone(), BlockOrigin::Marker);
                block.parents = marker.parents.clone();
                block.attrs = marker.attrs.clone();
                let id = tree.alloc(None, NodeKind::Block(block));
                ctx.place(
                    &mut FreshSink { tree: &mut tree },
                    id,
                    &marker.block_type,
                    &marker.parents,
                    config.ancestor_policy,
                )?;
                tree.entries.push(id);
                current = Some(id);
                ctx.advance(1);
            }
            SpanEvent::Text { content, .. } => {
                let block = match current {
                    Some(block) => block,
                    None => {
                        let id = open_implicit(&mut tree, &mut ctx, config)?;
                        current = Some(id);
                        id
                    }
                };
                let width = append_runs(&mut tree, block, ctx.offset(), content, &mut cursor, &codec)?;
                ctx.advance(width);
            }
        }
    }

    if tree.entries.is_empty() {
        open_implicit(&mut tree, &mut ctx, config)?;
    }

    tree.refresh_index();
    debug!(
        blocks = tree.entries.len(),
        nodes = tree.node_count(),
        length,
        "built document tree"
    );
    Ok(tree)
}

fn open_implicit(
    tree: &mut DocumentTree,
    ctx: &mut TraversalContext,
    config: &EngineConfig,
) -> Result<NodeId> {
    let id = tree.new_implicit(&config.default_block_type);
    ctx.place(
        &mut FreshSink { tree },
        id,
        &config.default_block_type,
        &[],
        config.ancestor_policy,
    )?;
    tree.entries.push(id);
    Ok(id)
}

/// Append `content` (starting at flat `offset`) to `block`, one inline node
/// per uniform mark run. Returns the number of chars appended.
fn append_runs(
    tree: &mut DocumentTree,
    block: NodeId,
    offset: usize,
    content: &str,
    cursor: &mut MarkCursor,
    codec: &MarkCodec,
) -> Result<usize> {
    let chars: Vec<char> = content.chars().collect();
    let end = offset + chars.len();
    let mut pos = offset;

    while pos < end {
        let (active, boundary) = cursor.seek(pos);
        let run_end = boundary.map_or(end, |b| b.min(end));
        let text: String = chars[pos - offset..run_end - offset].iter().collect();
        push_inline(tree, block, text, codec.decode_set(&active))?;
        pos = run_end;
    }

    Ok(chars.len())
}

/// Append a run, extending the last inline when its marks are the same
fn push_inline(tree: &mut DocumentTree, block: NodeId, text: String, marks: MarkSet) -> Result<()> {
    let added = text.chars().count();
    let last = tree.block_ref(block)?.inlines.last().copied();

    let extended = match last {
        Some(last) => {
            let inline = tree.inline_mut(last)?;
            if inline.marks == marks {
                let mut joined = std::mem::take(&mut inline.text);
                joined.push_str(&text);
                inline.set_text(joined);
                true
            } else {
                false
            }
        }
        None => false,
    };
    if !extended {
        let id = tree.alloc_inline(block, InlineNode::new(text, marks));
        tree.block_mut(block)?.inlines.push(id);
    }
    tree.block_mut(block)?.text_len += added;
    Ok(())
}

impl DocumentTree {
    /// Allocate a detached implicit block
    pub(crate) fn new_implicit(&mut self, block_type: &str) -> NodeId {
        self.alloc(
            None,
            NodeKind::Block(BlockNode::new(block_type, BlockOrigin::Implicit)),
        )
    }
}
