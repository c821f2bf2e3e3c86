//! Shared "place under parents" routine
//!
//! Both the builder and the patch applier decide where a text block lives
//! the same way: walk the text blocks in flat order with a stack of open
//! ancestors, keep the longest prefix of the stack whose block types match the
//! block's `parents`, open whatever is missing, then attach the block and
//! push it. The state of that walk is an explicit [`TraversalContext`]; what
//! "open" and "attach" mean is left to a [`PlacementSink`]:
//!
//! - [`FreshSink`] allocates every container (initial build)
//! - [`ReuseSink`] reuses the containers a block already sat in whenever the
//!   placement agrees, so restructuring after a patch burst keeps node
//!   identity for everything the burst did not move

use super::document::DocumentTree;
use super::node::{BlockNode, BlockOrigin, NodeId, NodeKind};
use crate::config::AncestorPolicy;
use crate::error::{Result, SyncError};
use std::collections::{HashMap, HashSet};

/// Where blocks end up as the traversal places them
pub(crate) trait PlacementSink {
    fn block_type(&self, id: NodeId) -> &str;

    /// Open a container of `block_type` under `parent` on behalf of `claimant`
    ///
    /// `prefix` is the parents chain above the new container.
    fn open_container(
        &mut self,
        parent: NodeId,
        block_type: &str,
        prefix: &[String],
        claimant: NodeId,
    ) -> NodeId;

    fn attach(&mut self, parent: NodeId, child: NodeId);
}

/// Open ancestors plus the cumulative flat offset of a left-to-right walk
#[derive(Debug, Clone)]
pub(crate) struct TraversalContext {
    root: NodeId,
    stack: Vec<NodeId>,
    offset: usize,
}

impl TraversalContext {
    pub(crate) fn new(root: NodeId) -> Self {
        Self {
            root,
            stack: vec![root],
            offset: 0,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn advance(&mut self, width: usize) {
        self.offset += width;
    }

    /// Place text block `entry` and make it the innermost open block
    pub(crate) fn place<S: PlacementSink>(
        &mut self,
        sink: &mut S,
        entry: NodeId,
        block_type: &str,
        parents: &[String],
        policy: AncestorPolicy,
    ) -> Result<()> {
        let shared = self.stack[1..]
            .iter()
            .zip(parents)
            .take_while(|(open, wanted)| sink.block_type(**open) == wanted.as_str())
            .count();
        let missing = parents.len() - shared;
        if policy == AncestorPolicy::Strict && missing > 1 {
            return Err(SyncError::MissingAncestors {
                block_type: block_type.to_string(),
                parents: parents.to_vec(),
                missing,
            });
        }

        self.stack.truncate(shared + 1);
        for depth in shared..parents.len() {
            let parent = self.top();
            let container = sink.open_container(parent, &parents[depth], &parents[..depth], entry);
            self.stack.push(container);
        }

        let parent = self.top();
        sink.attach(parent, entry);
        self.stack.push(entry);
        Ok(())
    }

    fn top(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.root)
    }
}

fn container_node(block_type: &str, prefix: &[String]) -> NodeKind {
    let mut block = BlockNode::new(block_type, BlockOrigin::Container);
    block.parents = prefix.to_vec();
    NodeKind::Block(block)
}

/// Sink for a tree being built from scratch
pub(crate) struct FreshSink<'a> {
    pub(crate) tree: &'a mut DocumentTree,
}

impl PlacementSink for FreshSink<'_> {
    fn block_type(&self, id: NodeId) -> &str {
        self.tree.block(id).map_or("", |b| b.block_type.as_str())
    }

    fn open_container(
        &mut self,
        parent: NodeId,
        block_type: &str,
        prefix: &[String],
        _claimant: NodeId,
    ) -> NodeId {
        let id = self.tree.alloc(Some(parent), container_node(block_type, prefix));
        self.attach(parent, id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Ok(block) = self.tree.block_mut(parent) {
            block.children.push(child);
        }
        self.tree.set_parent(child, Some(parent));
    }
}

/// Sink that records a new layout and reuses existing containers
///
/// Nothing in the tree moves until [`ReuseSink::commit`]; until then every
/// block's parent pointer still describes where it sat before, which is what
/// `open_container` consults to find a container worth reusing.
pub(crate) struct ReuseSink<'a> {
    tree: &'a mut DocumentTree,
    claimed: HashSet<NodeId>,
    created: Vec<NodeId>,
    layout: HashMap<NodeId, Vec<NodeId>>,
    placed: Vec<(NodeId, NodeId)>,
}

impl<'a> ReuseSink<'a> {
    pub(crate) fn new(tree: &'a mut DocumentTree) -> Self {
        Self {
            tree,
            claimed: HashSet::new(),
            created: Vec::new(),
            layout: HashMap::new(),
            placed: Vec::new(),
        }
    }

    fn reusable(&self, parent: NodeId, block_type: &str, claimant: NodeId) -> Option<NodeId> {
        // Old chain, root first, ending just above the claimant
        let mut chain = self.tree.ancestors(claimant);
        chain.reverse();
        let position = chain.iter().position(|id| *id == parent)?;
        let candidate = *chain.get(position + 1)?;
        let block = self.tree.block(candidate)?;
        let fits = block.origin == BlockOrigin::Container
            && block.block_type == block_type
            && !self.claimed.contains(&candidate);
        fits.then_some(candidate)
    }

    /// Apply the recorded layout and drop containers nobody claimed
    ///
    /// Returns the number of containers removed.
    pub(crate) fn commit(self, old_containers: Vec<NodeId>) -> usize {
        let ReuseSink {
            tree,
            claimed,
            created,
            mut layout,
            placed,
        } = self;

        let mut removed = 0;
        for id in old_containers {
            if !claimed.contains(&id) {
                tree.remove_node(id);
                removed += 1;
            }
        }

        let mut keep: Vec<NodeId> = Vec::with_capacity(claimed.len() + created.len() + tree.entries.len() + 1);
        keep.push(tree.root);
        keep.extend(claimed.iter().copied());
        keep.extend(created.iter().copied());
        keep.extend(tree.entries.iter().copied());
        for id in keep {
            let children = layout.remove(&id).unwrap_or_default();
            if let Ok(block) = tree.block_mut(id) {
                if block.children != children {
                    block.children = children;
                }
            }
        }

        for (child, parent) in placed {
            if tree.parent(child) != Some(parent) {
                tree.set_parent(child, Some(parent));
            }
        }
        removed
    }
}

impl PlacementSink for ReuseSink<'_> {
    fn block_type(&self, id: NodeId) -> &str {
        self.tree.block(id).map_or("", |b| b.block_type.as_str())
    }

    fn open_container(
        &mut self,
        parent: NodeId,
        block_type: &str,
        prefix: &[String],
        claimant: NodeId,
    ) -> NodeId {
        let id = match self.reusable(parent, block_type, claimant) {
            Some(existing) => {
                if let Ok(block) = self.tree.block_mut(existing) {
                    if block.parents != prefix {
                        block.parents = prefix.to_vec();
                    }
                }
                self.claimed.insert(existing);
                existing
            }
            None => {
                let id = self.tree.alloc(Some(parent), container_node(block_type, prefix));
                self.created.push(id);
                id
            }
        };
        self.attach(parent, id);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.layout.entry(parent).or_default().push(child);
        self.placed.push((child, parent));
    }
}

impl DocumentTree {
    /// Containers reachable from the root through block children
    fn containers(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            if let Some(block) = self.block(id) {
                if block.origin == BlockOrigin::Container {
                    out.push(id);
                }
                pending.extend(block.children.iter().copied());
            }
        }
        out
    }

    /// Re-place every text block under its recorded parents
    ///
    /// Containers whose placement did not change are kept with their ids;
    /// only the parts of the tree whose shape actually changed get new nodes.
    /// Returns the number of containers that were dropped.
    pub(crate) fn restructure(&mut self, policy: AncestorPolicy) -> Result<usize> {
        let old_containers = self.containers();
        let entries = self.entries.clone();

        let mut ctx = TraversalContext::new(self.root);
        let mut sink = ReuseSink::new(self);
        for id in entries {
            let (block_type, parents) = {
                let block = sink.tree.block_ref(id)?;
                (block.block_type.clone(), block.parents.clone())
            };
            ctx.place(&mut sink, id, &block_type, &parents, policy)?;
        }
        Ok(sink.commit(old_containers))
    }
}
