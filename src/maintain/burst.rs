//! Burst state and patch dispatch

use super::ApplyReport;
use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::patch::{display_path, resolve, Patch, Prop, Target};
use crate::span::MarkCodec;
use crate::tree::{BlockOrigin, DocumentTree, NodeId};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// A field write waiting for its marker
#[derive(Debug, Clone)]
pub(super) enum FieldOp {
    Put(Value),
    Insert(Vec<Value>),
    Delete,
}

pub(super) struct Burst<'a> {
    pub(super) tree: &'a mut DocumentTree,
    pub(super) config: &'a EngineConfig,
    pub(super) codec: MarkCodec,
    pub(super) pending: BTreeMap<usize, Vec<(Vec<Prop>, FieldOp)>>,
    pub(super) restructure: bool,
    report: ApplyReport,
}

impl<'a> Burst<'a> {
    pub(super) fn new(tree: &'a mut DocumentTree, config: &'a EngineConfig) -> Self {
        Self {
            tree,
            config,
            codec: config.codec(),
            pending: BTreeMap::new(),
            restructure: false,
            report: ApplyReport::default(),
        }
    }

    pub(super) fn apply(&mut self, patch: &Patch) -> Result<()> {
        let target = resolve(patch.path(), &self.config.text_path);
        if target == Target::Outside {
            warn!(
                action = patch.action(),
                path = %display_path(patch.path()),
                "skipping patch outside the text path"
            );
            self.report.skipped += 1;
            return Ok(());
        }
        trace!(action = patch.action(), path = %display_path(patch.path()), "applying patch");

        match (patch, target) {
            (
                Patch::Splice {
                    index,
                    delete_count,
                    value,
                    marks,
                    ..
                },
                Target::Text,
            ) => {
                let marks = self.codec.decode_set(marks);
                self.splice(*index, *delete_count, value, &marks)?;
            }
            (
                Patch::Mark {
                    name,
                    value,
                    start,
                    end,
                    ..
                },
                Target::Text,
            ) => self.mark(name, value, *start, *end)?,
            (Patch::Insert { values, .. }, Target::Offset(offset)) => {
                self.insert_values(offset, values)?
            }
            (Patch::Delete { length, .. }, Target::Offset(offset)) => {
                self.delete_items(offset, *length)?
            }
            (Patch::Put { value, .. }, Target::Offset(offset)) => {
                self.field_op(offset, &[], FieldOp::Put(value.clone()))?
            }
            (Patch::Put { value, .. }, Target::Field { offset, field }) => {
                self.field_op(offset, field, FieldOp::Put(value.clone()))?
            }
            (Patch::Insert { values, .. }, Target::Field { offset, field }) => {
                self.field_op(offset, field, FieldOp::Insert(values.clone()))?
            }
            (Patch::Delete { .. }, Target::Field { offset, field }) => {
                self.field_op(offset, field, FieldOp::Delete)?
            }
            _ => {
                return Err(SyncError::UnsupportedPath {
                    path: format!("{} {}", patch.action(), display_path(patch.path())),
                })
            }
        }

        self.report.applied += 1;
        Ok(())
    }

    /// Apply a field write now, or buffer it until the marker exists
    fn field_op(&mut self, offset: usize, field: &[Prop], op: FieldOp) -> Result<()> {
        self.tree.refresh_index();
        match self.tree.entry_with_marker(offset) {
            Some(slot) => {
                let block = self.tree.text_blocks()[slot];
                self.write_field(block, field, op)
            }
            None => {
                trace!(offset, field = %display_path(field), "buffering field until its block exists");
                self.pending
                    .entry(offset)
                    .or_default()
                    .push((field.to_vec(), op));
                Ok(())
            }
        }
    }

    /// Replay buffered writes for a marker that just appeared at `offset`
    pub(super) fn drain_pending(&mut self, offset: usize, block: NodeId) -> Result<()> {
        if let Some(ops) = self.pending.remove(&offset) {
            for (field, op) in ops {
                self.write_field(block, &field, op)?;
            }
        }
        Ok(())
    }

    /// Create an implicit block in slot 0 (text now precedes every marker)
    pub(super) fn open_leading_implicit(&mut self) -> NodeId {
        let root = self.tree.root();
        let id = self.tree.new_implicit(&self.config.default_block_type);
        self.tree.set_parent(id, Some(root));
        if let Ok(root_block) = self.tree.block_mut(root) {
            root_block.children.insert(0, id);
        }
        self.tree.insert_entry(0, id);
        self.restructure = true;
        id
    }

    /// Enforce "implicit block iff the document does not start with a marker"
    fn normalize_leading(&mut self) -> Result<()> {
        let entries = self.tree.text_blocks();
        match entries.first().copied() {
            None => {
                self.open_leading_implicit();
            }
            Some(first) if entries.len() > 1 => {
                let block = self.tree.block_ref(first)?;
                if block.origin == BlockOrigin::Implicit && block.text_len() == 0 {
                    self.tree.remove_entry(0);
                    self.detach_block(first)?;
                    self.restructure = true;
                }
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Remove a block that is no longer an entry, handing its children to its parent
    pub(super) fn detach_block(&mut self, id: NodeId) -> Result<()> {
        let parent = self.tree.parent(id).unwrap_or(self.tree.root());
        let children = std::mem::take(&mut self.tree.block_mut(id)?.children);
        for child in &children {
            self.tree.set_parent(*child, Some(parent));
        }
        let siblings = &mut self.tree.block_mut(parent)?.children;
        let at = siblings.iter().position(|c| *c == id).unwrap_or(siblings.len());
        siblings.splice(at..(at + 1).min(siblings.len()), children);

        let inlines = self.tree.block_ref(id)?.inlines.clone();
        for inline in inlines {
            self.tree.remove_node(inline);
        }
        self.tree.remove_node(id);
        Ok(())
    }

    pub(super) fn finish(mut self) -> Result<ApplyReport> {
        if !self.pending.is_empty() {
            return Err(SyncError::UnresolvedBurst {
                offsets: self.pending.keys().copied().collect(),
            });
        }

        self.normalize_leading()?;
        if self.restructure {
            let dropped = self.tree.restructure(self.config.ancestor_policy)?;
            trace!(dropped, "re-placed text blocks");
        }
        self.tree.refresh_index();

        self.report.restructured = self.restructure;
        debug!(
            applied = self.report.applied,
            skipped = self.report.skipped,
            restructured = self.report.restructured,
            "applied patch burst"
        );
        Ok(self.report)
    }
}
