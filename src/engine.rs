//! Sync engine session
//!
//! [`SyncEngine`] owns one document tree for the lifetime of an editing
//! session and is the single place the tree gets mutated. It mounts the tree
//! from a spans snapshot, applies patch bursts, and hands out read-only views
//! (snapshots, position mapping, edit translation) to the presentation layer.

use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{Result, SyncError};
use crate::maintain::{apply_patches, ApplyReport};
use crate::patch::Patch;
use crate::position::PositionMapper;
use crate::reconcile::{EditIntent, FlatOp, Reconciler};
use crate::span::{parse_spans, Mark, Span};
use crate::tree::{build, DocumentTree, SnapshotNode};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct SyncEngine {
    session: Uuid,
    config: EngineConfig,
    tree: DocumentTree,
    desynchronized: bool,
}

impl SyncEngine {
    /// Mount a session on a spans snapshot
    #[instrument(skip_all, fields(spans = spans.len(), marks = marks.len()))]
    pub fn mount(spans: &[Span], marks: &[Mark], config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tree = build(spans, marks, &config)?;
        let session = Uuid::new_v4();
        info!(
            %session,
            blocks = tree.text_blocks().len(),
            length = tree.flat_len(),
            "mounted document"
        );
        Ok(Self {
            session,
            config,
            tree,
            desynchronized: false,
        })
    }

    /// Mount from the JSON spans form (an array, or `{spans, marks}`)
    pub fn mount_json(snapshot: &Value, config: EngineConfig) -> Result<Self> {
        let snapshot = parse_spans(snapshot)?;
        Self::mount(&snapshot.spans, &snapshot.marks, config)
    }

    /// Rebuild the tree from a fresh snapshot, clearing a poisoned session
    ///
    /// The session id is kept.
    #[instrument(skip_all, fields(session = %self.session))]
    pub fn remount(&mut self, spans: &[Span], marks: &[Mark]) -> Result<()> {
        self.tree = build(spans, marks, &self.config)?;
        self.desynchronized = false;
        info!(blocks = self.tree.text_blocks().len(), "remounted document");
        Ok(())
    }

    pub fn remount_json(&mut self, snapshot: &Value) -> Result<()> {
        let snapshot = parse_spans(snapshot)?;
        self.remount(&snapshot.spans, &snapshot.marks)
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    /// Whether an earlier failed burst left the tree out of sync
    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    fn ensure_synchronized(&self) -> Result<()> {
        if self.desynchronized {
            return Err(SyncError::Desynchronized);
        }
        Ok(())
    }

    /// Apply one patch burst
    ///
    /// On failure the configured [`FailurePolicy`] decides what happens to the
    /// tree: `poison` leaves it as it is and refuses further work until
    /// [`remount`](Self::remount), `rollback` restores the pre-burst tree.
    #[instrument(skip_all, fields(session = %self.session, patches = patches.len()))]
    pub fn apply(&mut self, patches: &[Patch]) -> Result<ApplyReport> {
        self.ensure_synchronized()?;

        let backup = match self.config.failure_policy {
            FailurePolicy::Rollback => Some(self.tree.clone()),
            FailurePolicy::Poison => None,
        };

        match apply_patches(&mut self.tree, patches, &self.config) {
            Ok(report) => Ok(report),
            Err(err) => {
                match backup {
                    Some(tree) => {
                        self.tree = tree;
                        warn!(error = %err, "burst failed, tree rolled back");
                    }
                    None => {
                        self.desynchronized = true;
                        warn!(error = %err, "burst failed, session desynchronized");
                    }
                }
                Err(err)
            }
        }
    }

    /// Parse and apply a JSON burst; parse errors leave the session untouched
    pub fn apply_json(&mut self, burst: &Value) -> Result<ApplyReport> {
        let patches = Patch::parse_burst(burst)?;
        self.apply(&patches)
    }

    pub fn translate(&self, intent: &EditIntent) -> Result<Vec<FlatOp>> {
        self.ensure_synchronized()?;
        Reconciler::new(&self.tree, &self.config).translate(intent)
    }

    pub fn mapper(&self) -> Result<PositionMapper<'_>> {
        self.ensure_synchronized()?;
        Ok(PositionMapper::new(&self.tree, self.config.boundary_affinity))
    }

    pub fn snapshot(&self) -> SnapshotNode {
        self.tree.snapshot()
    }
}
