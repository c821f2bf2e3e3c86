//! Incremental Patch Applier
//!
//! Mutates an existing [`DocumentTree`] in place so it matches the flat model
//! after a patch burst, without rebuilding it. Patches are applied strictly
//! in order:
//!
//! - text edits (`splice`, character `delete`) touch only the inline nodes
//!   around the edit, splitting or merging just enough to keep every inline's
//!   mark set uniform and maximal
//! - marker edits (`insert {}`, marker `delete`, `put type/parents`) update
//!   the text-block list immediately and defer placement: the shared
//!   placement routine runs once when the burst ends, reusing every container
//!   whose position did not change
//! - field writes aimed at an offset with no marker yet are buffered until a
//!   marker materializes there; leftovers fail the burst
//!
//! # Example
//!
//! ```rust
//! use spansync_core::config::EngineConfig;
//! use spansync_core::maintain::apply_patches;
//! use spansync_core::patch::Patch;
//! use spansync_core::span::Span;
//! use spansync_core::tree::build;
//!
//! let config = EngineConfig::default();
//! let mut tree = build(&[Span::text("Hello World")], &[], &config).unwrap();
//!
//! let burst = Patch::parse_burst(&serde_json::json!([
//!     {"action": "splice", "path": ["text", 11], "value": "!"}
//! ]))
//! .unwrap();
//! let report = apply_patches(&mut tree, &burst, &config).unwrap();
//!
//! assert_eq!(report.applied, 1);
//! assert_eq!(tree.visible_text(), "Hello World!");
//! ```

mod blocks;
mod burst;
mod marks;
mod text;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::patch::Patch;
use crate::tree::DocumentTree;
use burst::Burst;
use serde::{Deserialize, Serialize};

/// Outcome of one applied burst
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Patches that changed (or were checked against) the tree
    pub applied: usize,
    /// Patches outside the text path, ignored
    pub skipped: usize,
    /// Whether block placement had to be recomputed
    pub restructured: bool,
}

/// Apply one ordered burst to `tree`
///
/// On error the tree may be partially updated; callers decide whether to
/// roll back or rebuild (see [`FailurePolicy`](crate::config::FailurePolicy)).
pub fn apply_patches(
    tree: &mut DocumentTree,
    patches: &[Patch],
    config: &EngineConfig,
) -> Result<ApplyReport> {
    let mut burst = Burst::new(tree, config);
    for patch in patches {
        burst.apply(patch)?;
    }
    burst.finish()
}
