//! SpanSync Core - rich-text span/tree synchronization
//!
//! Keeps a hierarchical document tree in lockstep with a replicated flat
//! rich-text model (characters, block markers and mark ranges). It
//! implements:
//! - Tree building from a spans snapshot
//! - Incremental patch application with stable node identity
//! - Flat offset / tree position mapping
//! - Translation of tree-level edit intents into flat operations
//!
//! # Examples
//!
//! ```rust
//! use spansync_core::{EngineConfig, SyncEngine};
//! use spansync_core::span::{BlockMarker, Span};
//!
//! let spans = vec![
//!     Span::block(BlockMarker::new("heading")),
//!     Span::text("Title"),
//!     Span::block(BlockMarker::new("paragraph")),
//!     Span::text("Body"),
//! ];
//! let mut engine = SyncEngine::mount(&spans, &[], EngineConfig::default()).unwrap();
//!
//! engine
//!     .apply_json(&serde_json::json!([
//!         {"action": "splice", "path": ["text", 11], "value": "!"}
//!     ]))
//!     .unwrap();
//! assert_eq!(engine.tree().visible_text(), "TitleBody!");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod flat;
pub mod maintain;
pub mod patch;
pub mod position;
pub mod reconcile;
pub mod span;
pub mod tree;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use config::{AncestorPolicy, BoundaryAffinity, EngineConfig, FailurePolicy};
pub use engine::SyncEngine;
pub use error::{ErrorKind, Result, SyncError};
pub use maintain::{apply_patches, ApplyReport};
pub use patch::Patch;
pub use position::{PositionMapper, TreePosition, TreeSelection};
pub use reconcile::{EditIntent, FlatOp, Reconciler};
pub use tree::{build, DocumentTree, NodeId, SnapshotNode};
