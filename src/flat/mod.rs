//! Reference flat model
//!
//! A single-replica stand-in for the replicated engine: it holds the flat
//! sequence (text plus block placeholders) and its marks, executes
//! [`FlatOp`](crate::reconcile::FlatOp)s, and emits the patch bursts the
//! applier consumes. Tests, benchmarks and demos drive the sync loop through
//! it:
//!
//! ```text
//! FlatText --patches--> apply_patches --> DocumentTree
//!    ^                                         |
//!    +---------- FlatOp <-- Reconciler <--------+
//! ```
//!
//! Merging concurrent edits is not its job.

mod marks;
mod text;

pub use marks::FlatMark;
pub use text::FlatText;

/// Character a block marker occupies in the rope
pub const PLACEHOLDER: char = '\u{FFFC}';
