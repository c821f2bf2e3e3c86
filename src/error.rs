//! Error types for span/tree synchronization
//!
//! Every failure the engine can report falls in one of four categories (see
//! [`ErrorKind`]). Structural errors mean the input disagreed with the tree;
//! after one of those the tree may be half-updated and the session has to be
//! rebuilt from a fresh snapshot.

use crate::tree::NodeId;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Broad category of a [`SyncError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input references a path or parent chain inconsistent with the tree
    Structural,
    /// A flat offset or tree position is outside the document
    PositionOutOfRange,
    /// A mark range is empty, inverted, or outside the document
    MarkRange,
    /// Malformed input rejected at the boundary (JSON, config, text)
    Input,
    /// The session refused work after an earlier failure
    Session,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Block '{block_type}' needs {missing} undeclared ancestor levels ({parents:?})")]
    MissingAncestors {
        block_type: String,
        parents: Vec<String>,
        missing: usize,
    },

    #[error("No block marker at flat offset {offset}")]
    NoBlockAt { offset: usize },

    #[error("Invalid block field '{field}': {reason}")]
    InvalidBlockField { field: String, reason: String },

    #[error("Unsupported patch path: {path}")]
    UnsupportedPath { path: String },

    #[error("Burst ended with buffered fields for offsets {offsets:?} that never materialized")]
    UnresolvedBurst { offsets: Vec<usize> },

    #[error("Node {0} does not address flat text")]
    NotAddressable(NodeId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Position {offset} out of bounds (length: {length})")]
    PositionOutOfRange { offset: usize, length: usize },

    #[error("Invalid mark range {start}..{end}")]
    InvalidMarkRange { start: usize, end: usize },

    #[error("Mark range {start}..{end} out of bounds (length: {length})")]
    MarkOutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Invalid span: {0}")]
    InvalidSpan(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid text: {0}")]
    InvalidText(String),

    #[error("Tree is out of sync with the flat model; remount from a fresh snapshot")]
    Desynchronized,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::MissingAncestors { .. }
            | SyncError::NoBlockAt { .. }
            | SyncError::InvalidBlockField { .. }
            | SyncError::UnsupportedPath { .. }
            | SyncError::UnresolvedBurst { .. }
            | SyncError::NotAddressable(_)
            | SyncError::UnknownNode(_) => ErrorKind::Structural,
            SyncError::PositionOutOfRange { .. } => ErrorKind::PositionOutOfRange,
            SyncError::InvalidMarkRange { .. } | SyncError::MarkOutOfBounds { .. } => {
                ErrorKind::MarkRange
            }
            SyncError::InvalidPatch(_)
            | SyncError::InvalidSpan(_)
            | SyncError::InvalidConfig(_)
            | SyncError::InvalidText(_) => ErrorKind::Input,
            SyncError::Desynchronized => ErrorKind::Session,
        }
    }

    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::InvalidBlockField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
