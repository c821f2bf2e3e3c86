//! Document tree: the hierarchical side of the synchronization
//!
//! The tree is an arena of block and inline nodes rooted at an implicit
//! container. Block nodes opened by markers own exactly one flat position;
//! containers synthesized from `parents` chains own none.
//!
//! ```text
//! doc (root)
//! ├── paragraph (implicit)      "Hello "
//! └── bullet_list (container)
//!     └── list_item (container)
//!         └── paragraph (marker) "one"
//! ```

mod builder;
mod document;
mod edit;
mod node;
pub(crate) mod placement;
mod snapshot;

pub use builder::build;
pub use document::DocumentTree;
pub use node::{BlockNode, BlockOrigin, InlineNode, Node, NodeId, NodeKind};
pub(crate) use node::byte_offset;
pub use snapshot::SnapshotNode;
