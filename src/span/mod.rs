//! Span model: the flat side of the synchronization
//!
//! The replicated engine exposes a document as a flat sequence of spans:
//! text runs and block markers, each marker occupying one flat position.
//! Inline formatting lives beside the spans as marks over flat ranges.
//!
//! ```text
//!  offset:  0 1 2 3 4 5 6 7 8 9 10 11
//!  flat:    H e l l o ¶ W o r l d
//!                     └ block marker {type: "paragraph", parents: []}
//!  marks:             strong [6, 11)
//! ```

mod codec;
mod mark;
mod marker;
mod reader;

pub use codec::MarkCodec;
pub use mark::{Expand, Mark, MarkRange, MarkSet};
pub(crate) use mark::validate_range;
pub use marker::{BlockMarker, Span};
pub use reader::{
    flat_length, parse_spans, visible_text, MarkCursor, SpanEvent, SpanReader, SpanSnapshot,
};
