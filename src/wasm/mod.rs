//! WASM bindings for SpanSync
//!
//! JSON in, JSON out: spans, patch bursts, edit intents and tree snapshots
//! cross the boundary as JSON strings so the presentation layer can stay
//! agnostic of the Rust types.

pub mod bindings;
pub mod utils;

pub use bindings::{WasmFlatText, WasmSyncEngine};
