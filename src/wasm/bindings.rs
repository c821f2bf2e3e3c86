//! JavaScript bindings for SpanSync core types

use super::utils::{js_error, parse_json, to_json};
use crate::config::EngineConfig;
use crate::engine::SyncEngine;
use crate::flat::FlatText;
use crate::position::TreePosition;
use crate::reconcile::{EditIntent, FlatOp};
use crate::span::{parse_spans, BlockMarker};
use wasm_bindgen::prelude::*;

/// JavaScript-friendly wrapper for SyncEngine
#[wasm_bindgen]
pub struct WasmSyncEngine {
    inner: SyncEngine,
}

#[wasm_bindgen]
impl WasmSyncEngine {
    /// Mount a session on a spans snapshot (JSON array or `{spans, marks}`)
    ///
    /// `config_json` is an optional camelCase `EngineConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(snapshot_json: &str, config_json: Option<String>) -> Result<WasmSyncEngine, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(|e| js_error("Config", e))?,
            None => EngineConfig::default(),
        };
        let snapshot = parse_json(snapshot_json)?;
        let inner = SyncEngine::mount_json(&snapshot, config).map_err(|e| js_error("Mount", e))?;
        Ok(Self { inner })
    }

    /// Rebuild the tree from a fresh snapshot
    #[wasm_bindgen(js_name = remount)]
    pub fn remount(&mut self, snapshot_json: &str) -> Result<(), JsValue> {
        let snapshot = parse_json(snapshot_json)?;
        self.inner
            .remount_json(&snapshot)
            .map_err(|e| js_error("Remount", e))
    }

    /// Apply a patch burst; returns the apply report as JSON
    #[wasm_bindgen(js_name = applyPatches)]
    pub fn apply_patches(&mut self, burst_json: &str) -> Result<String, JsValue> {
        let burst = parse_json(burst_json)?;
        let report = self
            .inner
            .apply_json(&burst)
            .map_err(|e| js_error("Apply", e))?;
        to_json(&report)
    }

    /// Translate an edit intent into flat operations (JSON array)
    #[wasm_bindgen(js_name = translate)]
    pub fn translate(&self, intent_json: &str) -> Result<String, JsValue> {
        let intent: EditIntent = serde_json::from_str(intent_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid intent: {}", e)))?;
        let ops = self
            .inner
            .translate(&intent)
            .map_err(|e| js_error("Translate", e))?;
        to_json(&ops)
    }

    /// Tree position of a flat offset, as JSON
    #[wasm_bindgen(js_name = toTreePosition)]
    pub fn to_tree_position(&self, offset: usize) -> Result<String, JsValue> {
        let mapper = self.inner.mapper().map_err(|e| js_error("Map", e))?;
        let position = mapper
            .to_tree_position(offset)
            .map_err(|e| js_error("Map", e))?;
        to_json(&position)
    }

    /// Flat offset of a JSON tree position
    #[wasm_bindgen(js_name = toFlatOffset)]
    pub fn to_flat_offset(&self, position_json: &str) -> Result<usize, JsValue> {
        let position: TreePosition = serde_json::from_str(position_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid position: {}", e)))?;
        let mapper = self.inner.mapper().map_err(|e| js_error("Map", e))?;
        mapper
            .to_flat_offset(&position)
            .map_err(|e| js_error("Map", e))
    }

    /// Tree snapshot as JSON
    #[wasm_bindgen(js_name = snapshot)]
    pub fn snapshot(&self) -> Result<String, JsValue> {
        to_json(&self.inner.snapshot())
    }

    #[wasm_bindgen(js_name = visibleText)]
    pub fn visible_text(&self) -> String {
        self.inner.tree().visible_text()
    }

    #[wasm_bindgen(js_name = sessionId)]
    pub fn session_id(&self) -> String {
        self.inner.session_id().to_string()
    }

    #[wasm_bindgen(js_name = isDesynchronized)]
    pub fn is_desynchronized(&self) -> bool {
        self.inner.is_desynchronized()
    }
}

/// JavaScript-friendly wrapper for the reference flat model
///
/// Every mutation returns the patch burst (JSON) to feed into
/// `WasmSyncEngine.applyPatches`.
#[wasm_bindgen]
pub struct WasmFlatText {
    inner: FlatText,
}

impl Default for WasmFlatText {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmFlatText {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: FlatText::new(),
        }
    }

    /// Load from a spans snapshot (JSON array or `{spans, marks}`)
    #[wasm_bindgen(js_name = fromSnapshot)]
    pub fn from_snapshot(snapshot_json: &str) -> Result<WasmFlatText, JsValue> {
        let snapshot = parse_spans(&parse_json(snapshot_json)?).map_err(|e| js_error("Load", e))?;
        let inner = FlatText::from_snapshot(&snapshot).map_err(|e| js_error("Load", e))?;
        Ok(Self { inner })
    }

    #[wasm_bindgen(js_name = splice)]
    pub fn splice(&mut self, index: usize, delete_count: usize, text: &str) -> Result<String, JsValue> {
        let burst = self
            .inner
            .splice(index, delete_count, text)
            .map_err(|e| js_error("Splice", e))?;
        to_json(&burst)
    }

    #[wasm_bindgen(js_name = splitBlock)]
    pub fn split_block(&mut self, index: usize, block_json: &str) -> Result<String, JsValue> {
        let block: BlockMarker = serde_json::from_str(block_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid block: {}", e)))?;
        let burst = self
            .inner
            .split_block(index, block)
            .map_err(|e| js_error("Split block", e))?;
        to_json(&burst)
    }

    #[wasm_bindgen(js_name = joinBlock)]
    pub fn join_block(&mut self, index: usize) -> Result<String, JsValue> {
        let burst = self
            .inner
            .join_block(index)
            .map_err(|e| js_error("Join block", e))?;
        to_json(&burst)
    }

    /// Execute one flat operation as produced by `WasmSyncEngine.translate`
    #[wasm_bindgen(js_name = applyOp)]
    pub fn apply_op(&mut self, op_json: &str) -> Result<String, JsValue> {
        let op: FlatOp = serde_json::from_str(op_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid op: {}", e)))?;
        let burst = self.inner.apply_op(&op).map_err(|e| js_error("Apply op", e))?;
        to_json(&burst)
    }

    /// Spans and marks as JSON
    #[wasm_bindgen(js_name = snapshot)]
    pub fn snapshot(&self) -> Result<String, JsValue> {
        to_json(&self.inner.snapshot())
    }

    /// Text with block markers rendered as newlines
    #[wasm_bindgen(js_name = toString)]
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        self.inner.to_plain_string()
    }

    #[wasm_bindgen(js_name = length)]
    pub fn length(&self) -> usize {
        self.inner.len()
    }
}
