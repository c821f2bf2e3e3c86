//! WASM utility functions

use crate::error::SyncError;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Engine error as a JS value, prefixed with what was being attempted
pub(crate) fn js_error(context: &str, err: SyncError) -> JsValue {
    JsValue::from_str(&format!("{} failed: {}", context, err))
}

pub(crate) fn parse_json(json: &str) -> Result<serde_json::Value, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("JSON serialization failed: {}", e)))
}
