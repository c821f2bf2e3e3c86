//! Structured mark values
//!
//! Replicated engines commonly accept only scalar mark values, so structured
//! values such as `link = {href, title}` travel through the flat model as JSON
//! strings. The codec turns them back into structured values on the way into
//! the tree and encodes them on the way out.

use super::mark::MarkSet;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkCodec {
    structured: BTreeSet<String>,
}

impl MarkCodec {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            structured: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_structured(&self, name: &str) -> bool {
        self.structured.contains(name)
    }

    /// Flat-model value to tree value
    pub fn decode(&self, name: &str, value: &Value) -> Value {
        if self.is_structured(name) {
            if let Value::String(raw) = value {
                if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                    if parsed.is_object() || parsed.is_array() {
                        return parsed;
                    }
                }
            }
        }
        value.clone()
    }

    /// Tree value to flat-model value
    pub fn encode(&self, name: &str, value: &Value) -> Value {
        if self.is_structured(name) && (value.is_object() || value.is_array()) {
            return Value::String(value.to_string());
        }
        value.clone()
    }

    pub fn decode_set(&self, set: &MarkSet) -> MarkSet {
        set.iter()
            .map(|(name, value)| (name.clone(), self.decode(name, value)))
            .collect()
    }
}
