//! Patch model
//!
//! Patches are the fine-grained change operations the replicated engine emits
//! after every local or remote change. They are a closed set of variants with
//! an `action` discriminator; unknown actions are rejected while parsing, so
//! the applier never has to duck-type payloads.
//!
//! One logical change arrives as an ordered burst. Splitting a block, for
//! instance, produces:
//!
//! ```text
//! insert ["text", 11]            values: [{}]
//! put    ["text", 11, "type"]    "paragraph"
//! put    ["text", 11, "parents"] []
//! put    ["text", 11, "attrs"]   {}
//! ```

mod path;

pub use path::{display_path, resolve, text_path_with, Path, Prop, Target};

use crate::error::{Result, SyncError};
use crate::span::MarkSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn one() -> usize {
    1
}

/// A single change operation against the flat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Patch {
    /// Insert block markers (object values) or characters (string values)
    Insert { path: Path, values: Vec<Value> },

    /// Set a block field, or a whole block when the path ends at an offset
    Put { path: Path, value: Value },

    /// Remove `length` flat items, or a block field
    #[serde(alias = "del")]
    Delete {
        path: Path,
        #[serde(default = "one")]
        length: usize,
    },

    /// Delete then insert text at `index`
    Splice {
        path: Path,
        index: usize,
        #[serde(default, rename = "deleteCount")]
        delete_count: usize,
        #[serde(default)]
        value: String,
        #[serde(default)]
        marks: MarkSet,
    },

    /// Set a mark over `[start, end)`; a null value removes it
    Mark {
        path: Path,
        name: String,
        value: Value,
        start: usize,
        end: usize,
    },
}

impl Patch {
    pub fn path(&self) -> &[Prop] {
        match self {
            Patch::Insert { path, .. }
            | Patch::Put { path, .. }
            | Patch::Delete { path, .. }
            | Patch::Splice { path, .. }
            | Patch::Mark { path, .. } => path,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Patch::Insert { .. } => "insert",
            Patch::Put { .. } => "put",
            Patch::Delete { .. } => "delete",
            Patch::Splice { .. } => "splice",
            Patch::Mark { .. } => "mark",
        }
    }

    /// Parse one patch
    ///
    /// A splice carrying its index as the path tail (`path: ["text", 5]`
    /// without an `index` field) is normalized to `path: ["text"], index: 5`.
    pub fn from_json(value: &Value) -> Result<Patch> {
        let mut raw = value.clone();
        normalize_splice(&mut raw)?;
        serde_json::from_value(raw).map_err(|e| SyncError::InvalidPatch(e.to_string()))
    }

    /// Parse a whole burst
    ///
    /// Accepts the grouped mark form (`{"action": "mark", "path": [...],
    /// "marks": [{name, value, start, end}, ...]}`) and expands it into one
    /// [`Patch::Mark`] per entry.
    pub fn parse_burst(value: &Value) -> Result<Vec<Patch>> {
        let items = value
            .as_array()
            .ok_or_else(|| SyncError::InvalidPatch("expected an array of patches".to_string()))?;

        let mut patches = Vec::with_capacity(items.len());
        for item in items {
            let grouped = item.get("action").and_then(Value::as_str) == Some("mark")
                && item.get("marks").is_some();
            if !grouped {
                patches.push(Patch::from_json(item)?);
                continue;
            }

            let path: Path = serde_json::from_value(item.get("path").cloned().unwrap_or(Value::Null))
                .map_err(|e| SyncError::InvalidPatch(format!("bad mark path: {}", e)))?;
            let marks = item
                .get("marks")
                .and_then(Value::as_array)
                .ok_or_else(|| SyncError::InvalidPatch("'marks' must be an array".to_string()))?;
            for mark in marks {
                let mark: crate::span::Mark = serde_json::from_value(mark.clone())
                    .map_err(|e| SyncError::InvalidPatch(format!("bad mark: {}", e)))?;
                patches.push(Patch::Mark {
                    path: path.clone(),
                    name: mark.name,
                    value: mark.value,
                    start: mark.start,
                    end: mark.end,
                });
            }
        }
        Ok(patches)
    }
}

fn normalize_splice(raw: &mut Value) -> Result<()> {
    if !raw.is_object() {
        return Err(SyncError::InvalidPatch(format!("patch must be an object: {}", raw)));
    }
    let Some(obj) = raw.as_object_mut() else {
        return Ok(());
    };
    if obj.get("action").and_then(Value::as_str) != Some("splice") || obj.contains_key("index") {
        return Ok(());
    }
    let Some(Value::Array(path)) = obj.get_mut("path") else {
        return Ok(());
    };
    let index = match path.last() {
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };
    if let Some(index) = index {
        path.pop();
        obj.insert("index".to_string(), Value::from(index));
    }
    Ok(())
}
