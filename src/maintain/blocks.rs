//! Block-marker patches: insert, remove, and field writes

use super::burst::{Burst, FieldOp};
use crate::error::{Result, SyncError};
use crate::patch::{display_path, Prop};
use crate::span::MarkSet;
use crate::tree::{BlockNode, BlockOrigin, NodeId, NodeKind};
use serde_json::{Map, Value};

/// Fields of a block value as delivered in `insert` / whole-block `put`
struct BlockFields {
    block_type: Option<String>,
    parents: Option<Vec<String>>,
    attrs: Option<Map<String, Value>>,
}

fn parse_block(value: &Value) -> Result<BlockFields> {
    let obj = value
        .as_object()
        .ok_or_else(|| SyncError::field("block", format!("expected an object, got {}", value)))?;
    let block_type = match obj.get("type") {
        None | Some(Value::Null) => None,
        Some(other) => Some(parse_type(other)?),
    };
    let parents = match obj.get("parents") {
        None | Some(Value::Null) => None,
        Some(other) => Some(parse_parents(other)?),
    };
    let attrs = match obj.get("attrs") {
        None | Some(Value::Null) => None,
        Some(other) => Some(parse_attrs(other)?),
    };
    Ok(BlockFields {
        block_type,
        parents,
        attrs,
    })
}

fn parse_type(value: &Value) -> Result<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SyncError::field("type", format!("expected a block type, got {}", value)))
}

fn parse_parent(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SyncError::field("parents", format!("expected a block type, got {}", value)))
}

fn parse_parents(value: &Value) -> Result<Vec<String>> {
    value
        .as_array()
        .ok_or_else(|| SyncError::field("parents", format!("expected an array, got {}", value)))?
        .iter()
        .map(parse_parent)
        .collect()
}

fn parse_attrs(value: &Value) -> Result<Map<String, Value>> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| SyncError::field("attrs", format!("expected an object, got {}", value)))
}

impl Burst<'_> {
    /// `insert` at `["text", offset]`: markers for objects, characters for strings
    pub(super) fn insert_values(&mut self, offset: usize, values: &[Value]) -> Result<()> {
        self.check_offset(offset)?;
        let mut at = offset;
        for value in values {
            match value {
                Value::Object(_) => {
                    self.insert_marker(at, value)?;
                    at += 1;
                }
                Value::String(text) => {
                    self.insert_text_at(at, text, &MarkSet::new())?;
                    at += text.chars().count();
                }
                other => {
                    return Err(SyncError::InvalidPatch(format!(
                        "cannot insert {} into text",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Open a new text block whose marker sits at `offset`
    ///
    /// The text after the insertion point inside the containing block moves
    /// into the new block.
    fn insert_marker(&mut self, offset: usize, value: &Value) -> Result<NodeId> {
        let fields = parse_block(value)?;
        self.tree.refresh_index();
        let length = self.tree.flat_len();
        if offset > length {
            return Err(SyncError::PositionOutOfRange { offset, length });
        }

        let (slot, moved, parent) = match self.tree.entry_for_content(offset) {
            Some(containing) => {
                let block = self.tree.text_blocks()[containing];
                let local = offset - self.tree.content_start(containing);
                let moved = self.tree.take_inlines_from(block, local)?;
                let parent = self.tree.parent(block).unwrap_or(self.tree.root());
                (containing + 1, moved, parent)
            }
            None => (0, Vec::new(), self.tree.root()),
        };

        let mut node = BlockNode::new(
            fields
                .block_type
                .unwrap_or_else(|| self.config.default_block_type.clone()),
            BlockOrigin::Marker,
        );
        node.parents = fields.parents.unwrap_or_default();
        node.attrs = fields.attrs.unwrap_or_default();

        let id = self.tree.alloc(Some(parent), NodeKind::Block(node));
        if let Ok(parent_block) = self.tree.block_mut(parent) {
            parent_block.children.push(id);
        }
        self.tree.insert_entry(slot, id);
        self.tree.append_inlines(id, moved)?;
        self.restructure = true;

        self.drain_pending(offset, id)?;
        Ok(id)
    }

    /// Drop the marker of entry `slot`, merging its text backwards
    pub(super) fn remove_marker(&mut self, slot: usize) -> Result<()> {
        let id = self.tree.text_blocks()[slot];
        let length = self.tree.block_ref(id)?.text_len();
        let inlines = self.tree.take_inlines_from(id, 0)?;
        self.tree.remove_entry(slot);

        let target = match slot.checked_sub(1) {
            Some(previous) => self.tree.text_blocks()[previous],
            None => self.open_leading_implicit(),
        };
        self.tree.append_inlines(target, inlines)?;
        self.detach_block(id)?;
        self.restructure = true;

        tracing::trace!(block = %id, merged_into = %target, moved = length, "removed block marker");
        Ok(())
    }

    /// Apply a field operation to the marker block `block`
    pub(super) fn write_field(&mut self, block: NodeId, field: &[Prop], op: FieldOp) -> Result<()> {
        let unsupported = || SyncError::UnsupportedPath {
            path: display_path(field),
        };
        let keys: Vec<Option<&str>> = field.iter().map(Prop::as_key).collect();

        match (keys.as_slice(), op) {
            ([], FieldOp::Put(value)) => {
                let fields = parse_block(&value)?;
                let node = self.tree.block_mut(block)?;
                if let Some(block_type) = fields.block_type {
                    node.block_type = block_type;
                }
                node.parents = fields.parents.unwrap_or_default();
                node.attrs = fields.attrs.unwrap_or_default();
                self.restructure = true;
            }
            ([Some("type")], FieldOp::Put(value)) => {
                let block_type = parse_type(&value)?;
                let node = self.tree.block_mut(block)?;
                if node.block_type != block_type {
                    node.block_type = block_type;
                    self.restructure = true;
                }
            }
            ([Some("parents")], FieldOp::Put(value)) => {
                let parents = parse_parents(&value)?;
                let node = self.tree.block_mut(block)?;
                if node.parents != parents {
                    node.parents = parents;
                    self.restructure = true;
                }
            }
            ([Some("parents"), None], op) => {
                let index = field[1].as_index().ok_or_else(unsupported)?;
                let node = self.tree.block_mut(block)?;
                match op {
                    FieldOp::Put(value) => {
                        let parent = parse_parent(&value)?;
                        match index.cmp(&node.parents.len()) {
                            std::cmp::Ordering::Less => node.parents[index] = parent,
                            std::cmp::Ordering::Equal => node.parents.push(parent),
                            std::cmp::Ordering::Greater => return Err(out_of_list(field, index)),
                        }
                    }
                    FieldOp::Insert(values) => {
                        if index > node.parents.len() {
                            return Err(out_of_list(field, index));
                        }
                        let parsed = values.iter().map(parse_parent).collect::<Result<Vec<_>>>()?;
                        node.parents.splice(index..index, parsed);
                    }
                    FieldOp::Delete => {
                        if index >= node.parents.len() {
                            return Err(out_of_list(field, index));
                        }
                        node.parents.remove(index);
                    }
                }
                self.restructure = true;
            }
            ([Some("attrs")], FieldOp::Put(value)) => {
                self.tree.block_mut(block)?.attrs = parse_attrs(&value)?;
            }
            ([Some("attrs")], FieldOp::Delete) => {
                self.tree.block_mut(block)?.attrs.clear();
            }
            ([Some("attrs"), ..], op) => {
                let attrs = &mut self.tree.block_mut(block)?.attrs;
                write_nested(attrs, &field[1..], op).map_err(|reason| SyncError::field(display_path(field), reason))?;
            }
            _ => return Err(unsupported()),
        }
        Ok(())
    }
}

fn out_of_list(field: &[Prop], index: usize) -> SyncError {
    SyncError::field(display_path(field), format!("index {} out of range", index))
}

/// Write into a nested attribute path, creating intermediate objects
fn write_nested(
    attrs: &mut Map<String, Value>,
    path: &[Prop],
    op: FieldOp,
) -> std::result::Result<(), String> {
    let Some((Prop::Key(key), rest)) = path.split_first() else {
        return Err("attribute paths start with a key".to_string());
    };
    if rest.is_empty() {
        match op {
            FieldOp::Put(value) => {
                attrs.insert(key.clone(), value);
            }
            FieldOp::Delete => {
                attrs.remove(key);
            }
            FieldOp::Insert(_) => return Err("cannot insert into an attribute key".to_string()),
        }
        return Ok(());
    }
    let slot = attrs
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    write_value(slot, rest, op)
}

fn write_value(target: &mut Value, path: &[Prop], op: FieldOp) -> std::result::Result<(), String> {
    let Some((head, rest)) = path.split_first() else {
        return Err("empty attribute path".to_string());
    };
    match (target, head) {
        (Value::Object(map), Prop::Key(_)) => write_nested(map, path, op),
        (Value::Array(items), Prop::Index(index)) => {
            let index = *index;
            if !rest.is_empty() {
                let item = items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {} out of range", index))?;
                return write_value(item, rest, op);
            }
            match op {
                FieldOp::Put(value) if index < items.len() => items[index] = value,
                FieldOp::Put(value) if index == items.len() => items.push(value),
                FieldOp::Insert(values) if index <= items.len() => {
                    items.splice(index..index, values);
                }
                FieldOp::Delete if index < items.len() => {
                    items.remove(index);
                }
                _ => return Err(format!("index {} out of range", index)),
            }
            Ok(())
        }
        (other, head) => Err(format!("cannot address {} inside {}", head, other)),
    }
}
