//! Span and BlockMarker: the two kinds of segment in the flat model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Descriptor of a structural block boundary
///
/// `parents` lists the enclosing block types, oldest ancestor first. A list
/// item inside an ordered list is `{type: "list_item", parents: ["ordered_list"]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockMarker {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl BlockMarker {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            parents: Vec::new(),
            attrs: Map::new(),
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.block_type,
            "parents": self.parents,
            "attrs": self.attrs,
        })
    }
}

/// One segment of the flat document
///
/// Serialized the way replicated engines emit spans:
/// `{"type": "text", "value": "Hello"}` or `{"type": "block", "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Span {
    /// A run of characters with no block boundary inside it
    Text(String),
    /// A block boundary; occupies exactly one flat position
    Block(BlockMarker),
}

impl Span {
    pub fn text(content: impl Into<String>) -> Self {
        Span::Text(content.into())
    }

    pub fn block(marker: BlockMarker) -> Self {
        Span::Block(marker)
    }

    /// Number of flat positions this span occupies
    pub fn flat_len(&self) -> usize {
        match self {
            Span::Text(content) => content.chars().count(),
            Span::Block(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_len() {
        assert_eq!(Span::text("Hello 👋").flat_len(), 7);
        assert_eq!(Span::block(BlockMarker::new("paragraph")).flat_len(), 1);
    }

    #[test]
    fn test_span_serialization() {
        let spans = vec![
            Span::block(
                BlockMarker::new("heading")
                    .with_parents(["blockquote"])
                    .with_attr("level", json!(2)),
            ),
            Span::text("Title"),
        ];
        let json = serde_json::to_value(&spans).unwrap();
        assert_eq!(
            json,
            json!([
                {"type": "block", "value": {"type": "heading", "parents": ["blockquote"], "attrs": {"level": 2}}},
                {"type": "text", "value": "Title"}
            ])
        );
        let back: Vec<Span> = serde_json::from_value(json).unwrap();
        assert_eq!(back, spans);
    }

    #[test]
    fn test_marker_defaults() {
        let marker: BlockMarker = serde_json::from_value(json!({"type": "paragraph"})).unwrap();
        assert!(marker.parents.is_empty());
        assert!(marker.attrs.is_empty());
    }
}
