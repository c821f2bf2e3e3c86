//! Patch paths
//!
//! A path is the configured text path (`["text"]` by default) followed by the
//! flat offset of a block marker and then the field being addressed:
//!
//! ```text
//! ["text"]                          splice / mark target
//! ["text", 5]                       the marker at flat offset 5
//! ["text", 5, "type"]               its block type
//! ["text", 5, "parents", 1]         one entry of its parents chain
//! ["text", 5, "attrs", "level"]     one attribute (may nest further)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prop {
    Index(usize),
    Key(String),
}

impl Prop {
    pub fn key(key: impl Into<String>) -> Self {
        Prop::Key(key.into())
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Prop::Index(i) => Some(*i),
            Prop::Key(_) => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Prop::Key(k) => Some(k),
            Prop::Index(_) => None,
        }
    }
}

impl From<usize> for Prop {
    fn from(index: usize) -> Self {
        Prop::Index(index)
    }
}

impl From<&str> for Prop {
    fn from(key: &str) -> Self {
        Prop::Key(key.to_string())
    }
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prop::Index(i) => write!(f, "{}", i),
            Prop::Key(k) => write!(f, "{}", k),
        }
    }
}

pub type Path = Vec<Prop>;

/// Render a path as `text/5/attrs/level` for diagnostics
pub fn display_path(path: &[Prop]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Build `text_path ++ extra`
pub fn text_path_with(text_path: &[String], extra: impl IntoIterator<Item = Prop>) -> Path {
    text_path
        .iter()
        .map(|k| Prop::Key(k.clone()))
        .chain(extra)
        .collect()
}

/// Where a patch path points, relative to the text object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// Not under the text path at all
    Outside,
    /// The text object itself
    Text,
    /// The flat item at an offset (a character or a block marker)
    Offset(usize),
    /// A field of the block marker at an offset
    Field { offset: usize, field: &'a [Prop] },
}

/// Classify `path` against the configured text path
pub fn resolve<'a>(path: &'a [Prop], text_path: &[String]) -> Target<'a> {
    if path.len() < text_path.len() {
        return Target::Outside;
    }
    let matches = path
        .iter()
        .zip(text_path)
        .all(|(prop, key)| prop.as_key() == Some(key.as_str()));
    if !matches {
        return Target::Outside;
    }

    let rest = &path[text_path.len()..];
    match rest.split_first() {
        None => Target::Text,
        Some((Prop::Index(offset), [])) => Target::Offset(*offset),
        Some((Prop::Index(offset), field)) => Target::Field {
            offset: *offset,
            field,
        },
        Some((Prop::Key(_), _)) => Target::Outside,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> Vec<String> {
        vec!["text".to_string()]
    }

    #[test]
    fn test_resolve_targets() {
        let path: Path = vec!["text".into()];
        assert_eq!(resolve(&path, &text()), Target::Text);

        let path: Path = vec!["text".into(), 5.into()];
        assert_eq!(resolve(&path, &text()), Target::Offset(5));

        let path: Path = vec!["text".into(), 5.into(), "attrs".into(), "level".into()];
        match resolve(&path, &text()) {
            Target::Field { offset, field } => {
                assert_eq!(offset, 5);
                assert_eq!(display_path(field), "attrs/level");
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_resolve_outside() {
        let path: Path = vec!["title".into()];
        assert_eq!(resolve(&path, &text()), Target::Outside);

        let path: Path = vec![];
        assert_eq!(resolve(&path, &text()), Target::Outside);

        let nested = vec!["doc".to_string(), "body".to_string()];
        let path: Path = vec!["doc".into(), "body".into(), 3.into()];
        assert_eq!(resolve(&path, &nested), Target::Offset(3));
    }

    #[test]
    fn test_path_json_shape() {
        let path: Path = serde_json::from_str(r#"["text", 5, "type"]"#).unwrap();
        assert_eq!(path, vec![Prop::key("text"), Prop::Index(5), Prop::key("type")]);
        assert_eq!(display_path(&path), "text/5/type");
    }
}
