//! Engine configuration
//!
//! Loaded from camelCase JSON; every field has a default so `{}` is a valid
//! configuration.

use crate::error::{Result, SyncError};
use crate::span::MarkCodec;
use serde::{Deserialize, Serialize};

/// How a marker whose `parents` skips levels of the open chain is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AncestorPolicy {
    /// Open every missing ancestor as a container with empty attributes
    #[default]
    Synthesize,
    /// Allow at most one missing level; more is a structural error
    Strict,
}

/// Which block a flat offset sitting on a marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryAffinity {
    /// Start of the block the marker opens
    #[default]
    NextBlock,
    /// End of the block before the marker
    PreviousBlock,
}

/// What the engine does after a failed apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Refuse further patches until the session is remounted
    #[default]
    Poison,
    /// Restore the tree as it was before the failed burst
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Path of the text object inside the replicated document
    #[serde(default = "default_text_path")]
    pub text_path: Vec<String>,

    /// Block type of the implicit leading block
    #[serde(default = "default_block_type")]
    pub default_block_type: String,

    #[serde(default)]
    pub ancestor_policy: AncestorPolicy,

    #[serde(default)]
    pub boundary_affinity: BoundaryAffinity,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Marks whose values are stored as JSON strings in the flat model
    #[serde(default = "default_structured_marks")]
    pub structured_marks: Vec<String>,
}

fn default_text_path() -> Vec<String> {
    vec!["text".to_string()]
}

fn default_block_type() -> String {
    "paragraph".to_string()
}

fn default_structured_marks() -> Vec<String> {
    vec!["link".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_path: default_text_path(),
            default_block_type: default_block_type(),
            ancestor_policy: AncestorPolicy::default(),
            boundary_affinity: BoundaryAffinity::default(),
            failure_policy: FailurePolicy::default(),
            structured_marks: default_structured_marks(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text_path.is_empty() {
            return Err(SyncError::InvalidConfig("textPath must not be empty".to_string()));
        }
        if self.default_block_type.is_empty() {
            return Err(SyncError::InvalidConfig(
                "defaultBlockType must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn codec(&self) -> MarkCodec {
        MarkCodec::new(self.structured_marks.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "textPath": ["doc", "body"],
            "ancestorPolicy": "strict",
            "boundaryAffinity": "previousBlock",
            "failurePolicy": "rollback",
            "structuredMarks": ["link", "comment"]
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.text_path, vec!["doc", "body"]);
        assert_eq!(config.default_block_type, "paragraph");
        assert_eq!(config.ancestor_policy, AncestorPolicy::Strict);
        assert_eq!(config.boundary_affinity, BoundaryAffinity::PreviousBlock);
        assert_eq!(config.failure_policy, FailurePolicy::Rollback);
        assert!(config.codec().is_structured("comment"));
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.codec().is_structured("link"));
    }

    #[test]
    fn test_invalid_config() {
        let err = EngineConfig::from_json(r#"{"textPath": []}"#).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));

        let err = EngineConfig::from_json(r#"{"ancestorPolicy": "guess"}"#).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }
}
