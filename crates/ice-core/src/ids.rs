//! Identifiers for iceOS entities.
//!
//! `RunId` and `BlueprintId` are opaque UUIDs (`domain-key::define_uuid!`,
//! the same pattern used for every entity id in this workspace). `NodeId`
//! is not a UUID: node ids are author-chosen names that must match
//! `[A-Za-z_][A-Za-z0-9_]{0,63}` and stay unique within a blueprint, so it
//! is a validated string newtype instead.

use std::fmt;
use std::str::FromStr;

use domain_key::define_uuid;
use once_cell_regex::node_id_pattern;
use serde::{Deserialize, Serialize};

define_uuid!(pub RunIdDomain => RunId);
define_uuid!(pub BlueprintIdDomain => BlueprintId);

mod once_cell_regex {
    use regex::Regex;
    use std::sync::OnceLock;

    pub fn node_id_pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"))
    }
}

/// Error returned when a string does not satisfy the node id invariant.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid node id {0:?}: must match [A-Za-z_][A-Za-z0-9_]{{0,63}}")]
pub struct NodeIdError(pub String);

/// The author-assigned identifier of a node within a blueprint.
///
/// Unique within its blueprint, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Validate and construct a `NodeId`.
    pub fn new(raw: impl Into<String>) -> Result<Self, NodeIdError> {
        let raw = raw.into();
        if node_id_pattern().is_match(&raw) {
            Ok(Self(raw))
        } else {
            Err(NodeIdError(raw))
        }
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_identifiers() {
        assert!(NodeId::new("a").is_ok());
        assert!(NodeId::new("_private").is_ok());
        assert!(NodeId::new("Node_1").is_ok());
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(NodeId::new("1node").is_err());
    }

    #[test]
    fn rejects_empty_string() {
        assert!(NodeId::new("").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(65);
        assert!(NodeId::new(long).is_err());
    }

    #[test]
    fn display_roundtrips_through_string() {
        let id = NodeId::new("my_node").unwrap();
        assert_eq!(id.to_string(), "my_node");
        assert_eq!(id.as_str(), "my_node");
    }

    #[test]
    fn serde_roundtrip() {
        let id = NodeId::new("abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn serde_rejects_invalid_value() {
        let result: Result<NodeId, _> = serde_json::from_str("\"1bad\"");
        assert!(result.is_err());
    }

    #[test]
    fn run_id_v4_is_not_nil() {
        assert!(!RunId::v4().is_nil());
    }

    #[test]
    fn blueprint_id_v4_is_not_nil() {
        assert!(!BlueprintId::v4().is_nil());
    }
}
