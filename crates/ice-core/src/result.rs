//! `NodeExecutionResult`: the shape every node executor produces and every
//! downstream consumer (context, engine, event bus) reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cost::UsageMetadata;

/// Metadata recorded by every executor, regardless of node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// The node this metadata describes.
    pub node_id: String,
    /// The node's kind, e.g. `"tool"`.
    pub kind: String,
    /// Wall-clock start time, RFC 3339.
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// Wall-clock end time, RFC 3339.
    pub end_time: chrono::DateTime<chrono::Utc>,
    /// `end_time - start_time`, in seconds.
    pub duration_seconds: f64,
    /// Free-form provider label, e.g. `"openai"`.
    #[serde(default)]
    pub provider: Option<String>,
    /// The exception/error class name, set only on failure.
    #[serde(default)]
    pub error_type: Option<String>,
}

/// The result of executing one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionResult {
    /// Whether the node completed without error.
    pub success: bool,
    /// The node's output, when successful.
    #[serde(default)]
    pub output: Option<Value>,
    /// The error message, when not successful.
    #[serde(default)]
    pub error: Option<String>,
    /// Start/end/duration/provider/error_type bookkeeping.
    pub metadata: NodeMetadata,
    /// Token/cost usage, when the node reports it.
    #[serde(default)]
    pub usage: Option<UsageMetadata>,
}

impl NodeExecutionResult {
    /// Build a successful result.
    #[must_use]
    pub fn success(output: Value, metadata: NodeMetadata, usage: Option<UsageMetadata>) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            metadata,
            usage,
        }
    }

    /// Build a failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>, metadata: NodeMetadata) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            metadata,
            usage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> NodeMetadata {
        let now = chrono::Utc::now();
        NodeMetadata {
            node_id: "a".into(),
            kind: "tool".into(),
            start_time: now,
            end_time: now,
            duration_seconds: 0.0,
            provider: None,
            error_type: None,
        }
    }

    #[test]
    fn success_result_has_no_error() {
        let result = NodeExecutionResult::success(serde_json::json!({"x": 1}), metadata(), None);
        assert!(result.success);
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_result_has_no_output() {
        let result = NodeExecutionResult::failure("boom", metadata());
        assert!(!result.success);
        assert!(result.output.is_none());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
