//! Errors for blueprint construction and validation.

use ice_core::{NodeId, NodeIdError, UnsupportedSchemaVersion};
use thiserror::Error;

/// A single validation failure, carrying the offending node when known.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// `schema_version` is not in the accepted set.
    #[error(transparent)]
    UnsupportedVersion(#[from] UnsupportedSchemaVersion),

    /// A node id failed the `[A-Za-z_][A-Za-z0-9_]{0,63}` pattern.
    #[error(transparent)]
    InvalidNodeId(#[from] NodeIdError),

    /// Two nodes in the same blueprint share an id.
    #[error("duplicate node id {0:?}")]
    DuplicateNodeId(NodeId),

    /// A dependency, branch target, or reference names a node that does
    /// not exist in the blueprint.
    #[error("node {referrer:?} references unknown node {target:?}")]
    DanglingReference {
        /// The node making the reference.
        referrer: NodeId,
        /// The node id it refers to that does not exist.
        target: NodeId,
    },

    /// An `output_schema` is required for this kind but absent.
    #[error("node {0:?} must declare an output_schema")]
    MissingOutputSchema(NodeId),

    /// The blueprint's dependency graph contains a cycle.
    #[error("blueprint contains a dependency cycle")]
    CyclicGraph,

    /// An `llm` node's prompt references a variable not supplied by any
    /// input mapping or global input.
    #[error("node {node:?} prompt references undeclared variable {variable:?}")]
    UnresolvedPromptVariable {
        /// The node whose prompt was checked.
        node: NodeId,
        /// The variable name that could not be resolved.
        variable: String,
    },

    /// A kind-specific `runtime_validate` check failed.
    #[error("node {node:?} failed validation: {reason}")]
    RuntimeValidation {
        /// The node that failed.
        node: NodeId,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors raised while finalizing a [`crate::PartialBlueprint`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinalizeError {
    /// The partial blueprint is not yet valid; finalize was rejected.
    #[error("cannot finalize an invalid blueprint: {0} error(s)")]
    StillInvalid(usize),
}
