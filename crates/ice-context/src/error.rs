//! Context resolution and template rendering errors.

use thiserror::Error;

/// Errors raised while resolving node inputs or rendering templates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    /// An `input_mappings` entry named a producer that has not (yet, or
    /// ever) produced a result.
    #[error("input {field:?} references node {source_node_id:?}, which has no result")]
    MissingProducer {
        /// The consumer-side field name.
        field: String,
        /// The node id the mapping pointed at.
        source_node_id: String,
    },

    /// A dotted path did not resolve against the producer's output and no
    /// default was supplied.
    #[error("input {field:?} path {path:?} did not resolve against node {source_node_id:?}'s output")]
    UnresolvedPath {
        /// The consumer-side field name.
        field: String,
        /// The dotted path that failed to resolve.
        path: String,
        /// The node id the mapping pointed at.
        source_node_id: String,
    },

    /// A `{{ ... }}` template referenced a name with no value and strict
    /// undefined checking is on.
    #[error("template references undefined variable {0:?}")]
    UndefinedVariable(String),

    /// A template failed to parse.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
}
