#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # ice-blueprint
//!
//! Authoring-time models for iceOS workflows: `NodeSpec` and its twelve
//! kind-specific variants, the `Blueprint`/`PartialBlueprint`/`Draft`
//! shapes, the dependency graph used for level computation, and the
//! ordered graph validator.

pub mod blueprint;
pub mod draft;
pub mod error;
pub mod graph;
pub mod node;
pub mod validator;

pub use blueprint::{Blueprint, IncrementalValidation, PartialBlueprint, PartialNodeSpec};
pub use draft::{Draft, LockedDraft, NodePosition};
pub use error::{FinalizeError, ValidationError};
pub use graph::DependencyGraph;
pub use node::{
    ActionOnTrigger, AgentSpec, ApprovalType, CodeLanguage, CoordinationStrategy, InputMapping,
    NodeKindSpec, NodeSpec, WaitStrategy,
};
pub use validator::{validate, ValidationReport};
