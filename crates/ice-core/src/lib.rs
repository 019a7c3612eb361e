#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # ice-core
//!
//! Shared identifiers and primitive value types used by every iceOS crate:
//! [`RunId`], [`BlueprintId`], [`NodeId`], [`SchemaVersion`], [`CostMeta`],
//! and [`UsageMetadata`].

pub mod cost;
pub mod ids;
pub mod result;
pub mod version;

pub use cost::{CostMeta, UsageMetadata};
pub use ids::{BlueprintId, NodeId, NodeIdError, RunId};
pub use result::{NodeExecutionResult, NodeMetadata};
pub use version::{SchemaVersion, UnsupportedSchemaVersion, ACCEPTED_SCHEMA_VERSIONS};
