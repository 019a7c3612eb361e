#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # ice-context
//!
//! The per-run execution context: committed node results, session
//! globals, branch-decision bookkeeping, input resolution, and a
//! restricted Jinja-subset template renderer.

pub mod context;
pub mod error;
pub mod template;

pub use context::{BranchDecision, ExecutionContext, InputMapping};
pub use error::ContextError;
pub use template::render_template;
