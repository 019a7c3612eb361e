#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # ice-registry
//!
//! A single process-wide name-to-implementation registry for tools,
//! agents, chains, sub-workflows, LLM factories, and node-kind executors.
//! Populated during startup and consulted by the executor and engine at
//! run time to resolve a blueprint's node references to concrete Rust
//! values.

pub mod error;
pub mod registry;
pub mod source;

pub use error::RegistryError;
pub use registry::{EntityClass, Registry};
pub use source::{ManifestRegistrySource, PluginEntry, RegistrySource};
