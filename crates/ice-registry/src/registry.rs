//! The unified registry: a single process-wide store indexed by
//! `(entity_class, name)`.
//!
//! Grounded on two teacher files: the call-site shape of
//! `crates/engine/src/node/registry.rs` (`register`, `get`/load-on-miss,
//! `exists`, `remove`, `keys`, `count`) and
//! `original_source/src/ice_core/unified_registry.py`'s `Registry` class,
//! which this generalizes from five private dicts (`_nodes`, `_instances`,
//! `_executors`, `_chains`, `_agents`) into one `DashMap` keyed by
//! `(EntityClass, String)` plus a separate agent import-path table, mirroring
//! `register_agent`'s "idempotent if same import_path, else Conflict" rule.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// The six entity classes the registry resolves names against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    /// A tool invocable by `tool` nodes.
    Tool,
    /// An agent package invocable by `agent`/`recursive`/`swarm` nodes.
    Agent,
    /// A pre-built chain of nodes.
    Chain,
    /// A sub-workflow invocable by `workflow` nodes.
    Workflow,
    /// A factory that produces an LLM client for a given model/provider.
    LlmFactory,
    /// A node-kind executor implementation.
    NodeExecutor,
}

type AnyArc = Arc<dyn Any + Send + Sync>;

/// A boxed instance registered under a name, type-erased until retrieval.
#[derive(Clone)]
struct Entry {
    value: AnyArc,
    /// Stable tag describing the concrete type, used to detect conflicting
    /// re-registration without requiring `PartialEq` on arbitrary `T`.
    type_tag: &'static str,
}

/// The unified registry.
///
/// Populated once at startup and largely read-only thereafter; dynamic
/// registration is internally synchronised via `DashMap` so idempotent
/// re-registration from multiple tasks is safe without an external mutex.
#[derive(Default)]
pub struct Registry {
    entries: DashMap<(EntityClass, String), Entry>,
    /// Agent names resolve to an import path (a registry-name string, not
    /// an instance), mirroring `unified_registry.py`'s `_agents` dict.
    agent_paths: DashMap<String, String>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.len())
            .field("agents", &self.agent_paths.len())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class/factory under `(kind, name)`.
    ///
    /// Distinct from [`Registry::register_instance`] only by caller intent
    /// (a type to be instantiated later vs. an already-constructed object);
    /// both are modeled identically here as a type-erased value, since the
    /// distinction is a construction-time concern the caller owns, not a
    /// storage-shape concern.
    pub fn register_class<T: Any + Send + Sync + 'static>(
        &self,
        kind: EntityClass,
        name: impl Into<String>,
        class: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(kind, name, class)
    }

    /// Register an already-constructed instance under `(kind, name)`.
    pub fn register_instance<T: Any + Send + Sync + 'static>(
        &self,
        kind: EntityClass,
        name: impl Into<String>,
        instance: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(kind, name, instance)
    }

    /// Register a node-kind executor. Convenience alias over
    /// [`Registry::register_instance`] with [`EntityClass::NodeExecutor`].
    pub fn register_executor<T: Any + Send + Sync + 'static>(
        &self,
        kind_name: impl Into<String>,
        executor: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(EntityClass::NodeExecutor, kind_name, executor)
    }

    /// Register a pre-built chain under `name`.
    pub fn register_chain<T: Any + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        chain: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(EntityClass::Chain, name, chain)
    }

    /// Register a sub-workflow factory under `name`.
    pub fn register_workflow_factory<T: Any + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        factory: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(EntityClass::Workflow, name, factory)
    }

    /// Register an LLM client factory under `name`.
    pub fn register_llm_factory<T: Any + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        factory: Arc<T>,
    ) -> Result<(), RegistryError> {
        self.register_typed(EntityClass::LlmFactory, name, factory)
    }

    fn register_typed<T: Any + Send + Sync + 'static>(
        &self,
        kind: EntityClass,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let type_tag = std::any::type_name::<T>();
        let key = (kind, name.clone());

        if let Some(existing) = self.entries.get(&key) {
            if existing.type_tag == type_tag && Arc::ptr_eq(&existing.value, &(value.clone() as AnyArc)) {
                return Ok(());
            }
            // Different concrete type always conflicts; same type but a
            // different instance is treated as a conflicting re-registration
            // too -- idempotency only covers registering the identical
            // target twice, not a same-shaped replacement.
            return Err(RegistryError::Conflict {
                kind,
                name,
            });
        }

        tracing::info!(?kind, name = %name, "registered entry");
        self.entries.insert(key, Entry { value, type_tag });
        Ok(())
    }

    /// Register an agent's import path. Re-registering the same name with
    /// the same import path is idempotent; a different path is a conflict.
    pub fn register_agent(
        &self,
        name: impl Into<String>,
        import_path: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let import_path = import_path.into();
        match self.agent_paths.get(&name) {
            Some(existing) if *existing == import_path => Ok(()),
            Some(_) => Err(RegistryError::Conflict {
                kind: EntityClass::Agent,
                name,
            }),
            None => {
                tracing::info!(name = %name, import_path = %import_path, "registered agent");
                self.agent_paths.insert(name, import_path);
                Ok(())
            }
        }
    }

    /// Resolve an agent's import path.
    pub fn get_agent_import_path(&self, name: &str) -> Result<String, RegistryError> {
        self.agent_paths
            .get(name)
            .map(|v| v.clone())
            .ok_or_else(|| RegistryError::NotFound {
                kind: EntityClass::Agent,
                name: name.to_owned(),
            })
    }

    /// Fetch a typed instance registered under `(kind, name)`.
    pub fn get<T: Any + Send + Sync + 'static>(
        &self,
        kind: EntityClass,
        name: &str,
    ) -> Result<Arc<T>, RegistryError> {
        let entry = self
            .entries
            .get(&(kind, name.to_owned()))
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                name: name.to_owned(),
            })?;
        entry
            .value
            .clone()
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                kind,
                name: name.to_owned(),
            })
    }

    /// Convenience: fetch a tool instance.
    pub fn get_tool_instance<T: Any + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, RegistryError> {
        self.get(EntityClass::Tool, name)
    }

    /// Convenience: fetch a sub-workflow instance.
    pub fn get_workflow_instance<T: Any + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, RegistryError> {
        self.get(EntityClass::Workflow, name)
    }

    /// Convenience: fetch an LLM factory instance.
    pub fn get_llm_instance<T: Any + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, RegistryError> {
        self.get(EntityClass::LlmFactory, name)
    }

    /// Convenience: fetch a node-kind executor instance.
    pub fn get_executor<T: Any + Send + Sync + 'static>(
        &self,
        kind_name: &str,
    ) -> Result<Arc<T>, RegistryError> {
        self.get(EntityClass::NodeExecutor, kind_name)
    }

    /// Whether an entry exists for `(kind, name)`.
    #[must_use]
    pub fn exists(&self, kind: EntityClass, name: &str) -> bool {
        self.entries.contains_key(&(kind, name.to_owned()))
    }

    /// Remove an entry. Returns `true` if something was removed.
    pub fn remove(&self, kind: EntityClass, name: &str) -> bool {
        self.entries.remove(&(kind, name.to_owned())).is_some()
    }

    /// Number of registered entries across all entity classes (agents
    /// counted separately via `agent_count`).
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Number of registered agent import paths.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agent_paths.len()
    }

    /// List all names registered under a given entity class.
    #[must_use]
    pub fn names(&self, kind: EntityClass) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.key().0 == kind)
            .map(|e| e.key().1.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Echo(&'static str);
    #[derive(Debug)]
    struct OtherEcho;

    #[test]
    fn register_and_get_round_trips() {
        let reg = Registry::new();
        reg.register_instance(EntityClass::Tool, "echo", Arc::new(Echo("hi")))
            .unwrap();
        let got: Arc<Echo> = reg.get_tool_instance("echo").unwrap();
        assert_eq!(got.0, "hi");
    }

    #[test]
    fn get_missing_returns_not_found() {
        let reg = Registry::new();
        let err = reg.get::<Echo>(EntityClass::Tool, "missing").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn get_wrong_type_returns_type_mismatch() {
        let reg = Registry::new();
        reg.register_instance(EntityClass::Tool, "echo", Arc::new(Echo("hi")))
            .unwrap();
        let err = reg.get::<OtherEcho>(EntityClass::Tool, "echo").unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { .. }));
    }

    #[test]
    fn idempotent_reregistration_of_same_instance_succeeds() {
        let reg = Registry::new();
        let instance = Arc::new(Echo("hi"));
        reg.register_instance(EntityClass::Tool, "echo", instance.clone())
            .unwrap();
        reg.register_instance(EntityClass::Tool, "echo", instance)
            .unwrap();
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn reregistration_with_different_instance_conflicts() {
        let reg = Registry::new();
        reg.register_instance(EntityClass::Tool, "echo", Arc::new(Echo("hi")))
            .unwrap();
        let err = reg
            .register_instance(EntityClass::Tool, "echo", Arc::new(Echo("bye")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn agent_registration_is_idempotent_for_same_path() {
        let reg = Registry::new();
        reg.register_agent("researcher", "pkg.agents:Researcher").unwrap();
        reg.register_agent("researcher", "pkg.agents:Researcher").unwrap();
        assert_eq!(reg.agent_count(), 1);
    }

    #[test]
    fn agent_registration_conflicts_on_different_path() {
        let reg = Registry::new();
        reg.register_agent("researcher", "pkg.agents:Researcher").unwrap();
        let err = reg
            .register_agent("researcher", "pkg.other:Researcher")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn remove_and_exists() {
        let reg = Registry::new();
        reg.register_instance(EntityClass::Chain, "pipeline", Arc::new(Echo("x")))
            .unwrap();
        assert!(reg.exists(EntityClass::Chain, "pipeline"));
        assert!(reg.remove(EntityClass::Chain, "pipeline"));
        assert!(!reg.exists(EntityClass::Chain, "pipeline"));
    }

    #[test]
    fn names_filters_by_entity_class() {
        let reg = Registry::new();
        reg.register_instance(EntityClass::Tool, "a", Arc::new(Echo("a")))
            .unwrap();
        reg.register_instance(EntityClass::Tool, "b", Arc::new(Echo("b")))
            .unwrap();
        reg.register_instance(EntityClass::Chain, "c", Arc::new(Echo("c")))
            .unwrap();

        let mut tools = reg.names(EntityClass::Tool);
        tools.sort();
        assert_eq!(tools, vec!["a", "b"]);
    }
}
