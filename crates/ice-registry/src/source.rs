//! Declarative agent-registration sources: a JSON plugin manifest on disk,
//! and an in-memory entry-point table populated ahead of time. Neither
//! loads a dynamic library -- only tool/agent/chain *names* are
//! declarative here, the concrete Rust value behind a tool/chain/workflow/
//! llm_factory entry still has to be constructed and registered by code
//! (`register_instance`), so this only covers agent import-path entries,
//! mirroring `register_agent`'s own idempotent-unless-conflicting rule.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::registry::{EntityClass, Registry};

/// One agent entry declared by a plugin manifest or an entry-point group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// The agent name it registers under.
    pub name: String,
    /// The import path `register_agent` associates with that name.
    pub import_path: String,
}

/// A declarative source of agent registrations.
///
/// `load_plugins` reads a manifest file; `load_entry_points` reads a named
/// group from whatever table the implementation was built with. Both
/// return the number of entries registered.
pub trait RegistrySource: Send + Sync {
    /// Parse `manifest_path` and register every declared entry into
    /// `registry`.
    fn load_plugins(&self, registry: &Registry, manifest_path: &Path) -> Result<usize, RegistryError>;

    /// Register every entry published under `group` into `registry`.
    fn load_entry_points(&self, registry: &Registry, group: &str) -> Result<usize, RegistryError>;
}

/// Reads plugin manifests as JSON arrays of [`PluginEntry`] from disk, and
/// entry-points from a table supplied at construction time -- the
/// `importlib.metadata.entry_points()` analogue, without any actual
/// dynamic-library loading (out of scope, see SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct ManifestRegistrySource {
    entry_points: BTreeMap<String, Vec<PluginEntry>>,
}

impl ManifestRegistrySource {
    /// A source with no entry-point groups declared yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a group's entries, available to a later `load_entry_points`
    /// call under that group name.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>, entries: Vec<PluginEntry>) -> Self {
        self.entry_points.insert(group.into(), entries);
        self
    }
}

impl RegistrySource for ManifestRegistrySource {
    fn load_plugins(&self, registry: &Registry, manifest_path: &Path) -> Result<usize, RegistryError> {
        let raw = fs::read_to_string(manifest_path).map_err(|err| RegistryError::ManifestUnreadable {
            path: manifest_path.display().to_string(),
            message: err.to_string(),
        })?;
        let entries: Vec<PluginEntry> = serde_json::from_str(&raw).map_err(|err| RegistryError::ManifestUnreadable {
            path: manifest_path.display().to_string(),
            message: err.to_string(),
        })?;
        register_entries(registry, &entries)
    }

    fn load_entry_points(&self, registry: &Registry, group: &str) -> Result<usize, RegistryError> {
        let entries = self.entry_points.get(group).ok_or_else(|| RegistryError::NotFound {
            kind: EntityClass::Agent,
            name: group.to_owned(),
        })?;
        register_entries(registry, entries)
    }
}

fn register_entries(registry: &Registry, entries: &[PluginEntry]) -> Result<usize, RegistryError> {
    for entry in entries {
        registry.register_agent(entry.name.clone(), entry.import_path.clone())?;
    }
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_entry_points_registers_declared_group() {
        let source = ManifestRegistrySource::new().with_group(
            "iceos.agents",
            vec![PluginEntry { name: "researcher".into(), import_path: "pkg.agents:Researcher".into() }],
        );
        let registry = Registry::new();
        let count = source.load_entry_points(&registry, "iceos.agents").unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.get_agent_import_path("researcher").unwrap(), "pkg.agents:Researcher");
    }

    #[test]
    fn load_entry_points_unknown_group_is_not_found() {
        let source = ManifestRegistrySource::new();
        let registry = Registry::new();
        let err = source.load_entry_points(&registry, "missing").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn load_plugins_reads_a_manifest_file() {
        let dir = std::env::temp_dir().join(format!("ice-registry-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let manifest = dir.join("plugins.json");
        fs::write(&manifest, r#"[{"name": "writer", "import_path": "pkg.agents:Writer"}]"#).unwrap();

        let source = ManifestRegistrySource::new();
        let registry = Registry::new();
        let count = source.load_plugins(&registry, &manifest).unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.get_agent_import_path("writer").unwrap(), "pkg.agents:Writer");

        fs::remove_file(&manifest).ok();
        fs::remove_dir(&dir).ok();
    }

    #[test]
    fn load_plugins_duplicate_with_different_path_conflicts() {
        let dir = std::env::temp_dir().join(format!("ice-registry-test-conflict-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let manifest = dir.join("plugins.json");
        fs::write(&manifest, r#"[{"name": "writer", "import_path": "pkg.agents:Writer"}]"#).unwrap();

        let source = ManifestRegistrySource::new();
        let registry = Registry::new();
        registry.register_agent("writer", "pkg.other:Writer").unwrap();
        let err = source.load_plugins(&registry, &manifest).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));

        fs::remove_file(&manifest).ok();
        fs::remove_dir(&dir).ok();
    }
}
