//! The `Blueprint` and `PartialBlueprint` authoring models.

use std::collections::{BTreeMap, BTreeSet};

use ice_core::{BlueprintId, NodeId, SchemaVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FinalizeError, ValidationError};
use crate::node::NodeSpec;
use crate::validator::{validate, ValidationReport};

/// A validated, immutable workflow graph. Construction runs the full
/// validator; an invalid graph never becomes a `Blueprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Schema version this blueprint was authored against.
    pub schema_version: SchemaVersion,
    /// Stable identifier. New edits always mint a new id rather than
    /// mutating one in place.
    pub blueprint_id: BlueprintId,
    /// Nodes in authoring order.
    pub nodes: Vec<NodeSpec>,
    /// Free-form authoring metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Blueprint {
    /// Validate and construct a blueprint. Fails with the full ordered
    /// error list on any violation.
    pub fn try_new(
        schema_version: SchemaVersion,
        blueprint_id: BlueprintId,
        nodes: Vec<NodeSpec>,
        metadata: BTreeMap<String, Value>,
    ) -> Result<Self, Vec<ValidationError>> {
        let report = validate(&schema_version, &nodes);
        if !report.errors.is_empty() {
            return Err(report.errors);
        }
        Ok(Self {
            schema_version,
            blueprint_id,
            nodes,
            metadata,
        })
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// A node mid-authoring: may still be missing fields a finished
/// [`NodeSpec`] would require.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialNodeSpec {
    /// The node as far as it has been authored.
    #[serde(flatten)]
    pub node: NodeSpec,
    /// Inputs the author has not yet wired up.
    #[serde(default)]
    pub pending_inputs: BTreeSet<String>,
    /// Outputs not yet declared.
    #[serde(default)]
    pub pending_outputs: BTreeSet<String>,
    /// Configuration fields still open.
    #[serde(default)]
    pub partial_config: BTreeMap<String, Value>,
}

/// A blueprint under construction by the authoring UI. Supports
/// incremental validation that reports problems without rejecting the
/// edit outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBlueprint {
    /// Schema version, if chosen yet.
    pub schema_version: Option<SchemaVersion>,
    /// Nodes authored so far, in order.
    pub nodes: Vec<PartialNodeSpec>,
    /// Free-form authoring metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// The result of [`PartialBlueprint::validate_incremental`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncrementalValidation {
    /// Whether the partial blueprint has zero hard errors.
    pub is_valid: bool,
    /// Hard errors blocking finalize.
    pub errors: Vec<String>,
    /// Non-blocking concerns.
    pub warnings: Vec<String>,
    /// Authoring-assistant suggestions, e.g. "consider adding output_schema".
    pub suggestions: Vec<String>,
    /// Whether `finalize()` would currently succeed.
    pub can_finalize: bool,
}

impl PartialBlueprint {
    /// Append a node.
    pub fn add_node(&mut self, node: PartialNodeSpec) {
        self.nodes.push(node);
    }

    /// Declare a dependency edge between two already-added nodes.
    pub fn add_edge(&mut self, from: &NodeId, to: NodeId) {
        if let Some(entry) = self.nodes.iter_mut().find(|n| &n.node.id == from) {
            entry.node.dependencies.insert(to);
        }
    }

    /// Validate as far as possible without requiring a finished graph.
    #[must_use]
    pub fn validate_incremental(&self) -> IncrementalValidation {
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        for partial in &self.nodes {
            if !partial.pending_inputs.is_empty() {
                warnings.push(format!("node {:?} has unresolved inputs", partial.node.id));
            }
            if partial.node.output_schema.is_none() {
                suggestions.push(format!(
                    "consider adding output_schema to node {:?}",
                    partial.node.id
                ));
            }
        }

        let Some(schema_version) = &self.schema_version else {
            return IncrementalValidation {
                is_valid: false,
                errors: vec!["schema_version is not set".to_owned()],
                warnings,
                suggestions,
                can_finalize: false,
            };
        };

        let nodes: Vec<NodeSpec> = self.nodes.iter().map(|p| p.node.clone()).collect();
        let report = validate(schema_version, &nodes);
        let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();

        IncrementalValidation {
            is_valid: errors.is_empty(),
            can_finalize: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    /// Finish authoring, producing a full [`Blueprint`]. Fails if the
    /// partial blueprint is not yet valid.
    pub fn finalize(self, blueprint_id: BlueprintId) -> Result<Blueprint, FinalizeError> {
        let report = self.validation_report();
        if !report.errors.is_empty() {
            return Err(FinalizeError::StillInvalid(report.errors.len()));
        }
        let schema_version = self.schema_version.expect("checked valid above");
        Ok(Blueprint {
            schema_version,
            blueprint_id,
            nodes: self.nodes.into_iter().map(|p| p.node).collect(),
            metadata: self.metadata,
        })
    }

    fn validation_report(&self) -> ValidationReport {
        let Some(schema_version) = &self.schema_version else {
            return ValidationReport {
                errors: vec![ValidationError::RuntimeValidation {
                    node: NodeId::new("_blueprint").expect("constant pattern"),
                    reason: "schema_version is not set".to_owned(),
                }],
            };
        };
        let nodes: Vec<NodeSpec> = self.nodes.iter().map(|p| p.node.clone()).collect();
        validate(schema_version, &nodes)
    }
}
