//! The seven-step graph validator, run in a fixed order and accumulating
//! every error rather than stopping at the first.

use std::collections::{BTreeSet, HashSet};

use ice_core::{NodeId, SchemaVersion, ACCEPTED_SCHEMA_VERSIONS, UnsupportedSchemaVersion};

use crate::error::ValidationError;
use crate::graph::DependencyGraph;
use crate::node::{NodeKindSpec, NodeSpec};

/// The accumulated result of [`validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Every violation found, in the order the seven steps discovered them.
    pub errors: Vec<ValidationError>,
}

/// Run all seven validation steps against a node list, accumulating
/// errors rather than short-circuiting on the first failure.
#[must_use]
pub fn validate(schema_version: &SchemaVersion, nodes: &[NodeSpec]) -> ValidationReport {
    let mut errors = Vec::new();

    // Step 1: schema version.
    if !ACCEPTED_SCHEMA_VERSIONS.contains(&schema_version.as_str()) {
        errors.push(ValidationError::UnsupportedVersion(UnsupportedSchemaVersion(
            schema_version.as_str().to_owned(),
            ACCEPTED_SCHEMA_VERSIONS,
        )));
    }

    // Step 2: node-id uniqueness (syntactic validity is already enforced by
    // NodeId's constructor, which ran at deserialization time).
    let all_nodes = flatten(nodes);
    let mut seen = HashSet::new();
    for node in &all_nodes {
        if !seen.insert(node.id.clone()) {
            errors.push(ValidationError::DuplicateNodeId(node.id.clone()));
        }
    }

    let known_ids: HashSet<NodeId> = all_nodes.iter().map(|n| n.id.clone()).collect();

    // Step 3: referential integrity.
    for node in &all_nodes {
        for dep in &node.dependencies {
            if !known_ids.contains(dep) {
                errors.push(ValidationError::DanglingReference {
                    referrer: node.id.clone(),
                    target: dep.clone(),
                });
            }
        }
        check_kind_references(node, &known_ids, &mut errors);
    }

    // Step 4: output-schema presence policy.
    for node in &all_nodes {
        if node.output_schema.is_none() && !matches!(node.kind, NodeKindSpec::Llm { .. }) {
            errors.push(ValidationError::MissingOutputSchema(node.id.clone()));
        }
    }

    // Step 5: cycle detection, over the top-level graph only -- nested
    // loop/parallel bodies are scheduled by their owning executor, not the
    // engine's level scheduler.
    let edges = nodes
        .iter()
        .map(|n| (n.id.clone(), n.dependencies.clone()));
    let graph = DependencyGraph::new(edges);
    if graph.compute_levels().is_none() {
        errors.push(ValidationError::CyclicGraph);
    }

    // Step 6: llm placeholder resolution.
    for node in &all_nodes {
        if let NodeKindSpec::Llm { prompt, .. } = &node.kind {
            for variable in extract_prompt_variables(prompt) {
                let declared = node.input_mappings.contains_key(&variable);
                if !declared {
                    errors.push(ValidationError::UnresolvedPromptVariable {
                        node: node.id.clone(),
                        variable,
                    });
                }
            }
        }
    }

    // Step 7: per-node runtime_validate.
    for node in &all_nodes {
        if let Err(reason) = runtime_validate(node) {
            errors.push(ValidationError::RuntimeValidation {
                node: node.id.clone(),
                reason,
            });
        }
    }

    ValidationReport { errors }
}

/// Recursively collect every node, including those nested inside `loop`
/// bodies and `parallel` branches, so id-uniqueness and referential checks
/// see the whole authored graph.
fn flatten(nodes: &[NodeSpec]) -> Vec<NodeSpec> {
    let mut out = Vec::new();
    for node in nodes {
        match &node.kind {
            NodeKindSpec::Loop { body, .. } => out.extend(flatten(body)),
            NodeKindSpec::Parallel { branches, .. } => {
                for branch in branches {
                    out.extend(flatten(branch));
                }
            }
            _ => {}
        }
        out.push(node.clone());
    }
    out
}

fn check_kind_references(node: &NodeSpec, known_ids: &HashSet<NodeId>, errors: &mut Vec<ValidationError>) {
    match &node.kind {
        NodeKindSpec::Condition { true_branch, false_branch, .. } => {
            for target in true_branch.iter().chain(false_branch) {
                if !known_ids.contains(target) {
                    errors.push(ValidationError::DanglingReference {
                        referrer: node.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        NodeKindSpec::Tool { tool_name, .. } if tool_name.trim().is_empty() => {
            errors.push(ValidationError::RuntimeValidation {
                node: node.id.clone(),
                reason: "tool_name must not be empty".to_owned(),
            });
        }
        _ => {}
    }
}

/// Extract `{placeholder}` and `{{ jinja }}` style variable names from a
/// prompt template. Only the leading dotted-path segment is returned; a
/// mapping on that segment is enough to satisfy the reference.
fn extract_prompt_variables(prompt: &str) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    let mut chars = prompt.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '{' {
            continue;
        }
        let double = prompt[i + 1..].starts_with('{');
        let start = if double { i + 2 } else { i + 1 };
        let close = if double { "}}" } else { "}" };
        if let Some(rel_end) = prompt[start..].find(close) {
            let inner = prompt[start..start + rel_end].trim();
            let name = inner.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.')).next().unwrap_or("");
            let root = name.split('.').next().unwrap_or("").to_owned();
            if !root.is_empty() {
                vars.insert(root);
            }
        }
    }
    vars
}

/// Kind-specific structural checks beyond what the enum shape already
/// enforces.
fn runtime_validate(node: &NodeSpec) -> Result<(), String> {
    match &node.kind {
        NodeKindSpec::Swarm { agents, .. } => {
            if agents.len() < 2 {
                return Err("swarm requires at least two agents".to_owned());
            }
            let roles: HashSet<&str> = agents.iter().map(|a| a.role.as_str()).collect();
            if roles.len() != agents.len() {
                return Err("swarm agent roles must be distinct".to_owned());
            }
            Ok(())
        }
        NodeKindSpec::Recursive {
            agent_package,
            workflow_ref,
            ..
        } => match (agent_package, workflow_ref) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err("recursive node requires agent_package or workflow_ref".to_owned()),
            (Some(_), Some(_)) => Err("recursive node cannot set both agent_package and workflow_ref".to_owned()),
        },
        NodeKindSpec::Condition { expression, .. } => ice_expression::parse(expression)
            .map(|_| ())
            .map_err(|e| format!("invalid condition expression: {e}")),
        NodeKindSpec::Monitor { metric_expression, .. } => ice_expression::parse(metric_expression)
            .map(|_| ())
            .map_err(|e| format!("invalid metric expression: {e}")),
        NodeKindSpec::Human { approval_type, choices, .. } => {
            if matches!(approval_type, crate::node::ApprovalType::Choice) && choices.is_empty() {
                Err("choice approval requires a non-empty choices list".to_owned())
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn base_node(id_str: &str, kind: NodeKindSpec) -> NodeSpec {
        NodeSpec {
            id: id(id_str),
            kind,
            dependencies: BTreeSet::new(),
            input_mappings: BTreeMap::new(),
            output_schema: Some(serde_json::json!({})),
            input_schema: None,
            retries: 0,
            backoff_seconds: 0.0,
            timeout_seconds: None,
            provider: None,
        }
    }

    fn version() -> SchemaVersion {
        SchemaVersion::parse("1.1.0").unwrap()
    }

    #[test]
    fn accepted_schema_version_raises_no_version_error() {
        let report = validate(&version(), &[]);
        assert!(!report.errors.iter().any(|e| matches!(e, ValidationError::UnsupportedVersion(_))));
    }

    #[test]
    fn rejects_cycle() {
        let mut a = base_node("a", NodeKindSpec::Tool { tool_name: "t".into(), tool_args: BTreeMap::new() });
        a.dependencies.insert(id("b"));
        let mut b = base_node("b", NodeKindSpec::Tool { tool_name: "t".into(), tool_args: BTreeMap::new() });
        b.dependencies.insert(id("a"));
        let report = validate(&version(), &[a, b]);
        assert!(report.errors.contains(&ValidationError::CyclicGraph));
    }

    #[test]
    fn rejects_dangling_dependency() {
        let mut a = base_node("a", NodeKindSpec::Tool { tool_name: "t".into(), tool_args: BTreeMap::new() });
        a.dependencies.insert(id("missing"));
        let report = validate(&version(), &[a]);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DanglingReference { .. })));
    }

    #[test]
    fn llm_node_defaults_output_schema_so_no_error() {
        let mut node = base_node(
            "llm1",
            NodeKindSpec::Llm {
                model: "gpt".into(),
                prompt: "hello {{ name }}".into(),
                llm_config: BTreeMap::new(),
                llm_name: None,
            },
        );
        node.output_schema = None;
        node.input_mappings.insert(
            "name".into(),
            crate::node::InputMapping { source_node_id: id("a"), source_output_path: "x".into() },
        );
        let report = validate(&version(), &[node]);
        assert!(!report.errors.iter().any(|e| matches!(e, ValidationError::MissingOutputSchema(_))));
    }

    #[test]
    fn llm_prompt_with_unresolved_variable_is_reported() {
        let node = base_node(
            "llm1",
            NodeKindSpec::Llm {
                model: "gpt".into(),
                prompt: "hello {{ name }}".into(),
                llm_config: BTreeMap::new(),
                llm_name: None,
            },
        );
        let report = validate(&version(), &[node]);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnresolvedPromptVariable { .. })));
    }

    #[test]
    fn swarm_requires_distinct_roles() {
        let node = base_node(
            "s",
            NodeKindSpec::Swarm {
                agents: vec![
                    crate::node::AgentSpec { package: "p".into(), role: "lead".into(), agent_config: BTreeMap::new() },
                    crate::node::AgentSpec { package: "p".into(), role: "lead".into(), agent_config: BTreeMap::new() },
                ],
                coordination_strategy: crate::node::CoordinationStrategy::Consensus,
            },
        );
        let report = validate(&version(), &[node]);
        assert!(report.errors.iter().any(|e| matches!(e, ValidationError::RuntimeValidation { .. })));
    }

    #[test]
    fn valid_linear_blueprint_has_no_errors() {
        let a = base_node("a", NodeKindSpec::Tool { tool_name: "t".into(), tool_args: BTreeMap::new() });
        let mut b = base_node("b", NodeKindSpec::Tool { tool_name: "t".into(), tool_args: BTreeMap::new() });
        b.dependencies.insert(id("a"));
        let report = validate(&version(), &[a, b]);
        assert!(report.errors.is_empty());
    }
}
