//! `ExecutionContext`: the per-run node-results map plus a session-scoped
//! globals store, and the two operations executors call before running:
//! `resolve_inputs` and `render_templates`.

use std::collections::BTreeMap;

use ice_core::NodeExecutionResult;
use serde_json::Value;

use crate::error::ContextError;
use crate::template::render_template;

/// One `consumer_field -> (source_node_id, source_output_path)` entry, as
/// declared on a `NodeSpec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMapping {
    /// The node whose output is the source of this field.
    pub source_node_id: String,
    /// Dotted path into the producer's output.
    pub source_output_path: String,
}

/// A condition node's recorded decision, consulted by the engine's skip
/// propagation at level boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDecision {
    /// The condition node that made the decision.
    pub node_id: String,
    /// Whether the `true_branch` (vs. `false_branch`) was taken.
    pub taken: bool,
}

/// Per-run execution state: results committed so far, session globals, and
/// the branch-decision table condition nodes populate.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    node_results: BTreeMap<String, NodeExecutionResult>,
    globals: BTreeMap<String, Value>,
    branch_decisions: Vec<BranchDecision>,
}

impl ExecutionContext {
    /// Start an empty context seeded with `initial_context` globals.
    #[must_use]
    pub fn new(initial_context: BTreeMap<String, Value>) -> Self {
        Self {
            node_results: BTreeMap::new(),
            globals: initial_context,
            branch_decisions: Vec::new(),
        }
    }

    /// Commit a node's result. Only the scheduler calls this, once a
    /// node's task has settled.
    pub fn commit(&mut self, node_id: impl Into<String>, result: NodeExecutionResult) {
        self.node_results.insert(node_id.into(), result);
    }

    /// Look up a previously committed result.
    #[must_use]
    pub fn result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results.get(node_id)
    }

    /// Every committed result so far, keyed by node id.
    #[must_use]
    pub fn all_results(&self) -> BTreeMap<String, NodeExecutionResult> {
        self.node_results.clone()
    }

    /// A copy of this context with `extra` layered over the existing
    /// globals, for scoping a single node's resolved input mappings
    /// without mutating the shared run context.
    #[must_use]
    pub fn with_extra_globals(&self, extra: BTreeMap<String, Value>) -> Self {
        let mut globals = self.globals.clone();
        globals.extend(extra);
        Self {
            node_results: self.node_results.clone(),
            globals,
            branch_decisions: self.branch_decisions.clone(),
        }
    }

    /// Record a condition node's branch decision.
    pub fn record_branch_decision(&mut self, node_id: impl Into<String>, taken: bool) {
        self.branch_decisions.push(BranchDecision { node_id: node_id.into(), taken });
    }

    /// All branch decisions recorded so far, in recording order.
    #[must_use]
    pub fn branch_decisions(&self) -> &[BranchDecision] {
        &self.branch_decisions
    }

    /// Session-scoped global value, e.g. from `initial_context`.
    #[must_use]
    pub fn global(&self, key: &str) -> Option<&Value> {
        self.globals.get(key)
    }

    /// Resolve a node's declared input mappings against prior results and
    /// globals. An unresolved path with no fallback in globals is an
    /// error surfaced before the node runs.
    pub fn resolve_inputs(
        &self,
        mappings: &BTreeMap<String, InputMapping>,
    ) -> Result<BTreeMap<String, Value>, ContextError> {
        let mut resolved = BTreeMap::new();
        for (field, mapping) in mappings {
            let producer = self.node_results.get(&mapping.source_node_id).ok_or_else(|| {
                ContextError::MissingProducer {
                    field: field.clone(),
                    source_node_id: mapping.source_node_id.clone(),
                }
            })?;
            let output = producer.output.as_ref().ok_or_else(|| ContextError::UnresolvedPath {
                field: field.clone(),
                path: mapping.source_output_path.clone(),
                source_node_id: mapping.source_node_id.clone(),
            })?;
            let value = resolve_dotted_path(output, &mapping.source_output_path).ok_or_else(|| {
                ContextError::UnresolvedPath {
                    field: field.clone(),
                    path: mapping.source_output_path.clone(),
                    source_node_id: mapping.source_node_id.clone(),
                }
            })?;
            resolved.insert(field.clone(), value.clone());
        }
        Ok(resolved)
    }

    /// A flattened, templating-friendly view: committed results reduced
    /// to their plain `output` value, plus globals layered underneath so
    /// a template can address `{{ node_id.field }}` or `{{ global_key }}`.
    #[must_use]
    pub fn template_vars(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.globals {
            map.insert(key.clone(), value.clone());
        }
        for (node_id, result) in &self.node_results {
            if let Some(output) = &result.output {
                map.insert(node_id.clone(), output.clone());
            }
        }
        Value::Object(map)
    }

    /// Render a Jinja-subset template against this context's flattened
    /// variable view, with strict-undefined semantics.
    pub fn render_templates(&self, template: &str) -> Result<String, ContextError> {
        render_template(template, &self.template_vars())
    }
}

fn resolve_dotted_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = value;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        cur = cur.get(part)?;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ice_core::NodeMetadata;

    fn metadata(node_id: &str) -> NodeMetadata {
        let now = chrono::Utc::now();
        NodeMetadata {
            node_id: node_id.into(),
            kind: "tool".into(),
            start_time: now,
            end_time: now,
            duration_seconds: 0.0,
            provider: None,
            error_type: None,
        }
    }

    #[test]
    fn resolve_inputs_reads_nested_path() {
        let mut ctx = ExecutionContext::default();
        ctx.commit(
            "producer",
            NodeExecutionResult::success(serde_json::json!({"rows": [1, 2, 3]}), metadata("producer"), None),
        );
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "items".to_owned(),
            InputMapping { source_node_id: "producer".into(), source_output_path: "rows".into() },
        );
        let resolved = ctx.resolve_inputs(&mappings).unwrap();
        assert_eq!(resolved["items"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn resolve_inputs_errors_on_missing_producer() {
        let ctx = ExecutionContext::default();
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "items".to_owned(),
            InputMapping { source_node_id: "missing".into(), source_output_path: "rows".into() },
        );
        let err = ctx.resolve_inputs(&mappings).unwrap_err();
        assert!(matches!(err, ContextError::MissingProducer { .. }));
    }

    #[test]
    fn with_extra_globals_does_not_mutate_the_original() {
        let mut ctx = ExecutionContext::new(BTreeMap::from([("a".to_owned(), serde_json::json!(1))]));
        ctx.record_branch_decision("cond", true);
        let scoped = ctx.with_extra_globals(BTreeMap::from([("b".to_owned(), serde_json::json!(2))]));
        assert_eq!(scoped.global("a"), Some(&serde_json::json!(1)));
        assert_eq!(scoped.global("b"), Some(&serde_json::json!(2)));
        assert_eq!(ctx.global("b"), None);
    }

    #[test]
    fn branch_decisions_are_recorded_in_order() {
        let mut ctx = ExecutionContext::default();
        ctx.record_branch_decision("cond1", true);
        ctx.record_branch_decision("cond2", false);
        assert_eq!(ctx.branch_decisions().len(), 2);
        assert!(ctx.branch_decisions()[0].taken);
        assert!(!ctx.branch_decisions()[1].taken);
    }
}
