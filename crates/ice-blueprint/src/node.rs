//! `NodeSpec`: the authoring-time description of a single node.
//!
//! The twelve node kinds are modeled as a tagged enum rather than the
//! dynamically-typed "bag of optional fields" a duck-typed author-time
//! model would use elsewhere -- each variant only carries the fields that
//! kind actually needs, and `serde`'s internally-tagged representation
//! keeps the wire shape close to `{"kind": "tool", "tool_name": ...}`.

use std::collections::{BTreeMap, BTreeSet};

use ice_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a `parallel` node waits for its branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Wait for every branch to settle.
    All,
    /// Return after the first branch succeeds.
    Any,
    /// Return after the first branch settles at all, success or failure.
    Race,
}

/// How a `human` node's response is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    /// A binary approve/reject decision.
    ApproveReject,
    /// Free-form input is required.
    InputRequired,
    /// One of a fixed set of choices must be picked.
    Choice,
}

/// What a `monitor` node does when its metric expression triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOnTrigger {
    /// Hold further dispatch until resumed.
    Pause,
    /// Cancel the run.
    Abort,
    /// Record an alert; the run continues.
    AlertOnly,
}

/// How a `swarm` node's agents reach a joint result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    /// Agents vote and the majority result wins.
    Consensus,
    /// One agent's role is designated lead and arbitrates.
    Hierarchical,
    /// Agents bid for sub-tasks.
    Marketplace,
}

/// A scripting language accepted by `code` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLanguage {
    /// Python.
    Python,
    /// JavaScript.
    Javascript,
}

/// One entry of a `swarm` node's agent roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Registry name of the agent package.
    pub package: String,
    /// The agent's role within the swarm; must be distinct across entries.
    pub role: String,
    /// Per-agent configuration overrides.
    #[serde(default)]
    pub agent_config: BTreeMap<String, Value>,
}

/// Kind-specific fields for a node, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKindSpec {
    /// Invoke a registered tool.
    Tool {
        /// Registry name of the tool.
        tool_name: String,
        /// Template-capable argument map.
        #[serde(default)]
        tool_args: BTreeMap<String, Value>,
    },
    /// Call a language model.
    Llm {
        /// Model identifier, may itself be a Jinja expression.
        model: String,
        /// Jinja prompt template.
        prompt: String,
        /// Provider/model/temperature/max_tokens overrides.
        #[serde(default)]
        llm_config: BTreeMap<String, Value>,
        /// Optional factory name for routing through a registered LLM
        /// factory instead of the default service.
        #[serde(default)]
        llm_name: Option<String>,
    },
    /// Run a registered agent's plan-act-observe loop.
    Agent {
        /// Registry name of the agent package.
        package: String,
        /// Agent configuration.
        #[serde(default)]
        agent_config: BTreeMap<String, Value>,
        /// Maximum plan-act-observe iterations.
        max_iterations: u32,
    },
    /// Branch execution based on a boolean expression.
    Condition {
        /// Restricted boolean expression, see `ice-expression`.
        expression: String,
        /// Node ids enabled when the expression is true.
        #[serde(default)]
        true_branch: Vec<NodeId>,
        /// Node ids enabled when the expression is false.
        #[serde(default)]
        false_branch: Vec<NodeId>,
    },
    /// Iterate a body of nodes over a resolved collection.
    Loop {
        /// Dotted path to the collection, e.g. `producer.rows`.
        items_source: String,
        /// Name the current item is bound to in the loop body's context.
        item_var: String,
        /// The nodes executed once per iteration, in declared order.
        body: Vec<NodeSpec>,
        /// Safety bound on iteration count.
        max_iterations: u32,
    },
    /// Run branches concurrently.
    Parallel {
        /// One node list per branch.
        branches: Vec<Vec<NodeSpec>>,
        /// How to decide when the node as a whole settles.
        wait_strategy: WaitStrategy,
        /// Merge dict-shaped branch outputs into one map.
        #[serde(default)]
        merge_outputs: bool,
    },
    /// Invoke a registered sub-workflow.
    Workflow {
        /// Registry name of the sub-workflow.
        workflow_ref: String,
        /// Overrides merged into the child's initial context.
        #[serde(default)]
        config_overrides: BTreeMap<String, Value>,
        /// External name -> internal dotted path mapping for results.
        #[serde(default)]
        exposed_outputs: BTreeMap<String, String>,
    },
    /// Repeat an agent or sub-workflow until a convergence condition holds.
    Recursive {
        /// Registry name of the agent package, mutually exclusive with
        /// `workflow_ref`.
        #[serde(default)]
        agent_package: Option<String>,
        /// Registry name of the sub-workflow, mutually exclusive with
        /// `agent_package`.
        #[serde(default)]
        workflow_ref: Option<String>,
        /// Boolean expression over the context; iteration stops once true.
        convergence_condition: String,
        /// Safety bound on iteration count.
        max_iterations: u32,
        /// Context key used for recursion bookkeeping.
        context_key: String,
        /// Carry context forward between iterations.
        #[serde(default)]
        preserve_context: bool,
    },
    /// Execute untrusted script inside the sandbox.
    Code {
        /// Scripting language.
        language: CodeLanguage,
        /// Source text.
        code: String,
        /// Allow-listed import names.
        #[serde(default)]
        imports: Vec<String>,
        /// Whether to run sandboxed. Always coerced to `true` for untrusted
        /// code at validation time.
        #[serde(default = "default_true")]
        sandbox: bool,
    },
    /// Pause for an external human response.
    Human {
        /// Message shown to the approver.
        prompt_message: String,
        /// Shape of the expected response.
        approval_type: ApprovalType,
        /// Valid choices, required when `approval_type` is `choice`.
        #[serde(default)]
        choices: Vec<String>,
        /// Response deadline, separate from the node-level timeout.
        #[serde(default)]
        timeout_seconds: Option<f64>,
    },
    /// Evaluate a metric expression and act on trigger.
    Monitor {
        /// Restricted expression evaluated against run metrics/context.
        metric_expression: String,
        /// What to do when the expression triggers.
        action_on_trigger: ActionOnTrigger,
        /// Channels notified on trigger.
        #[serde(default)]
        alert_channels: Vec<String>,
    },
    /// Run multiple agents under a coordination strategy.
    Swarm {
        /// Participating agents; must have at least two distinct roles.
        agents: Vec<AgentSpec>,
        /// How the swarm reaches a joint result.
        coordination_strategy: CoordinationStrategy,
    },
}

const fn default_true() -> bool {
    true
}

impl NodeKindSpec {
    /// Short machine-readable name of this kind, matching the wire tag.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            NodeKindSpec::Tool { .. } => "tool",
            NodeKindSpec::Llm { .. } => "llm",
            NodeKindSpec::Agent { .. } => "agent",
            NodeKindSpec::Condition { .. } => "condition",
            NodeKindSpec::Loop { .. } => "loop",
            NodeKindSpec::Parallel { .. } => "parallel",
            NodeKindSpec::Workflow { .. } => "workflow",
            NodeKindSpec::Recursive { .. } => "recursive",
            NodeKindSpec::Code { .. } => "code",
            NodeKindSpec::Human { .. } => "human",
            NodeKindSpec::Monitor { .. } => "monitor",
            NodeKindSpec::Swarm { .. } => "swarm",
        }
    }
}

/// A single mapping of a consumer-field to a producer's output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMapping {
    /// The node whose output is the source of this field.
    pub source_node_id: NodeId,
    /// Dotted path into the producer's output.
    pub source_output_path: String,
}

/// The authoring-time description of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique identifier within the blueprint.
    pub id: NodeId,
    /// Kind-specific configuration.
    #[serde(flatten)]
    pub kind: NodeKindSpec,
    /// Node ids this node depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<NodeId>,
    /// Consumer-field -> source mapping.
    #[serde(default)]
    pub input_mappings: BTreeMap<String, InputMapping>,
    /// Declared output shape, JSON Schema or a simple literal-type map.
    #[serde(default)]
    pub output_schema: Option<Value>,
    /// Declared input shape.
    #[serde(default)]
    pub input_schema: Option<Value>,
    /// Retry attempts on retryable errors.
    #[serde(default)]
    pub retries: u32,
    /// Base delay between retries, seconds.
    #[serde(default)]
    pub backoff_seconds: f64,
    /// Hard wall-clock deadline for this node, seconds.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Free-form provider label surfaced in metadata.
    #[serde(default)]
    pub provider: Option<String>,
}

impl NodeSpec {
    /// Default output schema applied to `llm` nodes when one is not
    /// declared.
    #[must_use]
    pub fn default_llm_output_schema() -> Value {
        serde_json::json!({ "text": "string" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_node_round_trips_through_json() {
        let node = NodeSpec {
            id: NodeId::new("fetch").unwrap(),
            kind: NodeKindSpec::Tool {
                tool_name: "http_get".into(),
                tool_args: BTreeMap::new(),
            },
            dependencies: BTreeSet::new(),
            input_mappings: BTreeMap::new(),
            output_schema: None,
            input_schema: None,
            retries: 0,
            backoff_seconds: 0.0,
            timeout_seconds: None,
            provider: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "tool");
        let back: NodeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn kind_name_matches_wire_tag() {
        let kind = NodeKindSpec::Condition {
            expression: "x > 0".into(),
            true_branch: vec![],
            false_branch: vec![],
        };
        assert_eq!(kind.kind_name(), "condition");
    }
}
